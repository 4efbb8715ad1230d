use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

struct Pending {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

/// A single-shot, trailing-edge timer.
///
/// `arm` schedules a task to run after `delay`, cancelling whatever was
/// armed before. Once the delay elapses the task runs to completion even if
/// the timer is cancelled or re-armed afterwards; cancellation only stops
/// tasks that have not fired yet. Dropping the timer cancels it.
///
/// Must be armed from inside a Tokio runtime.
#[derive(Default)]
pub struct DebounceTimer {
    pending: Option<Pending>,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm<F>(&mut self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let token = CancellationToken::new();
        let fired = Arc::new(AtomicBool::new(false));
        let cancelled = token.clone();
        let fired_flag = fired.clone();
        // Measured from the arm call, not from when the task is first polled
        let deadline = tokio::time::Instant::now() + delay;

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    fired_flag.store(true, Ordering::SeqCst);
                    task.await;
                }
            }
        });

        self.pending = Some(Pending { token, fired });
    }

    /// Cancel the pending fire. Returns true if a task was armed and had not
    /// fired yet.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.token.cancel();
                !pending.fired.load(Ordering::SeqCst)
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| !p.fired.load(Ordering::SeqCst))
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_task(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_delay() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new();

        timer.arm(Duration::from_millis(100), counter_task(&counter));
        assert!(timer.is_armed());

        tokio::time::advance(Duration::from_millis(99)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());

        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_period_starts_at_arm() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new();

        // No yield between arming and advancing: the task has not been polled yet
        timer.arm(Duration::from_millis(1000), counter_task(&counter));
        tokio::time::advance(Duration::from_millis(1000)).await;
        settle().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_restarts_quiet_period() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new();

        timer.arm(Duration::from_millis(100), counter_task(&counter));
        tokio::time::advance(Duration::from_millis(60)).await;
        settle().await;
        timer.arm(Duration::from_millis(100), counter_task(&counter));

        tokio::time::advance(Duration::from_millis(60)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(40)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new();

        timer.arm(Duration::from_millis(100), counter_task(&counter));
        assert!(timer.cancel());
        assert!(!timer.is_armed());
        assert!(!timer.cancel());

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let mut timer = DebounceTimer::new();
            timer.arm(Duration::from_millis(100), counter_task(&counter));
        }

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
