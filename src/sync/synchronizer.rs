use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use super::debounce::DebounceTimer;
use super::session::{EditSession, NoteView};
use crate::config::SyncConfig;
use crate::entity::{ActorId, NewNote, Note, NoteId, NoteUpdate, WorldId};
use crate::error::{ForgeError, Result};
use crate::identity::IdentityProvider;
use crate::storage::NoteStore;

/// Upper bound on the pause between fetch retries
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

struct Shared {
    store: Arc<dyn NoteStore>,
    session: Mutex<EditSession>,
    /// Held for the duration of each store write so saves never overlap
    save_lock: tokio::sync::Mutex<()>,
    view_tx: watch::Sender<NoteView>,
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, EditSession> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, session: &EditSession) {
        self.view_tx.send_replace(session.view());
    }
}

/// Keeps one world's note buffer in step with the store.
///
/// Every `update_content` call updates the buffer at once and re-arms a
/// debounce timer; when the timer elapses the latest buffer is written,
/// as a create if the session has no note id yet and as an update by id
/// otherwise. Writes within a session are serialized, so responses apply
/// in submission order.
///
/// Timers and saves run on the ambient Tokio runtime.
pub struct NoteSynchronizer {
    shared: Arc<Shared>,
    identity: Arc<dyn IdentityProvider>,
    config: SyncConfig,
    timer: Mutex<DebounceTimer>,
}

impl NoteSynchronizer {
    pub fn new(
        store: Arc<dyn NoteStore>,
        identity: Arc<dyn IdentityProvider>,
        config: SyncConfig,
        parent_id: Option<WorldId>,
    ) -> Self {
        let session = EditSession::new(parent_id, 0);
        let (view_tx, _) = watch::channel(session.view());

        Self {
            shared: Arc::new(Shared {
                store,
                session: Mutex::new(session),
                save_lock: tokio::sync::Mutex::new(()),
                view_tx,
            }),
            identity,
            config,
            timer: Mutex::new(DebounceTimer::new()),
        }
    }

    fn timer(&self) -> MutexGuard<'_, DebounceTimer> {
        self.timer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn view(&self) -> NoteView {
        self.shared.view_tx.borrow().clone()
    }

    /// Watch channel that receives a fresh view after every state change
    pub fn subscribe(&self) -> watch::Receiver<NoteView> {
        self.shared.view_tx.subscribe()
    }

    pub fn content(&self) -> String {
        self.shared.session().local_content.clone()
    }

    pub fn note_id(&self) -> Option<NoteId> {
        self.shared.session().note_id
    }

    /// Fetch the world's note and seed the buffer from it.
    ///
    /// Does nothing and returns `Ok(None)` when there is no world or no
    /// actor. Failed fetches are retried per `SyncConfig::fetch_retries`;
    /// the final failure is kept as the view's error.
    pub async fn load(&self) -> Result<Option<Note>> {
        let (generation, parent_id) = {
            let session = self.shared.session();
            match session.parent_id.clone() {
                Some(parent_id) => (session.generation, parent_id),
                None => return Ok(None),
            }
        };
        if self.identity.current_actor().is_none() {
            debug!(%parent_id, "no actor, load disabled");
            return Ok(None);
        }

        {
            let mut session = self.shared.session();
            session.begin_load();
            self.shared.publish(&session);
        }

        let result = self.fetch_with_retry(&parent_id).await;

        let mut session = self.shared.session();
        if !session.is_current(generation) {
            return result.map_err(|e| ForgeError::Fetch(e.to_string()));
        }
        let outcome = match result {
            Ok(note) => {
                debug!(%parent_id, found = note.is_some(), "note loaded");
                session.apply_loaded(note.clone());
                Ok(note)
            }
            Err(e) => {
                warn!(%parent_id, error = %e, "failed to load note");
                session.fail_load(e.to_string());
                Err(ForgeError::Fetch(e.to_string()))
            }
        };
        self.shared.publish(&session);
        outcome
    }

    async fn fetch_with_retry(&self, parent_id: &str) -> Result<Option<Note>> {
        let mut attempt = 0;
        loop {
            match self.shared.store.fetch_note_by_parent(parent_id).await {
                Ok(note) => return Ok(note),
                Err(e) if attempt < self.config.fetch_retries => {
                    let delay = retry_delay(self.config.retry_base_delay, attempt);
                    debug!(%parent_id, attempt, error = %e, ?delay, "retrying fetch");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Replace the buffer and schedule a save after the quiet period.
    ///
    /// Without a world or an actor only the buffer changes.
    pub fn update_content(&self, text: impl Into<String>) {
        let text = text.into();
        let actor = self.identity.current_actor();

        let mut timer = self.timer();
        let mut session = self.shared.session();
        let target = session.parent_id.clone().zip(actor);
        let seq = session.edit(text.clone(), target.is_some());
        self.shared.publish(&session);

        let (Some(seq), Some((parent_id, actor))) = (seq, target) else {
            return;
        };
        let generation = session.generation;
        drop(session);

        let shared = self.shared.clone();
        debug!(%parent_id, seq, "save scheduled");
        timer.arm(self.config.debounce, async move {
            run_save(shared, generation, seq, parent_id, actor, text).await;
        });
    }

    /// Write the pending edit now instead of waiting out the quiet period,
    /// then wait for every save of this session to settle.
    pub async fn flush(&self) {
        let was_armed = self.timer().cancel();
        if was_armed {
            let pending = {
                let session = self.shared.session();
                let actor = self.identity.current_actor();
                session
                    .parent_id
                    .clone()
                    .zip(actor)
                    .map(|(parent_id, actor)| {
                        (
                            session.generation,
                            session.current_arm(),
                            parent_id,
                            actor,
                            session.local_content.clone(),
                        )
                    })
            };
            match pending {
                Some((generation, seq, parent_id, actor, text)) => {
                    run_save(self.shared.clone(), generation, seq, parent_id, actor, text).await;
                }
                None => {
                    let mut session = self.shared.session();
                    session.disarm();
                    self.shared.publish(&session);
                }
            }
        }

        let mut rx = self.subscribe();
        let _ = rx.wait_for(|view| !view.is_saving).await;
    }

    /// Point the editor at another world. Any pending save is dropped and
    /// the session starts over in `Loading`.
    pub fn set_parent(&self, parent_id: Option<WorldId>) {
        self.timer().cancel();
        let mut session = self.shared.session();
        let generation = session.generation + 1;
        *session = EditSession::new(parent_id, generation);
        self.shared.publish(&session);
    }

    /// Tear the session down. A save whose timer has not fired is dropped;
    /// saves already in flight finish but no longer touch this session.
    pub fn close(&self) {
        self.set_parent(None);
    }
}

impl Drop for NoteSynchronizer {
    fn drop(&mut self) {
        self.timer().cancel();
    }
}

fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_RETRY_DELAY)
}

async fn run_save(
    shared: Arc<Shared>,
    generation: u64,
    seq: u64,
    parent_id: WorldId,
    actor: ActorId,
    text: String,
) {
    {
        let mut session = shared.session();
        if session.is_current(generation) {
            session.save_dispatched(seq);
            shared.publish(&session);
        }
    }

    let _write = shared.save_lock.lock().await;

    // Read the id only after the previous write settled so a create is
    // always followed by updates.
    let note_id = {
        let session = shared.session();
        if session.is_current(generation) {
            session.note_id
        } else {
            None
        }
    };

    debug!(%parent_id, ?note_id, "saving note");
    let result = write_note(shared.store.as_ref(), &parent_id, &actor, note_id, text).await;

    let mut session = shared.session();
    if !session.is_current(generation) {
        if let Err(e) = result {
            warn!(%parent_id, error = %e, "save for closed session failed");
        }
        return;
    }
    match result {
        Ok(note) => session.save_succeeded(note),
        Err(e) => {
            let e = ForgeError::Save(e.to_string());
            warn!(%parent_id, error = %e, "dropping failed save");
        }
    }
    session.save_settled();
    shared.publish(&session);
}

/// Create or update. A create that loses the one-note-per-world race adopts
/// the existing note and overwrites it.
async fn write_note(
    store: &dyn NoteStore,
    parent_id: &str,
    actor: &str,
    note_id: Option<NoteId>,
    content: String,
) -> Result<Note> {
    if let Some(id) = note_id {
        return store.update_note(id, NoteUpdate { content }).await;
    }

    let created = store
        .create_note(NewNote {
            parent_id: parent_id.to_string(),
            owner_id: actor.to_string(),
            content: content.clone(),
        })
        .await;

    match created {
        Err(ForgeError::DuplicateNote { .. }) => {
            let existing = store
                .fetch_note_by_parent(parent_id)
                .await?
                .ok_or_else(|| ForgeError::Save(format!("note for '{}' vanished", parent_id)))?;
            debug!(%parent_id, note_id = %existing.id, "adopting existing note");
            store.update_note(existing.id, NoteUpdate { content }).await
        }
        other => other,
    }
}
