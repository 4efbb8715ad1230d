//! Who is editing. An absent actor disables loading and saving.

use crate::entity::ActorId;

pub const ACTOR_ENV: &str = "STELLARFORGE_ACTOR";

pub trait IdentityProvider: Send + Sync {
    fn current_actor(&self) -> Option<ActorId>;
}

/// Fixed actor, or none
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<ActorId>);

impl StaticIdentity {
    pub fn new(actor: impl Into<ActorId>) -> Self {
        Self(Some(actor.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_actor(&self) -> Option<ActorId> {
        self.0.clone()
    }
}

/// Resolves the actor from `STELLARFORGE_ACTOR`, then the git user email
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvIdentity;

impl IdentityProvider for EnvIdentity {
    fn current_actor(&self) -> Option<ActorId> {
        std::env::var(ACTOR_ENV)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(get_git_email)
    }
}

fn get_git_email() -> Option<String> {
    std::process::Command::new("git")
        .args(["config", "user.email"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout)
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            } else {
                None
            }
        })
}
