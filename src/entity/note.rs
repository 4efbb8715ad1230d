// src/entity/note.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ActorId, NoteId, WorldId};

/// A world's note as stored remotely. There is at most one per world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub parent_id: WorldId,
    pub owner_id: ActorId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Materialize a create payload the way a store does: fresh id, both
    /// timestamps set to now.
    pub fn from_new(new: NewNote) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            parent_id: new.parent_id,
            owner_id: new.owner_id,
            content: new.content,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update payload and refresh `updated_at`
    pub fn apply(&mut self, update: NoteUpdate) {
        self.content = update.content;
        self.updated_at = Utc::now();
    }
}

/// Create payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub parent_id: WorldId,
    pub owner_id: ActorId,
    pub content: String,
}

/// Update payload for a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdate {
    pub content: String,
}
