mod note;

pub use note::{NewNote, Note, NoteUpdate};

use uuid::Uuid;

/// Server-assigned note identifier
pub type NoteId = Uuid;

/// Identifier of the world that owns a note
pub type WorldId = String;

/// Identifier of the actor (signed-in user) editing a note
pub type ActorId = String;
