//! Debounced autosave for world notes.
//!
//! The editor writes every keystroke into an [`EditSession`] through a
//! [`NoteSynchronizer`]; writes reach the store only after a quiet period,
//! scheduled on a [`DebounceTimer`].

mod debounce;
mod session;
mod synchronizer;

pub use debounce::DebounceTimer;
pub use session::{EditSession, NoteView, Phase};
pub use synchronizer::NoteSynchronizer;
