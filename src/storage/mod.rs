//! Persistence backends for world notes.
//!
//! Every backend implements [`NoteStore`], the remote-store contract the
//! synchronizer talks to. Each one enforces the one-note-per-world rule
//! itself and reports a second create as [`ForgeError::DuplicateNote`].

mod loro_store;
mod memory;
mod sqlite_store;

pub use loro_store::LoroNoteStore;
pub use memory::{MemoryStore, StoreCall};
pub use sqlite_store::SqliteNoteStore;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Backend;
use crate::entity::{NewNote, Note, NoteId, NoteUpdate};
use crate::error::{ForgeError, Result};

pub const FORGE_DIR: &str = ".stellarforge";

#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Fetch the note owned by `parent_id`, if any.
    async fn fetch_note_by_parent(&self, parent_id: &str) -> Result<Option<Note>>;

    /// Create a note. The store assigns `id`, `created_at` and `updated_at`.
    async fn create_note(&self, new: NewNote) -> Result<Note>;

    /// Replace the content of an existing note and refresh `updated_at`.
    async fn update_note(&self, id: NoteId, update: NoteUpdate) -> Result<Note>;

    /// All notes, oldest first.
    async fn list_notes(&self) -> Result<Vec<Note>>;
}

/// Path of the project data directory under `root`
pub fn forge_dir(root: &Path) -> PathBuf {
    root.join(FORGE_DIR)
}

/// Create the backend's files inside an existing `.stellarforge/` directory
pub fn init_store(dir: &Path, backend: Backend) -> Result<Arc<dyn NoteStore>> {
    let store: Arc<dyn NoteStore> = match backend {
        Backend::Loro => Arc::new(LoroNoteStore::init(dir)?),
        Backend::Sqlite => Arc::new(SqliteNoteStore::open(dir)?),
    };
    Ok(store)
}

/// Open the configured backend in an initialized `.stellarforge/` directory
pub fn open_store(dir: &Path, backend: Backend) -> Result<Arc<dyn NoteStore>> {
    if !dir.exists() {
        return Err(ForgeError::NotInitialized);
    }
    let store: Arc<dyn NoteStore> = match backend {
        Backend::Loro => Arc::new(LoroNoteStore::open(dir)?),
        Backend::Sqlite => Arc::new(SqliteNoteStore::open(dir)?),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_store_fails_without_forge_dir() {
        let tmp = TempDir::new().unwrap();
        let result = open_store(&forge_dir(tmp.path()), Backend::Sqlite);
        assert!(matches!(result, Err(ForgeError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_init_then_open_each_backend() {
        for backend in [Backend::Loro, Backend::Sqlite] {
            let tmp = TempDir::new().unwrap();
            let dir = forge_dir(tmp.path());
            std::fs::create_dir_all(&dir).unwrap();

            let store = init_store(&dir, backend).unwrap();
            store
                .create_note(NewNote {
                    parent_id: "w1".to_string(),
                    owner_id: "ada".to_string(),
                    content: "persisted".to_string(),
                })
                .await
                .unwrap();
            drop(store);

            let reopened = open_store(&dir, backend).unwrap();
            let note = reopened.fetch_note_by_parent("w1").await.unwrap().unwrap();
            assert_eq!(note.content, "persisted");
        }
    }
}
