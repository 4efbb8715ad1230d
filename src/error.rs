use thiserror::Error;

use crate::entity::NoteId;

#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Not in a stellarforge project. Run 'stellarforge init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove .stellarforge/ to reinitialize.")]
    AlreadyInitialized,

    #[error("Note not found: {0}")]
    NoteNotFound(NoteId),

    #[error("A note already exists for world '{parent_id}'")]
    DuplicateNote { parent_id: String },

    #[error("No current actor. Pass --actor or set STELLARFORGE_ACTOR.")]
    NoActor,

    #[error("Failed to load note: {0}")]
    Fetch(String),

    #[error("Failed to save note: {0}")]
    Save(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Loro error: {0}")]
    Loro(#[from] loro::LoroError),

    #[error("Loro encode error: {0}")]
    LoroEncode(#[from] loro::LoroEncodeError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, ForgeError>;
