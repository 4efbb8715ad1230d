pub mod cli;
pub mod config;
pub mod entity;
pub mod error;
pub mod identity;
pub mod storage;
pub mod sync;

pub use config::{Config, SyncConfig};
pub use error::{ForgeError, Result};
pub use storage::NoteStore;
pub use sync::NoteSynchronizer;
