use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use super::NoteStore;
use crate::entity::{NewNote, Note, NoteId, NoteUpdate};
use crate::error::{ForgeError, Result};

const NOTES_DB: &str = "notes.db";

const NOTE_COLUMNS: &str = "id, parent_id, owner_id, content, created_at, updated_at";

/// SQLite-backed notes table. `UNIQUE(parent_id)` is what keeps two editors
/// from creating two notes for the same world.
pub struct SqliteNoteStore {
    conn: Mutex<Connection>,
}

impl SqliteNoteStore {
    /// Open or create the notes database in `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        let conn = Connection::open(dir.join(NOTES_DB))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory database, for tests
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ForgeError::Storage("sqlite connection lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        self.conn()?.execute(
            "CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                parent_id TEXT NOT NULL UNIQUE,
                owner_id TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn get_by_id(conn: &Connection, id: &NoteId) -> Result<Option<Note>> {
        let note = conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
                params![id.to_string()],
                row_to_note,
            )
            .optional()?;
        Ok(note)
    }
}

fn row_to_note(row: &Row<'_>) -> rusqlite::Result<Note> {
    let parse_err = |idx: usize, e: Box<dyn std::error::Error + Send + Sync>| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e)
    };
    let timestamp = |idx: usize| -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
        let raw: String = row.get(idx)?;
        chrono::DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&chrono::Utc))
            .map_err(|e| parse_err(idx, Box::new(e)))
    };

    let id: String = row.get(0)?;
    Ok(Note {
        id: id.parse().map_err(|e: uuid::Error| parse_err(0, Box::new(e)))?,
        parent_id: row.get(1)?,
        owner_id: row.get(2)?,
        content: row.get(3)?,
        created_at: timestamp(4)?,
        updated_at: timestamp(5)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn fetch_note_by_parent(&self, parent_id: &str) -> Result<Option<Note>> {
        let conn = self.conn()?;
        let note = conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE parent_id = ?1"),
                params![parent_id],
                row_to_note,
            )
            .optional()?;
        Ok(note)
    }

    async fn create_note(&self, new: NewNote) -> Result<Note> {
        let conn = self.conn()?;
        let note = Note::from_new(new);

        let inserted = conn.execute(
            &format!("INSERT INTO notes ({NOTE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                note.id.to_string(),
                note.parent_id,
                note.owner_id,
                note.content,
                note.created_at.to_rfc3339(),
                note.updated_at.to_rfc3339(),
            ],
        );
        match inserted {
            Ok(_) => {
                tracing::info!(note_id = %note.id, parent_id = %note.parent_id, "created note");
                Ok(note)
            }
            Err(e) if is_unique_violation(&e) => Err(ForgeError::DuplicateNote {
                parent_id: note.parent_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_note(&self, id: NoteId, update: NoteUpdate) -> Result<Note> {
        let conn = self.conn()?;
        let mut note = Self::get_by_id(&conn, &id)?.ok_or(ForgeError::NoteNotFound(id))?;
        note.apply(update);

        conn.execute(
            "UPDATE notes SET content = ?1, updated_at = ?2 WHERE id = ?3",
            params![note.content, note.updated_at.to_rfc3339(), id.to_string()],
        )?;
        Ok(note)
    }

    async fn list_notes(&self) -> Result<Vec<Note>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes ORDER BY created_at, rowid"
        ))?;
        let notes = stmt
            .query_map([], row_to_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }
}
