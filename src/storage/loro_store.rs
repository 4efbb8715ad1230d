use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use loro::{LoroDoc, LoroMap, LoroValue, ValueOrContainer};

use super::NoteStore;
use crate::entity::{NewNote, Note, NoteId, NoteUpdate};
use crate::error::{ForgeError, Result};

const LORO_DB: &str = "notes.loro";

/// Notes kept in a Loro document that is snapshotted to disk on every write.
///
/// Layout: `notes` maps note id to a note map; `by_parent` maps world id to
/// note id and is what enforces one note per world.
pub struct LoroNoteStore {
    doc: Mutex<LoroDoc>,
    path: PathBuf,
}

impl LoroNoteStore {
    /// Create an empty document in `dir`
    pub fn init(dir: &Path) -> Result<Self> {
        let path = dir.join(LORO_DB);
        if path.exists() {
            return Err(ForgeError::AlreadyInitialized);
        }
        fs::create_dir_all(dir)?;

        let store = Self {
            doc: Mutex::new(LoroDoc::new()),
            path,
        };
        {
            let doc = store.doc()?;
            store.save(&doc)?;
        }
        Ok(store)
    }

    /// Open the document in `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(LORO_DB);
        if !path.exists() {
            return Err(ForgeError::NotInitialized);
        }

        let bytes = fs::read(&path)?;
        let doc = LoroDoc::new();
        doc.import(&bytes)?;

        Ok(Self {
            doc: Mutex::new(doc),
            path,
        })
    }

    fn doc(&self) -> Result<MutexGuard<'_, LoroDoc>> {
        self.doc
            .lock()
            .map_err(|_| ForgeError::Storage("loro document lock poisoned".to_string()))
    }

    /// Lock the document after merging in whatever other processes have
    /// written to disk since it was last read
    fn synced_doc(&self) -> Result<MutexGuard<'_, LoroDoc>> {
        let doc = self.doc()?;
        if self.path.exists() {
            let bytes = fs::read(&self.path)?;
            doc.import(&bytes)?;
        }
        Ok(doc)
    }

    fn save(&self, doc: &LoroDoc) -> Result<()> {
        let bytes = doc.export(loro::ExportMode::Snapshot)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    fn note_id_for_parent(doc: &LoroDoc, parent_id: &str) -> Option<String> {
        match doc.get_map("by_parent").get(parent_id)? {
            ValueOrContainer::Value(LoroValue::String(s)) => Some(s.to_string()),
            _ => None,
        }
    }

    fn read_note(doc: &LoroDoc, id_str: &str) -> Option<Note> {
        if let LoroValue::Map(map) = doc.get_map("notes").get_deep_value() {
            if let Some(LoroValue::Map(entity_map)) = map.get(id_str) {
                return parse_note_from_map(entity_map);
            }
        }
        None
    }

    fn write_note(doc: &LoroDoc, note: &Note) -> Result<()> {
        let notes = doc.get_map("notes");
        let id_str = note.id.to_string();
        let entity_map = notes.get_or_create_container(&id_str, LoroMap::new())?;

        entity_map.insert("id", id_str.clone())?;
        entity_map.insert("parent_id", note.parent_id.clone())?;
        entity_map.insert("owner_id", note.owner_id.clone())?;
        entity_map.insert("content", note.content.clone())?;
        entity_map.insert("created_at", note.created_at.to_rfc3339())?;
        entity_map.insert("updated_at", note.updated_at.to_rfc3339())?;
        Ok(())
    }
}

#[async_trait]
impl NoteStore for LoroNoteStore {
    async fn fetch_note_by_parent(&self, parent_id: &str) -> Result<Option<Note>> {
        let doc = self.synced_doc()?;
        Ok(Self::note_id_for_parent(&doc, parent_id).and_then(|id| Self::read_note(&doc, &id)))
    }

    async fn create_note(&self, new: NewNote) -> Result<Note> {
        let doc = self.synced_doc()?;
        if Self::note_id_for_parent(&doc, &new.parent_id).is_some() {
            return Err(ForgeError::DuplicateNote {
                parent_id: new.parent_id,
            });
        }

        let note = Note::from_new(new);
        Self::write_note(&doc, &note)?;
        doc.get_map("by_parent")
            .insert(&note.parent_id, note.id.to_string())?;

        doc.commit();
        self.save(&doc)?;
        tracing::info!(note_id = %note.id, parent_id = %note.parent_id, "created note");
        Ok(note)
    }

    async fn update_note(&self, id: NoteId, update: NoteUpdate) -> Result<Note> {
        let doc = self.synced_doc()?;
        let mut note = Self::read_note(&doc, &id.to_string()).ok_or(ForgeError::NoteNotFound(id))?;

        note.apply(update);
        Self::write_note(&doc, &note)?;

        doc.commit();
        self.save(&doc)?;
        Ok(note)
    }

    async fn list_notes(&self) -> Result<Vec<Note>> {
        let doc = self.synced_doc()?;
        let mut notes = Vec::new();

        if let LoroValue::Map(map) = doc.get_map("notes").get_deep_value() {
            for (_, entity_value) in map.iter() {
                if let LoroValue::Map(entity_map) = entity_value {
                    if let Some(note) = parse_note_from_map(entity_map) {
                        notes.push(note);
                    }
                }
            }
        }

        notes.sort_by_key(|n| n.created_at);
        Ok(notes)
    }
}

fn parse_note_from_map(map: &loro::LoroMapValue) -> Option<Note> {
    let string = |key: &str| match map.get(key)? {
        LoroValue::String(s) => Some(s.to_string()),
        _ => None,
    };
    let timestamp = |key: &str| {
        chrono::DateTime::parse_from_rfc3339(&string(key)?)
            .ok()
            .map(|t| t.with_timezone(&chrono::Utc))
    };

    Some(Note {
        id: string("id")?.parse().ok()?,
        parent_id: string("parent_id")?,
        owner_id: string("owner_id")?,
        content: string("content").unwrap_or_default(),
        created_at: timestamp("created_at")?,
        updated_at: timestamp("updated_at")?,
    })
}
