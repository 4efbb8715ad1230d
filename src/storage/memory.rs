use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::NoteStore;
use crate::entity::{NewNote, Note, NoteId, NoteUpdate};
use crate::error::{ForgeError, Result};

/// Which store call a recorded [`StoreCall`] was
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Fetch { parent_id: String },
    Create { parent_id: String, content: String },
    Update { id: NoteId, content: String },
}

#[derive(Default)]
struct MemoryState {
    notes: HashMap<NoteId, Note>,
    calls: Vec<StoreCall>,
    failures: VecDeque<String>,
}

/// In-process store. Also records every call and can inject latency and
/// failures, which makes it the store the synchronizer tests run against.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    latency: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `latency` before touching state
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            latency,
        }
    }

    /// Seed a note directly, bypassing the call log
    pub async fn insert(&self, note: Note) {
        self.state.lock().await.notes.insert(note.id, note);
    }

    /// Make the next store call fail with `message`
    pub async fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().await.failures.push_back(message.into());
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn note_count(&self) -> usize {
        self.state.lock().await.notes.len()
    }

    async fn begin(&self, call: StoreCall) -> Result<tokio::sync::MutexGuard<'_, MemoryState>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut state = self.state.lock().await;
        state.calls.push(call);
        if let Some(message) = state.failures.pop_front() {
            return Err(ForgeError::Storage(message));
        }
        Ok(state)
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn fetch_note_by_parent(&self, parent_id: &str) -> Result<Option<Note>> {
        let state = self
            .begin(StoreCall::Fetch {
                parent_id: parent_id.to_string(),
            })
            .await?;
        Ok(state
            .notes
            .values()
            .find(|n| n.parent_id == parent_id)
            .cloned())
    }

    async fn create_note(&self, new: NewNote) -> Result<Note> {
        let mut state = self
            .begin(StoreCall::Create {
                parent_id: new.parent_id.clone(),
                content: new.content.clone(),
            })
            .await?;
        if state.notes.values().any(|n| n.parent_id == new.parent_id) {
            return Err(ForgeError::DuplicateNote {
                parent_id: new.parent_id,
            });
        }
        let note = Note::from_new(new);
        state.notes.insert(note.id, note.clone());
        Ok(note)
    }

    async fn update_note(&self, id: NoteId, update: NoteUpdate) -> Result<Note> {
        let mut state = self
            .begin(StoreCall::Update {
                id,
                content: update.content.clone(),
            })
            .await?;
        let note = state.notes.get_mut(&id).ok_or(ForgeError::NoteNotFound(id))?;
        note.apply(update);
        Ok(note.clone())
    }

    async fn list_notes(&self) -> Result<Vec<Note>> {
        let state = self.state.lock().await;
        let mut notes: Vec<Note> = state.notes.values().cloned().collect();
        notes.sort_by_key(|n| n.created_at);
        Ok(notes)
    }
}
