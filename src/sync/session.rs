// src/sync/session.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entity::{Note, NoteId, WorldId};

/// Where an edit session is in its load lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No load has completed yet
    #[default]
    Loading,
    /// Load completed and the world had no note
    Empty,
    /// A note exists and its id is known
    Populated,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Loading => write!(f, "loading"),
            Phase::Empty => write!(f, "empty"),
            Phase::Populated => write!(f, "populated"),
        }
    }
}

/// What the editor renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct NoteView {
    pub content: String,
    pub phase: Phase,
    pub is_loading: bool,
    pub is_saving: bool,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Latest record confirmed by the store
    pub note: Option<Note>,
}

/// In-memory state of one editor for one world.
///
/// `generation` identifies the session; completions carrying an older
/// generation belong to a closed or re-targeted session and are ignored.
/// `arm_seq` identifies the most recent debounce arm so a timer that fires
/// while being re-armed cannot clear the newer arm's flag.
#[derive(Debug, Default)]
pub struct EditSession {
    pub parent_id: Option<WorldId>,
    pub local_content: String,
    pub note_id: Option<NoteId>,
    pub note: Option<Note>,
    pub phase: Phase,
    pub last_updated: Option<DateTime<Utc>>,
    pub load_error: Option<String>,
    pub generation: u64,
    loads_in_flight: usize,
    saves_in_flight: usize,
    timer_armed: bool,
    arm_seq: u64,
    /// Set once the user edits; the load result no longer touches the buffer
    dirty: bool,
}

impl EditSession {
    pub fn new(parent_id: Option<WorldId>, generation: u64) -> Self {
        Self {
            parent_id,
            generation,
            ..Default::default()
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn is_saving(&self) -> bool {
        self.timer_armed || self.saves_in_flight > 0
    }

    pub fn begin_load(&mut self) {
        self.loads_in_flight += 1;
    }

    /// Apply a completed fetch. The buffer is only initialized from the
    /// server if the user has not typed yet.
    pub fn apply_loaded(&mut self, note: Option<Note>) {
        self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
        self.load_error = None;

        match note {
            Some(note) => {
                if !self.dirty {
                    self.local_content = note.content.clone();
                }
                if self.note_id.is_none() {
                    self.note_id = Some(note.id);
                    self.last_updated = Some(note.updated_at);
                    self.note = Some(note);
                }
                self.phase = Phase::Populated;
            }
            None => {
                if !self.dirty {
                    self.local_content.clear();
                }
                if self.note_id.is_none() {
                    self.phase = Phase::Empty;
                }
            }
        }
    }

    pub fn fail_load(&mut self, message: String) {
        self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
        self.load_error = Some(message);
    }

    /// Record a keystroke. Returns the arm sequence the caller must pass
    /// back when the resulting save is dispatched, or `None` if saving is
    /// disabled for this edit.
    pub fn edit(&mut self, text: String, can_save: bool) -> Option<u64> {
        self.local_content = text;
        self.dirty = true;
        if !can_save {
            return None;
        }
        self.arm_seq += 1;
        self.timer_armed = true;
        Some(self.arm_seq)
    }

    /// The debounce timer for `seq` fired. Only the latest arm clears the
    /// armed flag.
    pub fn save_dispatched(&mut self, seq: u64) {
        if seq == self.arm_seq {
            self.timer_armed = false;
        }
        self.saves_in_flight += 1;
    }

    /// Sequence number of the most recent arm
    pub fn current_arm(&self) -> u64 {
        self.arm_seq
    }

    /// The pending timer was cancelled without firing
    pub fn disarm(&mut self) {
        self.timer_armed = false;
    }

    /// A create or update came back. Records the note id, which makes every
    /// later save an update.
    pub fn save_succeeded(&mut self, note: Note) {
        self.note_id = Some(note.id);
        self.last_updated = Some(note.updated_at);
        self.phase = Phase::Populated;
        self.note = Some(note);
    }

    /// Network call settled, either way
    pub fn save_settled(&mut self) {
        self.saves_in_flight = self.saves_in_flight.saturating_sub(1);
    }

    pub fn view(&self) -> NoteView {
        NoteView {
            content: self.local_content.clone(),
            phase: self.phase,
            is_loading: self.loads_in_flight > 0,
            is_saving: self.is_saving(),
            error: self.load_error.clone(),
            last_updated: self.last_updated,
            note: self.note.clone(),
        }
    }
}
