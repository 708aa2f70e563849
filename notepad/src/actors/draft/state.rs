//! Draft bookkeeping, free of any actor or I/O concerns.
//!
//! Every mutation the draft controller performs goes through `Draft`, so the
//! save guards and dirty-tracking rules can be tested without timers.

use chrono::{DateTime, Utc};
use shared_types::{
    CategoryId, Note, NoteId, NoteInput, NotePatch, PLACEHOLDER_CONTENT, PLACEHOLDER_TITLE,
};

/// Where the editor is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftPhase {
    /// No editor open
    Closed,
    /// New note requested, categories still being primed
    Opening,
    /// Editor open, draft clean or dirty
    Editing,
    /// A persistence call is in flight
    Saving,
    /// Flush in progress before returning to Closed
    Closing,
}

/// Read-only copy of the draft for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct DraftSnapshot {
    pub phase: DraftPhase,
    pub editor_open: bool,
    pub note_id: Option<NoteId>,
    pub title: String,
    pub content: String,
    pub category_id: Option<CategoryId>,
    pub last_edited_at: Option<DateTime<Utc>>,
    pub dirty: bool,
    pub error: Option<String>,
    pub filter_category_id: Option<CategoryId>,
}

/// The remote call a save boils down to
#[derive(Debug, Clone, PartialEq)]
pub enum SaveRequest {
    Create(NoteInput),
    Update(NoteId, NotePatch),
}

/// A save that passed its guards, tagged with the edit revision it covers
#[derive(Debug, Clone, PartialEq)]
pub struct SavePlan {
    pub request: SaveRequest,
    pub revision: u64,
}

/// Why a save attempt turned into a no-op
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveSkip {
    EditorClosed,
    /// The placeholder note of a new draft is still being created
    Creating,
    InFlight,
    Clean,
    NothingToSave,
}

#[derive(Debug, Default)]
pub struct Draft {
    editor_open: bool,
    opening: bool,
    closing: bool,
    saving: bool,
    creating: bool,
    note_id: Option<NoteId>,
    title: String,
    content: String,
    category_id: Option<CategoryId>,
    last_edited_at: Option<DateTime<Utc>>,
    dirty: bool,
    error: Option<String>,
    filter_category_id: Option<CategoryId>,
    revision: u64,
    generation: u64,
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> DraftPhase {
        if !self.editor_open {
            if self.opening {
                DraftPhase::Opening
            } else {
                DraftPhase::Closed
            }
        } else if self.closing {
            DraftPhase::Closing
        } else if self.saving {
            DraftPhase::Saving
        } else {
            DraftPhase::Editing
        }
    }

    pub fn snapshot(&self) -> DraftSnapshot {
        DraftSnapshot {
            phase: self.phase(),
            editor_open: self.editor_open,
            note_id: self.note_id,
            title: self.title.clone(),
            content: self.content.clone(),
            category_id: self.category_id,
            last_edited_at: self.last_edited_at,
            dirty: self.dirty,
            error: self.error.clone(),
            filter_category_id: self.filter_category_id,
        }
    }

    /// Bumped on every open and close; completions from an older generation
    /// belong to a draft that no longer exists.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_opening(&self) -> bool {
        self.opening
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub fn is_open(&self) -> bool {
        self.editor_open
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// A debounce cycle is due: editor open, unsaved edits, not closing
    pub fn needs_autosave(&self) -> bool {
        self.editor_open && self.dirty && !self.closing
    }

    // ------------------------------------------------------------------------
    // Open / close
    // ------------------------------------------------------------------------

    /// Start a new-note flow: placeholder fields, nothing created remotely yet
    pub fn begin_new(&mut self) -> u64 {
        self.start_generation();
        self.opening = true;
        self.note_id = None;
        self.title = PLACEHOLDER_TITLE.to_string();
        self.content = PLACEHOLDER_CONTENT.to_string();
        self.category_id = None;
        self.last_edited_at = None;
        self.generation
    }

    /// Categories are known: show the editor and hold the save guard while
    /// the placeholder note is created.
    pub fn show_new(&mut self, category_id: Option<CategoryId>) -> NoteInput {
        self.opening = false;
        self.editor_open = true;
        self.category_id = category_id;
        self.creating = true;
        NoteInput {
            title: PLACEHOLDER_TITLE.to_string(),
            content: PLACEHOLDER_CONTENT.to_string(),
            category: category_id,
        }
    }

    pub fn abort_new(&mut self) {
        self.opening = false;
    }

    pub fn new_note_created(&mut self, note: &Note) {
        self.creating = false;
        self.note_id = Some(note.id);
        self.last_edited_at = note.last_touched_at();
    }

    pub fn new_note_failed(&mut self) {
        self.creating = false;
    }

    /// Load a stored note. Opening is not an edit, so the draft starts clean.
    pub fn open_existing(&mut self, note: &Note) -> u64 {
        self.start_generation();
        self.editor_open = true;
        self.note_id = Some(note.id);
        self.title = note.title.clone();
        self.content = note.content.clone();
        self.category_id = note.category;
        self.last_edited_at = note.last_touched_at();
        self.generation
    }

    pub fn begin_close(&mut self) {
        self.closing = true;
    }

    /// Flush failed: the editor stays open with the error visible
    pub fn abort_close(&mut self) {
        self.closing = false;
    }

    pub fn reset_closed(&mut self, default_category: Option<CategoryId>) {
        self.start_generation();
        self.editor_open = false;
        self.filter_category_id = None;
        self.note_id = None;
        self.title.clear();
        self.content.clear();
        self.category_id = default_category;
        self.last_edited_at = None;
    }

    fn start_generation(&mut self) {
        self.generation += 1;
        self.editor_open = false;
        self.opening = false;
        self.closing = false;
        self.saving = false;
        self.creating = false;
        self.dirty = false;
        self.error = None;
    }

    // ------------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------------

    pub fn edit_title(&mut self, value: String, at: DateTime<Utc>) {
        self.title = value;
        self.touch(at);
    }

    pub fn edit_content(&mut self, value: String, at: DateTime<Utc>) {
        self.content = value;
        self.touch(at);
    }

    pub fn select_category(&mut self, category_id: Option<CategoryId>, at: DateTime<Utc>) {
        self.category_id = category_id;
        self.touch(at);
    }

    pub fn set_filter_category(&mut self, category_id: Option<CategoryId>) {
        self.filter_category_id = category_id;
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.last_edited_at = Some(at);
        self.dirty = true;
        self.revision += 1;
    }

    // ------------------------------------------------------------------------
    // Saving
    // ------------------------------------------------------------------------

    /// Run the save guards. On success the in-flight guard is taken and the
    /// previous error cleared; the caller must report back through
    /// `save_succeeded` or `save_failed`.
    pub fn plan_save(&mut self, flush: bool) -> Result<SavePlan, SaveSkip> {
        if !self.editor_open {
            return Err(SaveSkip::EditorClosed);
        }
        if self.creating {
            return Err(SaveSkip::Creating);
        }
        if self.saving {
            return Err(SaveSkip::InFlight);
        }
        if !self.dirty && !flush {
            return Err(SaveSkip::Clean);
        }
        if flush && !self.has_input() {
            return Err(SaveSkip::NothingToSave);
        }

        let input = NoteInput {
            title: self.title.trim().to_string(),
            content: self.content.clone(),
            category: self.category_id,
        };
        let request = match self.note_id {
            Some(id) => SaveRequest::Update(id, NotePatch::full(&input)),
            None => SaveRequest::Create(input),
        };

        self.saving = true;
        self.error = None;
        Ok(SavePlan {
            request,
            revision: self.revision,
        })
    }

    /// The dirty flag only clears if no edit landed after the plan was taken
    pub fn save_succeeded(&mut self, revision: u64, created: Option<&Note>) {
        self.saving = false;
        if let Some(note) = created {
            self.note_id = Some(note.id);
        }
        if revision == self.revision {
            self.dirty = false;
        }
    }

    pub fn save_failed(&mut self, message: String) {
        self.saving = false;
        self.error = Some(message);
    }

    fn has_input(&self) -> bool {
        !self.title.trim().is_empty()
            || !self.content.trim().is_empty()
            || self.category_id.is_some()
    }
}
