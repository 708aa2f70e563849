use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use shared_types::{Category, Note, NoteId, NoteInput, NotePatch};

use super::{FetchError, NoteStore, CREATE_NOTE, FETCH_CATEGORIES, FETCH_NOTES, UPDATE_NOTE};

/// Operation kinds, used to inject failures and latency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ListNotes,
    ListCategories,
    CreateNote,
    UpdateNote,
}

impl StoreOp {
    fn action(self) -> &'static str {
        match self {
            Self::ListNotes => FETCH_NOTES,
            Self::ListCategories => FETCH_CATEGORIES,
            Self::CreateNote => CREATE_NOTE,
            Self::UpdateNote => UPDATE_NOTE,
        }
    }
}

/// One recorded call, with the exact body it carried
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    ListNotes,
    ListCategories,
    CreateNote(NoteInput),
    UpdateNote(NoteId, NotePatch),
}

#[derive(Default)]
struct Inner {
    notes: Vec<Note>,
    categories: Vec<Category>,
    next_id: NoteId,
    calls: Vec<StoreCall>,
    failures: HashMap<StoreOp, u16>,
    latency: HashMap<StoreOp, Duration>,
}

/// In-process `NoteStore`. Notes are kept newest first, like the API orders them.
#[derive(Default)]
pub struct InMemoryNoteStore {
    inner: Mutex<Inner>,
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categories(categories: Vec<Category>) -> Self {
        let store = Self::new();
        store.lock().categories = categories;
        store
    }

    /// Seed a note as if it had been stored earlier. Ids handed out later
    /// never collide with seeded ones.
    pub fn seed_note(&self, note: Note) {
        let mut inner = self.lock();
        inner.next_id = inner.next_id.max(note.id);
        inner.notes.push(note);
    }

    /// Make every call of `op` fail with `status` until `recover` is called
    pub fn fail(&self, op: StoreOp, status: u16) {
        self.lock().failures.insert(op, status);
    }

    pub fn recover(&self, op: StoreOp) {
        self.lock().failures.remove(&op);
    }

    /// Delay every call of `op` by `delay` before it completes
    pub fn set_latency(&self, op: StoreOp, delay: Duration) {
        self.lock().latency.insert(op, delay);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: StoreOp) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call_op(call) == op)
            .count()
    }

    pub fn updates(&self) -> Vec<(NoteId, NotePatch)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                StoreCall::UpdateNote(id, patch) => Some((*id, patch.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn creates(&self) -> Vec<NoteInput> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                StoreCall::CreateNote(input) => Some(input.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.lock().notes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records the call, then waits out any configured latency and reports
    /// an injected failure. The lock is never held across the await.
    async fn enter(&self, call: StoreCall) -> Result<(), FetchError> {
        let op = call_op(&call);
        let delay = {
            let mut inner = self.lock();
            inner.calls.push(call);
            inner.latency.get(&op).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.lock().failures.get(&op) {
            Some(status) => Err(FetchError::Status {
                action: op.action(),
                status: *status,
            }),
            None => Ok(()),
        }
    }
}

fn call_op(call: &StoreCall) -> StoreOp {
    match call {
        StoreCall::ListNotes => StoreOp::ListNotes,
        StoreCall::ListCategories => StoreOp::ListCategories,
        StoreCall::CreateNote(_) => StoreOp::CreateNote,
        StoreCall::UpdateNote(..) => StoreOp::UpdateNote,
    }
}

#[async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn list_notes(&self) -> Result<Vec<Note>, FetchError> {
        self.enter(StoreCall::ListNotes).await?;
        Ok(self.lock().notes.clone())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, FetchError> {
        self.enter(StoreCall::ListCategories).await?;
        Ok(self.lock().categories.clone())
    }

    async fn create_note(&self, input: &NoteInput) -> Result<Note, FetchError> {
        self.enter(StoreCall::CreateNote(input.clone())).await?;

        let mut inner = self.lock();
        inner.next_id += 1;
        let now = Utc::now();
        let category_name = category_name(&inner.categories, input.category);
        let note = Note {
            id: inner.next_id,
            title: input.title.clone(),
            content: input.content.clone(),
            category: input.category,
            category_name,
            created_at: Some(now),
            updated_at: Some(now),
        };
        inner.notes.insert(0, note.clone());
        Ok(note)
    }

    async fn update_note(&self, id: NoteId, patch: &NotePatch) -> Result<Note, FetchError> {
        self.enter(StoreCall::UpdateNote(id, patch.clone())).await?;

        let mut inner = self.lock();
        let Inner {
            notes, categories, ..
        } = &mut *inner;
        let note = notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(FetchError::Status {
                action: UPDATE_NOTE,
                status: 404,
            })?;

        if let Some(title) = &patch.title {
            note.title = title.clone();
        }
        if let Some(content) = &patch.content {
            note.content = content.clone();
        }
        if let Some(category) = patch.category {
            note.category = category;
            note.category_name = category_name(categories, category);
        }
        note.updated_at = Some(Utc::now());
        Ok(note.clone())
    }
}

fn category_name(categories: &[Category], id: Option<i64>) -> Option<String> {
    let id = id?;
    categories.iter().find(|c| c.id == id).map(|c| c.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i64, name: &str) -> Category {
        Category {
            id,
            name: name.to_string(),
            color: None,
            user: None,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ids_after_seeded_notes() {
        let store = InMemoryNoteStore::with_categories(vec![category(10, "Random Thoughts")]);
        store.seed_note(Note {
            id: 41,
            title: "old".to_string(),
            content: String::new(),
            category: None,
            category_name: None,
            created_at: None,
            updated_at: None,
        });

        let created = store
            .create_note(&NoteInput {
                title: "new".to_string(),
                content: "body".to_string(),
                category: Some(10),
            })
            .await
            .unwrap();

        assert_eq!(created.id, 42);
        assert_eq!(created.category_name.as_deref(), Some("Random Thoughts"));
        assert!(created.created_at.is_some());

        let notes = store.list_notes().await.unwrap();
        assert_eq!(notes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![42, 41]);
    }

    #[tokio::test]
    async fn test_update_applies_only_present_fields() {
        let store = InMemoryNoteStore::new();
        let created = store
            .create_note(&NoteInput {
                title: "T".to_string(),
                content: "C".to_string(),
                category: Some(3),
            })
            .await
            .unwrap();

        let updated = store
            .update_note(
                created.id,
                &NotePatch {
                    content: Some("C2".to_string()),
                    category: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "T");
        assert_eq!(updated.content, "C2");
        assert_eq!(updated.category, None);
    }

    #[tokio::test]
    async fn test_update_of_unknown_note_is_not_found() {
        let store = InMemoryNoteStore::new();
        let err = store
            .update_note(9, &NotePatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded_and_recoverable() {
        let store = InMemoryNoteStore::new();
        store.fail(StoreOp::ListNotes, 401);

        let err = store.list_notes().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch notes: 401");

        store.recover(StoreOp::ListNotes);
        assert!(store.list_notes().await.is_ok());
        assert_eq!(store.count(StoreOp::ListNotes), 2);
        assert_eq!(store.calls(), vec![StoreCall::ListNotes, StoreCall::ListNotes]);
    }
}
