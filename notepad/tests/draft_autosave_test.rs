//! Draft Controller Integration Tests
//!
//! Drives DraftActor + CollectionActor against the in-memory store with the
//! tokio clock paused, so the 900ms debounce runs in virtual time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notepad::actors::draft::{self, DraftError, DraftPhase, DEFAULT_AUTOSAVE_DELAY};
use notepad::actors::{collection, Notepad};
use notepad::remote::{InMemoryNoteStore, StoreOp};
use notepad::session::SharedSessionObserver;
use shared_types::{Category, Note, NoteInput, NotePatch, PLACEHOLDER_CONTENT, PLACEHOLDER_TITLE};

fn category(id: i64, name: &str) -> Category {
    Category {
        id,
        name: name.to_string(),
        color: None,
        user: None,
    }
}

fn default_categories() -> Vec<Category> {
    vec![category(10, "Random Thoughts"), category(11, "School")]
}

fn note(id: i64, title: &str, content: &str, category: Option<i64>) -> Note {
    Note {
        id,
        title: title.to_string(),
        content: content.to_string(),
        category,
        category_name: None,
        created_at: None,
        updated_at: None,
    }
}

struct Harness {
    store: Arc<InMemoryNoteStore>,
    notepad: Notepad,
    auth_errors: Arc<AtomicUsize>,
}

impl Harness {
    async fn new(store: InMemoryNoteStore) -> Self {
        let store = Arc::new(store);
        let auth_errors = Arc::new(AtomicUsize::new(0));
        let counter = auth_errors.clone();
        let session: SharedSessionObserver = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let notepad = Notepad::spawn(store.clone(), session, DEFAULT_AUTOSAVE_DELAY)
            .await
            .expect("Failed to spawn notepad actors");
        Self {
            store,
            notepad,
            auth_errors,
        }
    }

    async fn snapshot(&self) -> draft::DraftSnapshot {
        draft::draft_snapshot(&self.notepad.draft)
            .await
            .expect("Draft snapshot failed")
    }

    fn auth_errors(&self) -> usize {
        self.auth_errors.load(Ordering::SeqCst)
    }
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn full_patch(title: &str, content: &str, category: Option<i64>) -> NotePatch {
    NotePatch {
        title: Some(title.to_string()),
        content: Some(content.to_string()),
        category: Some(category),
    }
}

// ============================================================================
// Debounced Autosave Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_autosave_fires_once_after_quiet_period() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.seed_note(note(42, "T", "C", Some(10)));
    let h = Harness::new(store).await;

    draft::open_existing_note(&h.notepad.draft, note(42, "T", "C", Some(10))).unwrap();
    draft::change_content(&h.notepad.draft, "C2").unwrap();

    advance(899).await;
    assert!(h.store.updates().is_empty(), "no save before the quiet period ends");

    advance(50).await;
    assert_eq!(h.store.updates(), vec![(42, full_patch("T", "C2", Some(10)))]);

    let snap = h.snapshot().await;
    assert!(!snap.dirty);
    assert_eq!(snap.phase, DraftPhase::Editing);

    advance(5000).await;
    assert_eq!(h.store.updates().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_coalesce_into_last_state() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.seed_note(note(1, "T", "C", None));
    let h = Harness::new(store).await;

    draft::open_existing_note(&h.notepad.draft, note(1, "T", "C", None)).unwrap();
    draft::change_title(&h.notepad.draft, "a").unwrap();
    advance(300).await;
    draft::change_title(&h.notepad.draft, "ab").unwrap();
    advance(300).await;
    draft::select_category(&h.notepad.draft, Some(11)).unwrap();
    draft::change_title(&h.notepad.draft, "abc").unwrap();

    advance(800).await;
    assert!(h.store.updates().is_empty());

    advance(200).await;
    assert_eq!(h.store.updates(), vec![(1, full_patch("abc", "C", Some(11)))]);
}

#[tokio::test(start_paused = true)]
async fn test_open_existing_note_never_autosaves() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.seed_note(note(1, "T", "C", None));
    let h = Harness::new(store).await;

    draft::open_existing_note(&h.notepad.draft, note(1, "T", "C", None)).unwrap();
    advance(2000).await;

    assert!(h.store.calls().is_empty());
    let snap = h.snapshot().await;
    assert!(!snap.dirty);
    assert_eq!(snap.note_id, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_inflight_save_is_saved_next_cycle() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.seed_note(note(1, "T", "C", None));
    store.set_latency(StoreOp::UpdateNote, Duration::from_millis(2000));
    let h = Harness::new(store).await;

    draft::open_existing_note(&h.notepad.draft, note(1, "T", "C", None)).unwrap();
    draft::change_content(&h.notepad.draft, "A").unwrap();

    // First save starts at 900ms and is outstanding until 2900ms
    advance(1000).await;
    assert_eq!(h.snapshot().await.phase, DraftPhase::Saving);
    draft::change_content(&h.notepad.draft, "B").unwrap();

    // The 1900ms fire finds a save in flight and is dropped
    advance(1000).await;
    assert_eq!(h.store.updates().len(), 1);

    // The first save lands but does not cover the second edit
    advance(1000).await;
    let snap = h.snapshot().await;
    assert!(snap.dirty);
    assert_eq!(snap.phase, DraftPhase::Editing);
    assert_eq!(h.store.updates().len(), 1);

    advance(1000).await;
    assert_eq!(
        h.store.updates(),
        vec![
            (1, full_patch("T", "A", None)),
            (1, full_patch("T", "B", None)),
        ]
    );

    advance(2000).await;
    assert!(!h.snapshot().await.dirty);
}

#[tokio::test(start_paused = true)]
async fn test_failed_autosave_records_error_and_keeps_dirty() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.seed_note(note(1, "T", "C", None));
    store.fail(StoreOp::UpdateNote, 500);
    let h = Harness::new(store).await;

    draft::open_existing_note(&h.notepad.draft, note(1, "T", "C", None)).unwrap();
    draft::change_content(&h.notepad.draft, "C2").unwrap();
    advance(1000).await;

    let snap = h.snapshot().await;
    assert!(snap.dirty);
    assert_eq!(snap.error.as_deref(), Some("Failed to update note: 500"));
    assert!(snap.editor_open);
    assert_eq!(h.auth_errors(), 0, "save failures are not auth errors");

    // The next edit retries through the debounce
    h.store.recover(StoreOp::UpdateNote);
    draft::change_content(&h.notepad.draft, "C3").unwrap();
    advance(1000).await;

    let snap = h.snapshot().await;
    assert!(!snap.dirty);
    assert_eq!(snap.error, None);
    assert_eq!(h.store.updates().len(), 2);
}

// ============================================================================
// Close / Flush Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_close_flushes_pending_changes_then_refreshes() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.seed_note(note(7, "T", "C", Some(10)));
    let h = Harness::new(store).await;

    draft::open_existing_note(&h.notepad.draft, note(7, "T", "C", Some(10))).unwrap();
    draft::change_title(&h.notepad.draft, "T2").unwrap();
    draft::close_note(&h.notepad.draft).await.unwrap();

    assert_eq!(h.store.updates(), vec![(7, full_patch("T2", "C", Some(10)))]);
    assert_eq!(h.store.count(StoreOp::ListNotes), 1);
    assert_eq!(h.store.count(StoreOp::ListCategories), 1);

    // The cancelled debounce never fires afterwards
    advance(2000).await;
    assert_eq!(h.store.updates().len(), 1);

    let snap = h.snapshot().await;
    assert_eq!(snap.phase, DraftPhase::Closed);
    assert!(!snap.editor_open);
    assert_eq!(snap.note_id, None);
    assert_eq!(snap.title, "");
    assert_eq!(snap.content, "");
    assert!(!snap.dirty);

    let collection = collection::collection_snapshot(&h.notepad.collection)
        .await
        .unwrap();
    assert_eq!(collection.notes[0].title, "T2");
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_keeps_editor_open() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.seed_note(note(7, "T", "C", Some(10)));
    store.fail(StoreOp::UpdateNote, 500);
    let h = Harness::new(store).await;

    draft::open_existing_note(&h.notepad.draft, note(7, "T", "C", Some(10))).unwrap();
    draft::change_title(&h.notepad.draft, "T2").unwrap();

    let err = draft::close_note(&h.notepad.draft).await.unwrap_err();
    assert_eq!(
        err,
        DraftError::SaveFailed("Failed to update note: 500".to_string())
    );

    let snap = h.snapshot().await;
    assert!(snap.editor_open);
    assert_eq!(snap.phase, DraftPhase::Editing);
    assert_eq!(snap.title, "T2");
    assert!(snap.dirty);
    assert_eq!(snap.error.as_deref(), Some("Failed to update note: 500"));
    assert_eq!(h.store.count(StoreOp::ListNotes), 0, "no refresh after a failed flush");

    h.store.recover(StoreOp::UpdateNote);
    draft::close_note(&h.notepad.draft).await.unwrap();
    assert_eq!(h.snapshot().await.phase, DraftPhase::Closed);
    assert_eq!(h.store.count(StoreOp::ListNotes), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_of_empty_draft_skips_flush() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.seed_note(note(3, "", "", None));
    let h = Harness::new(store).await;

    draft::open_existing_note(&h.notepad.draft, note(3, "", "", None)).unwrap();
    draft::close_note(&h.notepad.draft).await.unwrap();

    assert!(h.store.updates().is_empty());
    assert!(h.store.creates().is_empty());
    assert_eq!(h.store.count(StoreOp::ListNotes), 1);
    assert_eq!(h.snapshot().await.phase, DraftPhase::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_close_resets_category_and_filter() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.seed_note(note(7, "T", "C", Some(11)));
    let h = Harness::new(store).await;
    assert!(collection::refresh(&h.notepad.collection).await.unwrap());

    draft::set_filter_category(&h.notepad.draft, Some(11)).unwrap();
    draft::open_existing_note(&h.notepad.draft, note(7, "T", "C", Some(11))).unwrap();
    assert_eq!(h.snapshot().await.filter_category_id, Some(11));

    draft::close_note(&h.notepad.draft).await.unwrap();

    let snap = h.snapshot().await;
    assert_eq!(snap.filter_category_id, None);
    assert_eq!(snap.category_id, Some(10));
    assert_eq!(snap.last_edited_at, None);
    assert_eq!(snap.error, None);
}

// ============================================================================
// New Note Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_new_note_primes_categories_and_picks_random_thoughts() {
    let h = Harness::new(InMemoryNoteStore::with_categories(default_categories())).await;

    draft::open_new_note(&h.notepad.draft).unwrap();
    advance(10).await;

    let snap = h.snapshot().await;
    assert_eq!(snap.phase, DraftPhase::Editing);
    assert_eq!(snap.category_id, Some(10));
    assert_eq!(snap.title, PLACEHOLDER_TITLE);
    assert_eq!(snap.content, PLACEHOLDER_CONTENT);
    assert_eq!(snap.note_id, Some(1));
    assert!(snap.last_edited_at.is_some());
    assert!(!snap.dirty);

    assert_eq!(
        h.store.creates(),
        vec![NoteInput {
            title: PLACEHOLDER_TITLE.to_string(),
            content: PLACEHOLDER_CONTENT.to_string(),
            category: Some(10),
        }]
    );

    let collection = collection::collection_snapshot(&h.notepad.collection)
        .await
        .unwrap();
    assert_eq!(collection.categories, default_categories());
    assert_eq!(collection.notes.len(), 1);
    assert_eq!(collection.notes[0].id, 1);
}

#[tokio::test(start_paused = true)]
async fn test_new_note_without_default_category() {
    let h = Harness::new(InMemoryNoteStore::with_categories(vec![category(11, "School")])).await;

    draft::open_new_note(&h.notepad.draft).unwrap();
    advance(10).await;

    assert_eq!(h.snapshot().await.category_id, None);
    assert_eq!(h.store.creates()[0].category, None);
}

#[tokio::test(start_paused = true)]
async fn test_new_note_uses_cached_categories() {
    let h = Harness::new(InMemoryNoteStore::with_categories(default_categories())).await;
    assert!(collection::refresh(&h.notepad.collection).await.unwrap());

    draft::open_new_note(&h.notepad.draft).unwrap();
    advance(10).await;

    assert_eq!(h.store.count(StoreOp::ListCategories), 1, "no second category fetch");
    assert_eq!(h.snapshot().await.category_id, Some(10));
}

#[tokio::test(start_paused = true)]
async fn test_priming_failure_aborts_and_signals_auth_error() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.fail(StoreOp::ListCategories, 401);
    let h = Harness::new(store).await;

    draft::open_new_note(&h.notepad.draft).unwrap();
    advance(10).await;

    assert_eq!(h.auth_errors(), 1);
    assert_eq!(h.snapshot().await.phase, DraftPhase::Closed);
    assert!(h.store.creates().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_create_failure_signals_auth_error_without_banner() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.fail(StoreOp::CreateNote, 403);
    let h = Harness::new(store).await;

    draft::open_new_note(&h.notepad.draft).unwrap();
    advance(10).await;

    assert_eq!(h.auth_errors(), 1);
    let snap = h.snapshot().await;
    assert!(snap.editor_open);
    assert_eq!(snap.error, None);
    assert_eq!(snap.note_id, None);

    // A later autosave creates the note instead
    h.store.recover(StoreOp::CreateNote);
    draft::change_title(&h.notepad.draft, "Retry").unwrap();
    advance(1000).await;

    assert_eq!(h.store.creates().len(), 2);
    assert_eq!(h.store.creates()[1].title, "Retry");
    assert_eq!(h.snapshot().await.note_id, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_close_during_new_note_creation_waits_then_flushes() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.set_latency(StoreOp::CreateNote, Duration::from_millis(100));
    let h = Harness::new(store).await;
    assert!(collection::refresh(&h.notepad.collection).await.unwrap());

    draft::open_new_note(&h.notepad.draft).unwrap();
    draft::change_title(&h.notepad.draft, "Groceries").unwrap();
    draft::close_note(&h.notepad.draft).await.unwrap();

    assert_eq!(h.store.creates().len(), 1);
    assert_eq!(
        h.store.updates(),
        vec![(1, full_patch("Groceries", PLACEHOLDER_CONTENT, Some(10)))]
    );
    assert_eq!(h.snapshot().await.phase, DraftPhase::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_close_during_category_priming_waits_then_flushes() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.set_latency(StoreOp::ListCategories, Duration::from_millis(100));
    let h = Harness::new(store).await;

    draft::open_new_note(&h.notepad.draft).unwrap();
    draft::change_title(&h.notepad.draft, "Groceries").unwrap();
    draft::close_note(&h.notepad.draft).await.unwrap();

    assert_eq!(h.store.creates().len(), 1);
    assert_eq!(
        h.store.updates(),
        vec![(1, full_patch("Groceries", PLACEHOLDER_CONTENT, Some(10)))]
    );
    assert_eq!(h.snapshot().await.phase, DraftPhase::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_priming_failure_fails_a_waiting_close() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.fail(StoreOp::ListCategories, 500);
    store.set_latency(StoreOp::ListCategories, Duration::from_millis(100));
    let h = Harness::new(store).await;

    draft::open_new_note(&h.notepad.draft).unwrap();
    draft::change_title(&h.notepad.draft, "Groceries").unwrap();

    let err = draft::close_note(&h.notepad.draft).await.unwrap_err();
    assert_eq!(
        err,
        DraftError::SaveFailed("Failed to fetch categories: 500".to_string())
    );
    assert_eq!(h.auth_errors(), 1);
    assert!(h.store.creates().is_empty());
    assert_eq!(h.snapshot().await.phase, DraftPhase::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_open_during_close_flush_answers_the_close() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.seed_note(note(7, "T", "C", Some(10)));
    store.seed_note(note(8, "Other", "Body", None));
    store.set_latency(StoreOp::UpdateNote, Duration::from_millis(500));
    let h = Harness::new(store).await;

    draft::open_existing_note(&h.notepad.draft, note(7, "T", "C", Some(10))).unwrap();
    draft::change_title(&h.notepad.draft, "T2").unwrap();

    let draft_ref = h.notepad.draft.clone();
    let closing = tokio::spawn(async move { draft::close_note(&draft_ref).await });
    advance(10).await;
    assert_eq!(h.snapshot().await.phase, DraftPhase::Closing);

    draft::open_existing_note(&h.notepad.draft, note(8, "Other", "Body", None)).unwrap();
    let result = closing.await.expect("close task panicked");
    assert_eq!(result, Err(DraftError::Superseded));

    // The flush still reached the server, but its result belongs to the old draft
    advance(1000).await;
    assert_eq!(h.store.updates(), vec![(7, full_patch("T2", "C", Some(10)))]);
    let snap = h.snapshot().await;
    assert_eq!(snap.phase, DraftPhase::Editing);
    assert_eq!(snap.note_id, Some(8));
    assert_eq!(snap.title, "Other");
    assert!(!snap.dirty);
    assert_eq!(snap.error, None);
}

#[tokio::test(start_paused = true)]
async fn test_close_during_inflight_autosave_ignores_late_result() {
    let store = InMemoryNoteStore::with_categories(default_categories());
    store.seed_note(note(1, "T", "C", None));
    store.set_latency(StoreOp::UpdateNote, Duration::from_millis(2000));
    store.fail(StoreOp::UpdateNote, 500);
    let h = Harness::new(store).await;

    draft::open_existing_note(&h.notepad.draft, note(1, "T", "C", None)).unwrap();
    draft::change_content(&h.notepad.draft, "A").unwrap();
    advance(1000).await;
    assert_eq!(h.snapshot().await.phase, DraftPhase::Saving);

    draft::close_note(&h.notepad.draft).await.unwrap();
    assert_eq!(h.snapshot().await.phase, DraftPhase::Closed);

    // The failed autosave lands after the close and must not reopen anything
    advance(3000).await;
    let snap = h.snapshot().await;
    assert_eq!(snap.phase, DraftPhase::Closed);
    assert!(!snap.editor_open);
    assert_eq!(snap.note_id, None);
    assert_eq!(snap.error, None);
    assert!(!snap.dirty);
    assert_eq!(h.store.updates().len(), 1);
}
