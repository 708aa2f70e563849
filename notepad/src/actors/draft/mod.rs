//! DraftActor - the note currently being edited
//!
//! Turns a stream of field edits into debounced, strictly serialized
//! create/update calls:
//! - every title/content/category edit re-arms a single debounce timer
//! - when the timer fires, one non-flushing save is attempted
//! - at most one save per draft is in flight; a save requested meanwhile is a
//!   no-op and the edit is picked up by the next debounce cycle
//! - closing cancels the timer and flushes; a failed flush keeps the editor
//!   open, a successful one resets the draft and refreshes the collection
//!
//! Remote calls run on spawned tasks that report back through the mailbox,
//! so edits keep being handled while a call is outstanding.

use async_trait::async_trait;
use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use shared_types::{default_category_id, Category, CategoryId, Note};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::actors::collection::{self, CollectionMsg};
use crate::remote::{FetchError, NoteStore};
use crate::session::SharedSessionObserver;

pub mod state;

pub use state::{Draft, DraftPhase, DraftSnapshot, SavePlan, SaveRequest, SaveSkip};

/// Quiet period after the last edit before an autosave is attempted
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(900);

const FALLBACK_SAVE_ERROR: &str = "Failed to save note";

/// Actor that owns the draft
#[derive(Debug, Default)]
pub struct DraftActor;

/// Arguments for spawning DraftActor
#[derive(Clone)]
pub struct DraftArguments {
    pub store: Arc<dyn NoteStore>,
    pub collection: ActorRef<CollectionMsg>,
    pub session: SharedSessionObserver,
    pub autosave_delay: Duration,
}

struct AutosaveTimer {
    token: u64,
    handle: JoinHandle<()>,
}

/// State for DraftActor
pub struct DraftActorState {
    draft: Draft,
    store: Arc<dyn NoteStore>,
    collection: ActorRef<CollectionMsg>,
    session: SharedSessionObserver,
    autosave_delay: Duration,
    autosave: Option<AutosaveTimer>,
    autosave_token: u64,
    pending_close: Vec<RpcReplyPort<Result<(), DraftError>>>,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
pub enum DraftMsg {
    /// Start composing a new note (created remotely with placeholder content)
    OpenNewNote,
    /// Load a stored note into the editor
    OpenExistingNote { note: Note },
    ChangeTitle { value: String },
    ChangeContent { value: String },
    SelectCategory { category: Option<CategoryId> },
    /// Category filter of the list view; cleared by a successful close
    SetFilterCategory { category: Option<CategoryId> },
    /// Flush and close. Fails with `SaveFailed` if the flush failed, in which
    /// case the editor stays open.
    CloseNote {
        reply: RpcReplyPort<Result<(), DraftError>>,
    },
    GetSnapshot { reply: RpcReplyPort<DraftSnapshot> },
    /// Internal: debounce timer fired
    AutosaveElapsed { token: u64 },
    /// Internal: category priming for a new note finished
    CategoriesPrimed {
        generation: u64,
        result: Result<Vec<Category>, FetchError>,
    },
    /// Internal: placeholder note for a new draft was created
    NoteCreated {
        generation: u64,
        result: Result<Note, FetchError>,
    },
    /// Internal: a save finished; carries the created note for creates
    SaveFinished {
        generation: u64,
        revision: u64,
        result: Result<Option<Note>, FetchError>,
    },
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum DraftError {
    #[error("{0}")]
    SaveFailed(String),

    /// Another note was opened before the close finished
    #[error("Close superseded by opening another note")]
    Superseded,

    #[error("Draft RPC error: {0}")]
    Rpc(String),
}

impl From<ractor::RactorErr<DraftMsg>> for DraftError {
    fn from(e: ractor::RactorErr<DraftMsg>) -> Self {
        DraftError::Rpc(e.to_string())
    }
}

impl From<ractor::MessagingErr<DraftMsg>> for DraftError {
    fn from(e: ractor::MessagingErr<DraftMsg>) -> Self {
        DraftError::Rpc(e.to_string())
    }
}

// ============================================================================
// Actor Implementation
// ============================================================================

#[async_trait]
impl Actor for DraftActor {
    type Msg = DraftMsg;
    type State = DraftActorState;
    type Arguments = DraftArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::debug!(
            actor_id = %myself.get_id(),
            autosave_ms = args.autosave_delay.as_millis() as u64,
            "DraftActor starting"
        );

        Ok(DraftActorState {
            draft: Draft::new(),
            store: args.store,
            collection: args.collection,
            session: args.session,
            autosave_delay: args.autosave_delay,
            autosave: None,
            autosave_token: 0,
            pending_close: Vec::new(),
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DraftMsg::OpenNewNote => {
                self.handle_open_new(myself, state).await;
            }
            DraftMsg::OpenExistingNote { note } => {
                self.cancel_autosave(state);
                self.supersede_close(state);
                state.draft.open_existing(&note);
                tracing::info!(note_id = note.id, "Opened note for editing");
            }
            DraftMsg::ChangeTitle { value } => {
                state.draft.edit_title(value, Utc::now());
                self.after_edit(myself, state);
            }
            DraftMsg::ChangeContent { value } => {
                state.draft.edit_content(value, Utc::now());
                self.after_edit(myself, state);
            }
            DraftMsg::SelectCategory { category } => {
                state.draft.select_category(category, Utc::now());
                self.after_edit(myself, state);
            }
            DraftMsg::SetFilterCategory { category } => {
                state.draft.set_filter_category(category);
            }
            DraftMsg::CloseNote { reply } => {
                self.handle_close(myself, reply, state).await;
            }
            DraftMsg::GetSnapshot { reply } => {
                let _ = reply.send(state.draft.snapshot());
            }
            DraftMsg::AutosaveElapsed { token } => {
                self.handle_autosave_elapsed(myself, token, state);
            }
            DraftMsg::CategoriesPrimed { generation, result } => {
                self.handle_categories_primed(myself, generation, result, state)
                    .await;
            }
            DraftMsg::NoteCreated { generation, result } => {
                self.handle_note_created(myself, generation, result, state)
                    .await;
            }
            DraftMsg::SaveFinished {
                generation,
                revision,
                result,
            } => {
                self.handle_save_finished(myself, generation, revision, result, state)
                    .await;
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        self.cancel_autosave(state);
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl DraftActor {
    async fn handle_open_new(&self, myself: ActorRef<DraftMsg>, state: &mut DraftActorState) {
        self.cancel_autosave(state);
        self.supersede_close(state);
        let generation = state.draft.begin_new();

        let known = match collection::categories(&state.collection).await {
            Ok(categories) => categories,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read cached categories; fetching");
                Vec::new()
            }
        };

        if !known.is_empty() {
            self.show_new_note(myself, &known, state);
            return;
        }

        let store = state.store.clone();
        tokio::spawn(async move {
            let result = store.list_categories().await;
            if myself
                .cast(DraftMsg::CategoriesPrimed { generation, result })
                .is_err()
            {
                tracing::debug!("DraftActor stopped before categories were primed");
            }
        });
    }

    async fn handle_categories_primed(
        &self,
        myself: ActorRef<DraftMsg>,
        generation: u64,
        result: Result<Vec<Category>, FetchError>,
        state: &mut DraftActorState,
    ) {
        if generation != state.draft.generation() || !state.draft.is_opening() {
            tracing::warn!(generation, "Dropping stale category priming result");
            return;
        }

        match result {
            Ok(categories) => {
                self.cast_collection(
                    state,
                    CollectionMsg::ReplaceCategories {
                        categories: categories.clone(),
                    },
                );
                self.show_new_note(myself.clone(), &categories, state);
                if state.draft.is_closing() {
                    // Close arrived during priming; it now waits on the create
                    self.flush_for_close(myself, state).await;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Category priming failed; new note aborted");
                state.draft.abort_new();
                state.session.on_auth_error();
                if state.draft.is_closing() {
                    state.draft.abort_close();
                    self.fail_close(state, e.to_string());
                }
            }
        }
    }

    /// Editor becomes visible immediately; the placeholder create follows
    fn show_new_note(
        &self,
        myself: ActorRef<DraftMsg>,
        categories: &[Category],
        state: &mut DraftActorState,
    ) {
        let category = default_category_id(categories);
        let input = state.draft.show_new(category);
        let generation = state.draft.generation();
        tracing::info!(category = ?category, "Opened new note");

        let store = state.store.clone();
        tokio::spawn(async move {
            let result = store.create_note(&input).await;
            if myself
                .cast(DraftMsg::NoteCreated { generation, result })
                .is_err()
            {
                tracing::debug!("DraftActor stopped before the new note was created");
            }
        });
    }

    async fn handle_note_created(
        &self,
        myself: ActorRef<DraftMsg>,
        generation: u64,
        result: Result<Note, FetchError>,
        state: &mut DraftActorState,
    ) {
        if generation != state.draft.generation() {
            tracing::warn!(generation, "Dropping stale note creation result");
            return;
        }

        match result {
            Ok(note) => {
                tracing::debug!(note_id = note.id, "Placeholder note created");
                state.draft.new_note_created(&note);
                self.cast_collection(state, CollectionMsg::InsertNote { note });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Creating new note failed");
                state.draft.new_note_failed();
                state.session.on_auth_error();
            }
        }

        if state.draft.is_closing() {
            self.flush_for_close(myself, state).await;
        } else if state.draft.needs_autosave() {
            // Edits made while the create was in flight
            self.arm_autosave(myself, state);
        }
    }

    fn after_edit(&self, myself: ActorRef<DraftMsg>, state: &mut DraftActorState) {
        if state.draft.needs_autosave() {
            self.arm_autosave(myself, state);
        }
    }

    fn handle_autosave_elapsed(
        &self,
        myself: ActorRef<DraftMsg>,
        token: u64,
        state: &mut DraftActorState,
    ) {
        match &state.autosave {
            Some(timer) if timer.token == token => {}
            _ => return,
        }
        state.autosave = None;

        match state.draft.plan_save(false) {
            Ok(plan) => {
                tracing::debug!(revision = plan.revision, "Autosaving draft");
                self.spawn_save(myself, plan, state);
            }
            Err(skip) => {
                tracing::debug!(reason = ?skip, "Autosave skipped");
            }
        }
    }

    async fn handle_close(
        &self,
        myself: ActorRef<DraftMsg>,
        reply: RpcReplyPort<Result<(), DraftError>>,
        state: &mut DraftActorState,
    ) {
        self.cancel_autosave(state);
        state.pending_close.push(reply);

        state.draft.begin_close();
        self.flush_for_close(myself, state).await;
    }

    /// Flush a closing draft, or close straight away when there is nothing
    /// to flush. Category priming and a pending placeholder create are
    /// waited for instead.
    async fn flush_for_close(&self, myself: ActorRef<DraftMsg>, state: &mut DraftActorState) {
        if state.draft.is_opening() {
            tracing::debug!("Close waits for category priming");
            return;
        }
        match state.draft.plan_save(true) {
            Ok(plan) => {
                tracing::debug!(revision = plan.revision, "Flushing draft before close");
                self.spawn_save(myself, plan, state);
            }
            Err(SaveSkip::Creating) => {
                tracing::debug!("Close waits for the new note to be created");
            }
            Err(skip) => {
                tracing::debug!(reason = ?skip, "Nothing to flush on close");
                self.finish_close(state).await;
            }
        }
    }

    async fn handle_save_finished(
        &self,
        myself: ActorRef<DraftMsg>,
        generation: u64,
        revision: u64,
        result: Result<Option<Note>, FetchError>,
        state: &mut DraftActorState,
    ) {
        if generation != state.draft.generation() {
            tracing::warn!(generation, "Save finished after its draft was closed");
            return;
        }

        let closing = state.draft.is_closing();
        match result {
            Ok(created) => {
                state.draft.save_succeeded(revision, created.as_ref());
                tracing::debug!(revision, dirty = state.draft.is_dirty(), "Draft saved");
                if closing {
                    self.finish_close(state).await;
                } else if state.draft.needs_autosave() {
                    self.arm_autosave(myself, state);
                }
            }
            Err(e) => {
                let message = match e.to_string() {
                    m if m.trim().is_empty() => FALLBACK_SAVE_ERROR.to_string(),
                    m => m,
                };
                tracing::warn!(error = %message, closing, "Saving draft failed");
                state.draft.save_failed(message.clone());
                if closing {
                    state.draft.abort_close();
                    self.fail_close(state, message);
                }
            }
        }
    }

    /// Reset to Closed, then refresh the collection before answering callers
    async fn finish_close(&self, state: &mut DraftActorState) {
        let default_category = match collection::categories(&state.collection).await {
            Ok(categories) => default_category_id(&categories),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read categories while closing");
                None
            }
        };
        state.draft.reset_closed(default_category);
        tracing::info!("Closed note editor");

        let replies: Vec<_> = state.pending_close.drain(..).collect();
        let collection = state.collection.clone();
        tokio::spawn(async move {
            if let Err(e) = collection::refresh(&collection).await {
                tracing::warn!(error = %e, "Refresh after close failed");
            }
            for reply in replies {
                let _ = reply.send(Ok(()));
            }
        });
    }

    fn fail_close(&self, state: &mut DraftActorState, message: String) {
        for reply in state.pending_close.drain(..) {
            let _ = reply.send(Err(DraftError::SaveFailed(message.clone())));
        }
    }

    /// An open replaces a draft that was still closing; its callers are
    /// answered now since the flush result will arrive for a stale generation.
    fn supersede_close(&self, state: &mut DraftActorState) {
        if state.pending_close.is_empty() {
            return;
        }
        tracing::warn!(
            waiting = state.pending_close.len(),
            "Open superseded a pending close"
        );
        for reply in state.pending_close.drain(..) {
            let _ = reply.send(Err(DraftError::Superseded));
        }
    }

    fn cast_collection(&self, state: &DraftActorState, message: CollectionMsg) {
        if state.collection.cast(message).is_err() {
            tracing::debug!("CollectionActor stopped; dropping update from draft");
        }
    }

    fn spawn_save(&self, myself: ActorRef<DraftMsg>, plan: SavePlan, state: &DraftActorState) {
        let store = state.store.clone();
        let generation = state.draft.generation();
        let SavePlan { request, revision } = plan;
        tokio::spawn(async move {
            let result = match request {
                SaveRequest::Create(input) => store.create_note(&input).await.map(Some),
                SaveRequest::Update(id, patch) => {
                    store.update_note(id, &patch).await.map(|_| None)
                }
            };
            if myself
                .cast(DraftMsg::SaveFinished {
                    generation,
                    revision,
                    result,
                })
                .is_err()
            {
                tracing::debug!("DraftActor stopped before save completed");
            }
        });
    }

    fn arm_autosave(&self, myself: ActorRef<DraftMsg>, state: &mut DraftActorState) {
        self.cancel_autosave(state);
        state.autosave_token += 1;
        let token = state.autosave_token;
        let delay = state.autosave_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if myself.cast(DraftMsg::AutosaveElapsed { token }).is_err() {
                tracing::debug!("DraftActor stopped before autosave fired");
            }
        });
        state.autosave = Some(AutosaveTimer { token, handle });
    }

    fn cancel_autosave(&self, state: &mut DraftActorState) {
        if let Some(timer) = state.autosave.take() {
            timer.handle.abort();
        }
    }
}

// ============================================================================
// Client Helpers
// ============================================================================

pub fn open_new_note(draft: &ActorRef<DraftMsg>) -> Result<(), DraftError> {
    Ok(draft.cast(DraftMsg::OpenNewNote)?)
}

pub fn open_existing_note(draft: &ActorRef<DraftMsg>, note: Note) -> Result<(), DraftError> {
    Ok(draft.cast(DraftMsg::OpenExistingNote { note })?)
}

pub fn change_title(draft: &ActorRef<DraftMsg>, value: impl Into<String>) -> Result<(), DraftError> {
    Ok(draft.cast(DraftMsg::ChangeTitle {
        value: value.into(),
    })?)
}

pub fn change_content(
    draft: &ActorRef<DraftMsg>,
    value: impl Into<String>,
) -> Result<(), DraftError> {
    Ok(draft.cast(DraftMsg::ChangeContent {
        value: value.into(),
    })?)
}

pub fn select_category(
    draft: &ActorRef<DraftMsg>,
    category: Option<CategoryId>,
) -> Result<(), DraftError> {
    Ok(draft.cast(DraftMsg::SelectCategory { category })?)
}

pub fn set_filter_category(
    draft: &ActorRef<DraftMsg>,
    category: Option<CategoryId>,
) -> Result<(), DraftError> {
    Ok(draft.cast(DraftMsg::SetFilterCategory { category })?)
}

/// Flush and close the editor. `Err(DraftError::SaveFailed)` leaves it open.
pub async fn close_note(draft: &ActorRef<DraftMsg>) -> Result<(), DraftError> {
    ractor::call!(draft, |reply| DraftMsg::CloseNote { reply })?
}

pub async fn draft_snapshot(draft: &ActorRef<DraftMsg>) -> Result<DraftSnapshot, DraftError> {
    Ok(ractor::call!(draft, |reply| DraftMsg::GetSnapshot { reply })?)
}
