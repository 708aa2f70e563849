//! CollectionActor - authoritative list of notes and categories
//!
//! Holds what the remote store last returned, in the order it returned it.
//! Refreshed explicitly (never polled); the draft controller may prepend a
//! freshly created note and replace an empty category list it had to prime.
//! `category_by_id` and `category_counts` are computed on request from the
//! current lists, so they cannot go stale.

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use shared_types::{Category, CategoryId, Note};
use std::collections::HashMap;
use std::sync::Arc;

use crate::remote::{FetchError, NoteStore};
use crate::session::SharedSessionObserver;

/// Actor that owns the note and category collections
#[derive(Debug, Default)]
pub struct CollectionActor;

/// Arguments for spawning CollectionActor
#[derive(Clone)]
pub struct CollectionArguments {
    pub store: Arc<dyn NoteStore>,
    pub session: SharedSessionObserver,
}

/// State for CollectionActor
pub struct CollectionState {
    store: Arc<dyn NoteStore>,
    session: SharedSessionObserver,
    notes: Vec<Note>,
    categories: Vec<Category>,
    refreshes_in_flight: usize,
}

/// Point-in-time copy of the collections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionSnapshot {
    pub notes: Vec<Note>,
    pub categories: Vec<Category>,
    pub loading: bool,
}

impl CollectionSnapshot {
    pub fn category_by_id(&self) -> HashMap<CategoryId, Category> {
        category_by_id(&self.categories)
    }

    pub fn category_counts(&self) -> HashMap<CategoryId, usize> {
        category_counts(&self.notes)
    }

    pub fn filtered_notes(&self, category: Option<CategoryId>) -> Vec<Note> {
        filter_notes(&self.notes, category)
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
pub enum CollectionMsg {
    /// Fetch categories and notes together and replace both on success.
    /// Replies `true` if the collections were replaced.
    Refresh {
        reply: Option<RpcReplyPort<bool>>,
    },
    /// Internal: result of a refresh fetch
    RefreshFinished {
        result: Result<(Vec<Category>, Vec<Note>), FetchError>,
        reply: Option<RpcReplyPort<bool>>,
    },
    /// Prepend a note, dropping any older copy with the same id
    InsertNote { note: Note },
    /// Replace the category list (used after priming an empty one)
    ReplaceCategories { categories: Vec<Category> },
    GetSnapshot {
        reply: RpcReplyPort<CollectionSnapshot>,
    },
    GetCategories {
        reply: RpcReplyPort<Vec<Category>>,
    },
    GetCategoryById {
        reply: RpcReplyPort<HashMap<CategoryId, Category>>,
    },
    GetCategoryCounts {
        reply: RpcReplyPort<HashMap<CategoryId, usize>>,
    },
    GetFilteredNotes {
        category: Option<CategoryId>,
        reply: RpcReplyPort<Vec<Note>>,
    },
}

#[derive(Debug, thiserror::Error, Clone)]
pub enum CollectionError {
    #[error("Collection RPC error: {0}")]
    Rpc(String),
}

impl From<ractor::RactorErr<CollectionMsg>> for CollectionError {
    fn from(e: ractor::RactorErr<CollectionMsg>) -> Self {
        CollectionError::Rpc(e.to_string())
    }
}

// ============================================================================
// Actor Implementation
// ============================================================================

#[async_trait]
impl Actor for CollectionActor {
    type Msg = CollectionMsg;
    type State = CollectionState;
    type Arguments = CollectionArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::debug!(actor_id = %myself.get_id(), "CollectionActor starting");

        Ok(CollectionState {
            store: args.store,
            session: args.session,
            notes: Vec::new(),
            categories: Vec::new(),
            refreshes_in_flight: 0,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            CollectionMsg::Refresh { reply } => {
                self.start_refresh(myself, reply, state);
            }
            CollectionMsg::RefreshFinished { result, reply } => {
                let replaced = self.finish_refresh(result, state);
                if let Some(reply) = reply {
                    let _ = reply.send(replaced);
                }
            }
            CollectionMsg::InsertNote { note } => {
                insert_note(&mut state.notes, note);
            }
            CollectionMsg::ReplaceCategories { categories } => {
                state.categories = categories;
            }
            CollectionMsg::GetSnapshot { reply } => {
                let _ = reply.send(CollectionSnapshot {
                    notes: state.notes.clone(),
                    categories: state.categories.clone(),
                    loading: state.refreshes_in_flight > 0,
                });
            }
            CollectionMsg::GetCategories { reply } => {
                let _ = reply.send(state.categories.clone());
            }
            CollectionMsg::GetCategoryById { reply } => {
                let _ = reply.send(category_by_id(&state.categories));
            }
            CollectionMsg::GetCategoryCounts { reply } => {
                let _ = reply.send(category_counts(&state.notes));
            }
            CollectionMsg::GetFilteredNotes { category, reply } => {
                let _ = reply.send(filter_notes(&state.notes, category));
            }
        }
        Ok(())
    }
}

impl CollectionActor {
    /// The fetch runs off the mailbox so reads keep being answered meanwhile
    fn start_refresh(
        &self,
        myself: ActorRef<CollectionMsg>,
        reply: Option<RpcReplyPort<bool>>,
        state: &mut CollectionState,
    ) {
        state.refreshes_in_flight += 1;
        let store = state.store.clone();
        tokio::spawn(async move {
            let result = tokio::try_join!(store.list_categories(), store.list_notes());
            if myself
                .cast(CollectionMsg::RefreshFinished { result, reply })
                .is_err()
            {
                tracing::debug!("CollectionActor stopped before refresh completed");
            }
        });
    }

    fn finish_refresh(
        &self,
        result: Result<(Vec<Category>, Vec<Note>), FetchError>,
        state: &mut CollectionState,
    ) -> bool {
        state.refreshes_in_flight = state.refreshes_in_flight.saturating_sub(1);
        match result {
            Ok((categories, notes)) => {
                tracing::info!(
                    notes = notes.len(),
                    categories = categories.len(),
                    "Note collection refreshed"
                );
                state.categories = categories;
                state.notes = notes;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Refresh failed; keeping previous collection");
                state.session.on_auth_error();
                false
            }
        }
    }
}

// ============================================================================
// Projections
// ============================================================================

pub fn insert_note(notes: &mut Vec<Note>, note: Note) {
    notes.retain(|n| n.id != note.id);
    notes.insert(0, note);
}

/// Later entries win when ids repeat
pub fn category_by_id(categories: &[Category]) -> HashMap<CategoryId, Category> {
    categories.iter().map(|c| (c.id, c.clone())).collect()
}

/// Uncategorized notes are left out entirely
pub fn category_counts(notes: &[Note]) -> HashMap<CategoryId, usize> {
    let mut counts = HashMap::new();
    for category in notes.iter().filter_map(|n| n.category) {
        *counts.entry(category).or_insert(0) += 1;
    }
    counts
}

pub fn filter_notes(notes: &[Note], category: Option<CategoryId>) -> Vec<Note> {
    match category {
        Some(id) => notes
            .iter()
            .filter(|n| n.category == Some(id))
            .cloned()
            .collect(),
        None => notes.to_vec(),
    }
}

// ============================================================================
// Client Helpers
// ============================================================================

/// Refresh and wait for it to settle. `Ok(false)` means the fetch failed and
/// the auth-error observer was notified.
pub async fn refresh(collection: &ActorRef<CollectionMsg>) -> Result<bool, CollectionError> {
    Ok(ractor::call!(collection, |reply| CollectionMsg::Refresh {
        reply: Some(reply)
    })?)
}

pub async fn collection_snapshot(
    collection: &ActorRef<CollectionMsg>,
) -> Result<CollectionSnapshot, CollectionError> {
    Ok(ractor::call!(collection, |reply| CollectionMsg::GetSnapshot {
        reply
    })?)
}

pub async fn categories(
    collection: &ActorRef<CollectionMsg>,
) -> Result<Vec<Category>, CollectionError> {
    Ok(ractor::call!(collection, |reply| CollectionMsg::GetCategories {
        reply
    })?)
}

pub async fn get_category_by_id(
    collection: &ActorRef<CollectionMsg>,
) -> Result<HashMap<CategoryId, Category>, CollectionError> {
    Ok(ractor::call!(collection, |reply| {
        CollectionMsg::GetCategoryById { reply }
    })?)
}

pub async fn get_category_counts(
    collection: &ActorRef<CollectionMsg>,
) -> Result<HashMap<CategoryId, usize>, CollectionError> {
    Ok(ractor::call!(collection, |reply| {
        CollectionMsg::GetCategoryCounts { reply }
    })?)
}

pub async fn filtered_notes(
    collection: &ActorRef<CollectionMsg>,
    category: Option<CategoryId>,
) -> Result<Vec<Note>, CollectionError> {
    Ok(ractor::call!(collection, |reply| {
        CollectionMsg::GetFilteredNotes { category, reply }
    })?)
}
