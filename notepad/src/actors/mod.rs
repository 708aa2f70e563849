//! Actor components of the notes client
//!
//! - `CollectionActor` owns the fetched notes and categories
//! - `DraftActor` owns the note being edited and its autosave cycle

pub mod collection;
pub mod draft;

pub use collection::{CollectionActor, CollectionArguments, CollectionMsg, CollectionSnapshot};
pub use draft::{DraftActor, DraftArguments, DraftError, DraftMsg, DraftPhase, DraftSnapshot};

use ractor::{Actor, ActorRef};
use std::sync::Arc;
use std::time::Duration;

use crate::remote::NoteStore;
use crate::session::SharedSessionObserver;

/// Both actors wired to the same store and session observer
#[derive(Clone)]
pub struct Notepad {
    pub collection: ActorRef<CollectionMsg>,
    pub draft: ActorRef<DraftMsg>,
}

impl Notepad {
    pub async fn spawn(
        store: Arc<dyn NoteStore>,
        session: SharedSessionObserver,
        autosave_delay: Duration,
    ) -> Result<Self, ractor::SpawnErr> {
        let (collection, _handle) = Actor::spawn(
            None,
            CollectionActor,
            CollectionArguments {
                store: store.clone(),
                session: session.clone(),
            },
        )
        .await?;

        let (draft, _handle) = Actor::spawn(
            None,
            DraftActor,
            DraftArguments {
                store,
                collection: collection.clone(),
                session,
                autosave_delay,
            },
        )
        .await?;

        Ok(Self { collection, draft })
    }

    pub fn stop(&self) {
        self.draft.stop(None);
        self.collection.stop(None);
    }
}
