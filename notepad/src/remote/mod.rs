//! Remote note storage - the collaborator the client core persists through.
//!
//! The core only sees the `NoteStore` trait. `HttpNoteStore` talks to the
//! notes REST API; `InMemoryNoteStore` keeps everything in process and records
//! every call, which is what the tests drive.

use async_trait::async_trait;
use shared_types::{Category, Note, NoteId, NoteInput, NotePatch};

pub mod http;
pub mod memory;

pub use http::HttpNoteStore;
pub use memory::{InMemoryNoteStore, StoreCall, StoreOp};

/// Failure of a remote call. The display text is what the editor shows.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum FetchError {
    #[error("Failed to {action}: {status}")]
    Status { action: &'static str, status: u16 },

    #[error("Failed to {action}: {message}")]
    Transport {
        action: &'static str,
        message: String,
    },

    #[error("Failed to {action}: invalid response ({message})")]
    Decode {
        action: &'static str,
        message: String,
    },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub(crate) const FETCH_NOTES: &str = "fetch notes";
pub(crate) const FETCH_CATEGORIES: &str = "fetch categories";
pub(crate) const CREATE_NOTE: &str = "create note";
pub(crate) const UPDATE_NOTE: &str = "update note";

/// Remote note/category storage
#[async_trait]
pub trait NoteStore: Send + Sync + 'static {
    async fn list_notes(&self) -> Result<Vec<Note>, FetchError>;

    async fn list_categories(&self) -> Result<Vec<Category>, FetchError>;

    /// Returns the stored note with its server-assigned id and timestamps
    async fn create_note(&self, input: &NoteInput) -> Result<Note, FetchError>;

    async fn update_note(&self, id: NoteId, patch: &NotePatch) -> Result<Note, FetchError>;
}
