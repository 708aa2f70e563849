//! Shared types for the notes API
//!
//! These types are used by both:
//! - The notes REST API (server side of the wire)
//! - The notepad client core (draft controller, collection store)
//!
//! Serializable with serde for JSON over HTTP

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Server-assigned note identifier
pub type NoteId = i64;

/// Server-assigned category identifier
pub type CategoryId = i64;

// ============================================================================
// Constants
// ============================================================================

/// Title given to a freshly created note before the user types anything
pub const PLACEHOLDER_TITLE: &str = "Note Title";

/// Content given to a freshly created note before the user types anything
pub const PLACEHOLDER_CONTENT: &str = "Note content...";

/// Name of the category new notes land in, compared case-insensitively
pub const DEFAULT_CATEGORY_NAME: &str = "random thoughts";

// ============================================================================
// Persisted Records
// ============================================================================

/// A note as returned by the remote store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: NoteId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Option<CategoryId>,
    /// Read-only convenience field some servers attach
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Most recent server timestamp: `updated_at`, falling back to `created_at`
    pub fn last_touched_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.created_at)
    }
}

/// A category as returned by the remote store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Display hint only (e.g. "#EF9C66")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Owning user, when the server exposes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<i64>,
}

impl Category {
    pub fn is_default(&self) -> bool {
        self.name.trim().eq_ignore_ascii_case(DEFAULT_CATEGORY_NAME)
    }
}

/// Id of the "Random Thoughts" category, if one is present
pub fn default_category_id(categories: &[Category]) -> Option<CategoryId> {
    categories.iter().find(|c| c.is_default()).map(|c| c.id)
}

// ============================================================================
// Request Bodies
// ============================================================================

/// Body of a create-note request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteInput {
    pub title: String,
    pub content: String,
    pub category: Option<CategoryId>,
}

/// Body of a partial update. Absent fields are left untouched by the server;
/// `category: Some(None)` clears the category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub category: Option<Option<CategoryId>>,
}

impl NotePatch {
    /// Patch that overwrites every editable field
    pub fn full(input: &NoteInput) -> Self {
        Self {
            title: Some(input.title.clone()),
            content: Some(input.content.clone()),
            category: Some(input.category),
        }
    }
}

// A present `null` must stay distinguishable from an absent key.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Option<CategoryId>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<CategoryId>::deserialize(deserializer).map(Some)
}
