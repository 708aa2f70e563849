//! Notepad - client core for the notes API
//!
//! This crate provides the draft autosave controller and the note collection
//! store, both as actors talking to a remote `NoteStore`.

pub mod actors;
pub mod config;
pub mod labels;
pub mod remote;
pub mod session;
