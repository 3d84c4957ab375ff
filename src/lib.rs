//! Plain-text note-taking library with an inline tag micro-language.
//!
//! Notes are timestamped plain text. Lines of the form `event_<key>: value`
//! and `meta::<key>` turn a note into an event, a reminder on a review
//! cadence, or a todo, without leaving plain text behind.

mod alerts;
mod cadence;
mod cli;
mod config;
mod countdown;
mod errors;
mod event;
mod helper;
mod note;
mod refresh;
mod storage;
mod tags;
mod todo;
mod types;

// Re-export key components
pub use alerts::*;
pub use cadence::*;
pub use cli::*;
pub use config::*;
pub use countdown::*;
pub use errors::*;
pub use event::*;
pub use helper::*;
pub use note::*;
pub use refresh::*;
pub use storage::*;
pub use tags::*;
pub use todo::*;
pub use types::*;
