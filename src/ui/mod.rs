//! Terminal user interface.
//!
//! Widget state lives apart from rendering: [`StatusReporter`],
//! [`Transcript`], and [`InputBox`] are plain state machines the
//! [`app::ChatApp`] controller drives, and [`tui`] paints them with
//! ratatui each frame.

pub mod app;
pub mod input;
pub mod status;
pub mod transcript;
pub mod tui;

pub use app::{AppEvent, ChatApp};
pub use input::{clamp_height, InputBox};
pub use status::{StatusCategory, StatusReporter};
pub use transcript::{EntryId, Message, Role, Transcript};
