//! Kotoba: a terminal chat front-end for local and self-hosted language
//! models, with streaming responses and voice dictation.
//!
//! # Architecture
//!
//! A single event loop drives the UI; everything slow runs in background
//! tasks and reports back over channels:
//! - **Providers**: GGUF models via `mistralrs`, or any OpenAI-compatible
//!   server. Resolution tries local first, then the API fallback.
//! - **Startup**: availability check → optional download (with progress
//!   reported into the status line) → session creation.
//! - **Dictation**: microphone capture via `cpal`, transcription via
//!   NVIDIA Parakeet, merged into the input box as interim results.
//! - **UI**: ratatui widgets over crossterm events.

pub mod audio;
pub mod config;
pub mod dictation;
pub mod error;
pub mod models;
pub mod progress;
pub mod provider;
pub mod startup;
pub mod ui;

pub use config::ChatConfig;
pub use error::{ChatError, Result};
pub use progress::{ProgressCallback, ProgressEvent};
pub use provider::{Availability, LanguageProvider, LanguageSession, ProviderResolver};
pub use startup::{initialize_session, LifecycleEvent, LifecycleNotify};
