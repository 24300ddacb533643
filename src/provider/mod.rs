//! Language model providers.
//!
//! A provider reports model [`Availability`], creates a [`LanguageSession`]
//! with a fixed system instruction and an optional download-progress monitor,
//! and the session answers prompts as a lazy stream of text fragments.
//!
//! Two backends:
//! - **local**: GGUF models via `mistralrs`, cached through hf-hub.
//! - **api**: any OpenAI-compatible server (Ollama, MLX, llama.cpp, etc.).

pub mod api;
pub mod local;
pub mod resolve;

pub use resolve::{ProviderResolver, ProviderStrategy};

use crate::error::Result;
use crate::progress::ProgressCallback;
use futures_util::Stream;
use std::pin::Pin;

/// Provider-reported readiness of the underlying model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// No usable model; terminal for this run.
    Unavailable,
    /// The model exists but must be downloaded first.
    Downloadable,
    /// A download is already in flight.
    Downloading,
    /// The model is ready to load.
    Available,
}

impl Availability {
    /// Returns `true` when session creation will involve a download.
    pub fn needs_download(self) -> bool {
        matches!(self, Availability::Downloadable | Availability::Downloading)
    }
}

/// Options for creating a session.
pub struct SessionOptions {
    /// System instruction applied to the whole conversation.
    pub system_prompt: String,
    /// Monitor receiving download-progress events during creation.
    pub monitor: Option<ProgressCallback>,
}

/// A lazy, single-pass, non-restartable sequence of response fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A stateful handle representing an ongoing conversation.
pub trait LanguageSession: Send + Sync {
    /// Send a user prompt and stream the response incrementally.
    ///
    /// The returned stream yields text fragments in arrival order; the full
    /// response is the concatenation of all fragments. A failure mid-stream
    /// surfaces as an `Err` item and ends the stream.
    fn prompt_streaming(&self, text: &str) -> TextStream;
}

impl std::fmt::Debug for dyn LanguageSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LanguageSession")
    }
}

/// A language model provider that can check availability and open sessions.
#[async_trait::async_trait]
pub trait LanguageProvider: Send + Sync {
    /// Short name used in logs and status messages.
    fn name(&self) -> &'static str;

    /// Report the readiness of the underlying model.
    async fn availability(&self) -> Result<Availability>;

    /// Create a conversation session.
    ///
    /// Download progress, if any, is reported through `options.monitor`.
    async fn create(&self, options: SessionOptions) -> Result<Box<dyn LanguageSession>>;
}
