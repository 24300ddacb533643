//! Error types for the chat front-end.

/// Top-level error type for the chat system.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// No provider-resolution strategy matched the configuration.
    #[error("no usable language model API: {0}")]
    Unsupported(String),

    /// The availability check itself failed.
    #[error("availability check failed: {0}")]
    Availability(String),

    /// The provider reports no usable model.
    #[error("model unavailable: {0}")]
    Unavailable(String),

    /// Session creation failed.
    #[error("session creation failed: {0}")]
    SessionCreate(String),

    /// A streaming prompt failed mid-flight.
    #[error("prompt error: {0}")]
    Prompt(String),

    /// A prompt failure that looks session-related (stale or destroyed session).
    #[error("session invalidated: {0}")]
    SessionInvalidated(String),

    /// Speech recognition error.
    #[error("speech error: {0}")]
    Speech(String),

    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Model download or cache error.
    #[error("model error: {0}")]
    Model(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Classify a prompt-stream failure message, promoting session-related
    /// failures to [`ChatError::SessionInvalidated`].
    pub fn classify_prompt(message: String) -> Self {
        if message.to_lowercase().contains("session") {
            ChatError::SessionInvalidated(message)
        } else {
            ChatError::Prompt(message)
        }
    }

    /// Returns `true` if this error should be presented as a session failure.
    pub fn is_session_invalidated(&self) -> bool {
        matches!(self, ChatError::SessionInvalidated(_))
    }

    /// The inner message without the variant prefix, for user-facing text.
    pub fn detail(&self) -> String {
        match self {
            ChatError::Unsupported(m)
            | ChatError::Availability(m)
            | ChatError::Unavailable(m)
            | ChatError::SessionCreate(m)
            | ChatError::Prompt(m)
            | ChatError::SessionInvalidated(m)
            | ChatError::Speech(m)
            | ChatError::Audio(m)
            | ChatError::Model(m)
            | ChatError::Config(m)
            | ChatError::Channel(m) => m.clone(),
            ChatError::Io(e) => e.to_string(),
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ChatError>;
