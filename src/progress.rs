//! Progress event types for model download and session creation.
//!
//! Callback-based progress reporting decouples model loading from UI
//! presentation: the status line subscribes and renders a percentage.

/// Progress events emitted while a model is downloaded or loaded.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A model file download has started.
    DownloadStarted {
        /// HuggingFace repo ID or URL.
        repo_id: String,
        /// Filename within the repo.
        filename: String,
        /// Total size in bytes, if known.
        total_bytes: Option<u64>,
    },

    /// Download progress update.
    DownloadProgress {
        /// HuggingFace repo ID or URL.
        repo_id: String,
        /// Filename within the repo.
        filename: String,
        /// Bytes downloaded so far.
        bytes_downloaded: u64,
        /// Total size in bytes, if known.
        total_bytes: Option<u64>,
    },

    /// A model file download completed.
    DownloadComplete {
        /// HuggingFace repo ID or URL.
        repo_id: String,
        /// Filename within the repo.
        filename: String,
    },

    /// A model file was already cached (no download needed).
    Cached {
        /// HuggingFace repo ID or URL.
        repo_id: String,
        /// Filename within the repo.
        filename: String,
    },

    /// Model loading into memory has started.
    LoadStarted {
        /// Human-readable model name.
        model_name: String,
    },

    /// Model loading completed.
    LoadComplete {
        /// Human-readable model name.
        model_name: String,
        /// Time taken to load in seconds.
        duration_secs: f64,
    },
}

impl ProgressEvent {
    /// Rounded download percentage for progress events, when the total is known.
    pub fn percent(&self) -> Option<u8> {
        match self {
            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes: Some(total),
                ..
            } => Some(percent(*bytes_downloaded, *total)),
            _ => None,
        }
    }
}

/// Convert loaded/total byte counts into a rounded percentage, clamped to 100.
pub fn percent(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (loaded as f64 / total as f64 * 100.0).round();
    pct.min(100.0) as u8
}

/// Callback type for receiving progress events.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;
