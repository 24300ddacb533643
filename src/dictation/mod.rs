//! Voice dictation adapter.
//!
//! Wraps microphone capture and speech recognition behind a small
//! start/stop surface. The adapter is feature-detected at startup; when
//! unsupported the voice control is hidden and nothing else applies.
//!
//! Single-utterance mode: capture ends on its own after the speaker goes
//! quiet (or when toggled off). Interim results are enabled by default; each
//! result carries the full reconstructed transcript so far, so the latest
//! result always supersedes the previous one.

pub mod recognizer;

use crate::audio::MicCapture;
use crate::config::ChatConfig;
use crate::dictation::recognizer::{rms, IncrementalRecognizer};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Events emitted while listening.
#[derive(Debug, Clone)]
pub enum DictationEvent {
    /// A transcript update. `text` is the full transcript of the utterance
    /// so far; `is_final` marks the last result before capture ends.
    Transcript {
        /// Full reconstructed transcript.
        text: String,
        /// Whether this result is final.
        is_final: bool,
    },
    /// Capture ended (silence endpoint or explicit stop).
    Ended,
    /// Recognition or capture failed; the adapter returns to idle.
    Error {
        /// Human-readable error description.
        message: String,
    },
}

/// Voice dictation adapter: owns capture + recognition for one utterance at
/// a time.
pub struct DictationAdapter {
    config: ChatConfig,
    cancel: Option<CancellationToken>,
}

impl DictationAdapter {
    /// Feature detection: returns the adapter only when dictation is enabled
    /// and an input device exists.
    pub fn detect(config: &ChatConfig) -> Option<Self> {
        if !config.dictation.enabled {
            info!("dictation disabled in config");
            return None;
        }
        if !MicCapture::input_available() {
            info!("no audio input device, hiding voice control");
            return None;
        }
        Some(Self {
            config: config.clone(),
            cancel: None,
        })
    }

    /// Build an idle adapter without touching audio devices.
    #[cfg(test)]
    pub(crate) fn idle(config: &ChatConfig) -> Self {
        Self {
            config: config.clone(),
            cancel: None,
        }
    }

    /// Start capturing one utterance, sending events to `events`.
    ///
    /// Capture ends on silence, on [`Self::stop`], or on error; an
    /// [`DictationEvent::Ended`] or [`DictationEvent::Error`] is always the
    /// last event of the utterance.
    pub fn start(&mut self, events: mpsc::Sender<DictationEvent>) {
        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        let config = self.config.clone();
        let (audio_tx, audio_rx) = mpsc::channel(64);

        // cpal streams are not Send; capture gets its own thread.
        let capture_config = config.audio.clone();
        let capture_cancel = cancel.clone();
        let capture_events = events.clone();
        std::thread::spawn(move || {
            let capture = match MicCapture::new(&capture_config) {
                Ok(c) => c,
                Err(e) => {
                    warn!("dictation capture setup failed: {e}");
                    let _ = capture_events.blocking_send(DictationEvent::Error {
                        message: e.to_string(),
                    });
                    return;
                }
            };
            if let Err(e) = capture.run_blocking(audio_tx, capture_cancel) {
                warn!("dictation capture failed: {e}");
                let _ = capture_events.blocking_send(DictationEvent::Error {
                    message: e.to_string(),
                });
            }
        });

        tokio::task::spawn_blocking(move || {
            recognition_loop(&config, audio_rx, &events, &cancel);
        });
    }

    /// Stop the current capture. The final transcript and `Ended` still
    /// arrive through the event channel.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

/// Consume audio chunks, emit interim transcripts, and endpoint on silence.
fn recognition_loop(
    config: &ChatConfig,
    mut audio_rx: mpsc::Receiver<crate::audio::AudioChunk>,
    events: &mpsc::Sender<DictationEvent>,
    cancel: &CancellationToken,
) {
    let mut recognizer = match IncrementalRecognizer::new(
        &config.dictation,
        &config.models,
        config.audio.input_sample_rate,
    ) {
        Ok(r) => r,
        Err(e) => {
            fail(events, cancel, &e.to_string());
            return;
        }
    };
    if let Err(e) = recognizer.ensure_loaded() {
        fail(events, cancel, &e.to_string());
        return;
    }

    let interim_interval =
        std::time::Duration::from_millis(u64::from(config.dictation.interim_interval_ms));
    let silence_limit_secs = config.dictation.min_silence_duration_ms as f32 / 1000.0;

    let mut last_interim = Instant::now();
    let mut last_sent = String::new();
    let mut had_speech = false;
    let mut silence_secs = 0.0f32;

    while let Some(chunk) = audio_rx.blocking_recv() {
        if cancel.is_cancelled() {
            break;
        }

        let chunk_secs = chunk.samples.len() as f32 / chunk.sample_rate as f32;
        if rms(&chunk.samples) >= config.audio.silence_threshold {
            had_speech = true;
            silence_secs = 0.0;
        } else {
            silence_secs += chunk_secs;
        }
        recognizer.push_samples(&chunk.samples);

        // Single-utterance mode: a long enough pause after speech ends capture.
        if had_speech && silence_secs >= silence_limit_secs {
            break;
        }

        if config.dictation.interim_results
            && had_speech
            && last_interim.elapsed() >= interim_interval
        {
            last_interim = Instant::now();
            match recognizer.transcript() {
                Ok(text) => {
                    if !text.is_empty() && text != last_sent {
                        last_sent = text.clone();
                        let _ = events.blocking_send(DictationEvent::Transcript {
                            text,
                            is_final: false,
                        });
                    }
                }
                Err(e) => {
                    fail(events, cancel, &e.to_string());
                    return;
                }
            }
        }
    }

    cancel.cancel();

    if !recognizer.is_empty() {
        match recognizer.transcript() {
            Ok(text) => {
                if !text.is_empty() {
                    let _ = events.blocking_send(DictationEvent::Transcript {
                        text,
                        is_final: true,
                    });
                }
            }
            Err(e) => {
                fail(events, cancel, &e.to_string());
                return;
            }
        }
    }

    let _ = events.blocking_send(DictationEvent::Ended);
}

fn fail(events: &mpsc::Sender<DictationEvent>, cancel: &CancellationToken, message: &str) {
    warn!("dictation error: {message}");
    cancel.cancel();
    let _ = events.blocking_send(DictationEvent::Error {
        message: message.to_owned(),
    });
}
