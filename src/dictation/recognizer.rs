//! Incremental speech recognition using NVIDIA Parakeet TDT.
//!
//! Parakeet is a batch transcriber, so interim results are produced by
//! re-transcribing the accumulated utterance; each result is therefore the
//! full reconstructed transcript so far and supersedes the previous one.

use crate::config::{DictationConfig, ModelConfig};
use crate::error::{ChatError, Result};
use crate::models::ModelManager;
use parakeet_rs::{ParakeetTDT, TimestampMode, Transcriber};
use std::time::Instant;
use tracing::info;

/// Model files required by Parakeet TDT.
const ENCODER_ONNX: &str = "encoder-model.onnx";
const ENCODER_DATA: &str = "encoder-model.onnx.data";
const DECODER_ONNX: &str = "decoder_joint-model.onnx";
const VOCAB_TXT: &str = "vocab.txt";

/// Speech recognizer that accumulates one utterance and re-transcribes it.
pub struct IncrementalRecognizer {
    model: Option<ParakeetTDT>,
    model_id: String,
    model_manager: ModelManager,
    samples: Vec<f32>,
    sample_rate: u32,
}

impl IncrementalRecognizer {
    /// Create a new recognizer instance.
    ///
    /// The model is loaded lazily on first use (or via [`Self::ensure_loaded`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn new(
        config: &DictationConfig,
        model_config: &ModelConfig,
        sample_rate: u32,
    ) -> Result<Self> {
        let model_manager = ModelManager::new(model_config)?;
        info!("dictation recognizer configured with model: {}", config.model_id);

        Ok(Self {
            model: None,
            model_id: config.model_id.clone(),
            model_manager,
            samples: Vec::new(),
            sample_rate,
        })
    }

    /// Eagerly load the model so the first interim result is not delayed.
    ///
    /// # Errors
    ///
    /// Returns an error if model download or loading fails.
    pub fn ensure_loaded(&mut self) -> Result<()> {
        if self.model.is_none() {
            self.initialize()?;
        }
        Ok(())
    }

    /// Append captured samples to the current utterance.
    pub fn push_samples(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }

    /// Duration of the accumulated utterance in seconds.
    pub fn utterance_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Returns `true` if nothing has been captured yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Transcribe the full accumulated utterance.
    ///
    /// # Errors
    ///
    /// Returns an error if model loading or transcription fails.
    pub fn transcript(&mut self) -> Result<String> {
        if self.samples.is_empty() {
            return Ok(String::new());
        }
        if self.model.is_none() {
            self.initialize()?;
        }

        let started = Instant::now();
        let model = self
            .model
            .as_mut()
            .ok_or_else(|| ChatError::Speech("model not initialized".into()))?;

        let result = model
            .transcribe_samples(
                self.samples.clone(),
                self.sample_rate,
                1, // mono
                Some(TimestampMode::Sentences),
            )
            .map_err(|e| ChatError::Speech(format!("transcription failed: {e}")))?;

        info!(
            "transcribed {:.1}s utterance in {:.0}ms: \"{}\"",
            self.utterance_secs(),
            started.elapsed().as_millis(),
            result.text
        );

        Ok(result.text)
    }

    /// Load the Parakeet TDT model from cache (downloading if needed).
    fn initialize(&mut self) -> Result<()> {
        info!("loading dictation model: {}", self.model_id);

        let repo_dir = self.model_manager.download_repo_with_progress(
            &self.model_id,
            &[ENCODER_ONNX, ENCODER_DATA, DECODER_ONNX, VOCAB_TXT],
            None,
        )?;

        let model = ParakeetTDT::from_pretrained(&repo_dir, None)
            .map_err(|e| ChatError::Speech(format!("failed to load Parakeet TDT: {e}")))?;

        info!("dictation model loaded");
        self.model = Some(model);
        Ok(())
    }
}

/// RMS energy of a sample chunk, used for silence endpointing.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms(&[0.0; 256]), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn rms_of_constant_signal_is_its_magnitude() {
        let signal = [0.5f32; 128];
        assert!((rms(&signal) - 0.5).abs() < 1e-6);
    }
}
