//! Configuration types for the chat front-end.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Local language model settings.
    pub llm: LlmConfig,
    /// OpenAI-compatible API provider settings.
    pub api: ApiConfig,
    /// Voice dictation settings.
    pub dictation: DictationConfig,
    /// Audio capture settings.
    pub audio: AudioConfig,
    /// Model download/cache settings.
    pub models: ModelConfig,
    /// Terminal UI settings.
    pub ui: UiConfig,
}

/// Local GGUF model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// HuggingFace repo ID for the GGUF model.
    pub model_id: String,
    /// GGUF filename within the repo.
    pub gguf_file: String,
    /// Tokenizer repo ID (empty = use the model repo).
    pub tokenizer_id: String,
    /// System instruction for every session.
    pub system_prompt: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling top-p.
    pub top_p: f64,
    /// Maximum tokens per response.
    pub max_tokens: usize,
    /// Context window size in tokens.
    pub context_size_tokens: usize,
    /// Maximum history messages kept (0 = unlimited).
    pub max_history_messages: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model_id: "unsloth/Qwen3-4B-Instruct-2507-GGUF".to_owned(),
            gguf_file: "Qwen3-4B-Instruct-2507-Q4_K_M.gguf".to_owned(),
            tokenizer_id: "Qwen/Qwen3-4B-Instruct-2507".to_owned(),
            system_prompt: "あなたは親切なAIアシスタントです。日本語で回答してください。"
                .to_owned(),
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 1024,
            context_size_tokens: 8192,
            max_history_messages: 40,
        }
    }
}

/// OpenAI-compatible API provider configuration.
///
/// Used as the fallback resolution strategy when set; `base_url = None`
/// disables the strategy entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the server (e.g. `http://localhost:11434`).
    pub base_url: Option<String>,
    /// Model name to request.
    pub model: String,
    /// Bearer token (empty = no Authorization header).
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "qwen3:4b".to_owned(),
            api_key: String::new(),
        }
    }
}

/// Voice dictation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictationConfig {
    /// Whether voice dictation is offered at all.
    pub enabled: bool,
    /// HuggingFace repo ID for the recognizer model.
    pub model_id: String,
    /// Fixed recognition locale.
    pub locale: String,
    /// Emit interim transcripts while the utterance is still in progress.
    pub interim_results: bool,
    /// Silence duration in ms that ends the single utterance.
    pub min_silence_duration_ms: u32,
    /// How often to re-transcribe the accumulated utterance for interim results, in ms.
    pub interim_interval_ms: u32,
}

impl Default for DictationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // ONNX-converted repo — the original NVIDIA repo only has .nemo format.
            model_id: "istupakov/parakeet-tdt-0.6b-v3-onnx".to_owned(),
            locale: "ja-JP".to_owned(),
            interim_results: true,
            min_silence_duration_ms: 1200,
            interim_interval_ms: 900,
        }
    }
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Target sample rate for recognition in Hz.
    pub input_sample_rate: u32,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// RMS energy threshold below which a chunk counts as silence.
    pub silence_threshold: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16_000,
            input_device: None,
            silence_threshold: 0.01,
        }
    }
}

/// Model download/cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory for non-HuggingFace downloads and scratch files.
    pub cache_dir: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("kotoba")
            .join("models");
        Self { cache_dir }
    }
}

/// Terminal UI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Maximum input box height in rows (the box grows up to this cap).
    pub max_input_rows: u16,
    /// Label shown on assistant transcript entries.
    pub assistant_label: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            max_input_rows: 6,
            assistant_label: "Assistant".to_owned(),
        }
    }
}

impl ChatConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ChatError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ChatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/kotoba/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("kotoba").join("config.toml"))
    }
}
