//! Local GGUF inference via `mistralrs`.

use crate::config::{LlmConfig, ModelConfig};
use crate::error::{ChatError, Result};
use crate::models::{self, ModelManager};
use crate::progress::ProgressEvent;
use crate::provider::{Availability, LanguageProvider, LanguageSession, SessionOptions, TextStream};
use async_stream::try_stream;
use mistralrs::{
    GgufModelBuilder, MemoryGpuConfig, Model, PagedAttentionMetaBuilder, RequestBuilder, Response,
    TextMessageRole, TextMessages,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Minimum allowed local context size.
const MIN_CONTEXT_SIZE_TOKENS: usize = 1024;

/// Maximum time to wait for the first token — model warm-up on CPU can be
/// slow but shouldn't take more than 2 minutes.
const FIRST_TOKEN_TIMEOUT: Duration = Duration::from_secs(120);

/// Tokenizer files to pre-download alongside the GGUF weights.
const TOKENIZER_FILES: &[&str] = &["tokenizer.json", "tokenizer_config.json"];

/// Provider for on-device GGUF models.
pub struct LocalProvider {
    llm: LlmConfig,
    models: ModelConfig,
}

impl LocalProvider {
    /// Create a provider for the configured GGUF model.
    pub fn new(llm: LlmConfig, models: ModelConfig) -> Self {
        Self { llm, models }
    }
}

#[async_trait::async_trait]
impl LanguageProvider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn availability(&self) -> Result<Availability> {
        let model_id = self.llm.model_id.clone();
        let gguf_file = self.llm.gguf_file.clone();

        tokio::task::spawn_blocking(move || {
            if ModelManager::is_file_cached(&model_id, &gguf_file) {
                return Ok(Availability::Available);
            }

            // Not cached: probe the hub to see whether a download is possible.
            match models::remote_file_size_bytes(&model_id, &gguf_file) {
                Ok(_) => Ok(Availability::Downloadable),
                Err(e) => {
                    let message = e.to_string();
                    if message.contains("404") {
                        Ok(Availability::Unavailable)
                    } else {
                        Err(ChatError::Availability(message))
                    }
                }
            }
        })
        .await
        .map_err(|e| ChatError::Availability(format!("availability task failed: {e}")))?
    }

    async fn create(&self, options: SessionOptions) -> Result<Box<dyn LanguageSession>> {
        let llm = self.llm.clone();
        let models_config = self.models.clone();
        let monitor = options.monitor;

        // Pre-download through hf-hub so byte-level progress reaches the
        // monitor; mistralrs then finds everything in the shared cache.
        let llm_for_download = llm.clone();
        let monitor = tokio::task::spawn_blocking(move || -> Result<_> {
            let manager = ModelManager::new(&models_config)?;
            manager.download_with_progress(
                &llm_for_download.model_id,
                &llm_for_download.gguf_file,
                monitor.as_ref(),
            )?;
            if !llm_for_download.tokenizer_id.is_empty() {
                for filename in TOKENIZER_FILES {
                    manager.download_with_progress(
                        &llm_for_download.tokenizer_id,
                        filename,
                        monitor.as_ref(),
                    )?;
                }
            }
            if let Some(cb) = monitor.as_ref() {
                cb(ProgressEvent::LoadStarted {
                    model_name: llm_for_download.model_id.clone(),
                });
            }
            Ok(monitor)
        })
        .await
        .map_err(|e| ChatError::SessionCreate(format!("download task failed: {e}")))?
        .map_err(|e| ChatError::SessionCreate(e.to_string()))?;

        let load_start = Instant::now();
        let model = load_local_model(&llm)
            .await
            .map_err(|e| ChatError::SessionCreate(e.to_string()))?;
        info!(
            "local model loaded in {:.1}s",
            load_start.elapsed().as_secs_f64()
        );
        if let Some(cb) = monitor.as_ref() {
            cb(ProgressEvent::LoadComplete {
                model_name: llm.model_id.clone(),
                duration_secs: load_start.elapsed().as_secs_f64(),
            });
        }

        let history = vec![(TextMessageRole::System, options.system_prompt)];

        Ok(Box::new(LocalSession {
            model,
            config: llm,
            history: Arc::new(Mutex::new(history)),
        }))
    }
}

async fn load_local_model(config: &LlmConfig) -> Result<Arc<Model>> {
    info!(
        "loading local LLM: {} / {}",
        config.model_id, config.gguf_file
    );

    let mut builder =
        GgufModelBuilder::new(&config.model_id, vec![&config.gguf_file]).with_logging();

    if !config.tokenizer_id.is_empty() {
        builder = builder.with_tok_model_id(&config.tokenizer_id);
    }

    let context_size = effective_context_size_tokens(config);

    let model = builder
        .with_paged_attn(|| {
            PagedAttentionMetaBuilder::default()
                .with_gpu_memory(MemoryGpuConfig::ContextSize(context_size))
                .build()
        })
        .map_err(|e| ChatError::SessionCreate(format!("paged attention config failed: {e}")))?
        .build()
        .await
        .map_err(|e| ChatError::SessionCreate(format!("model build failed: {e}")))?;

    info!("local LLM loaded successfully");
    Ok(Arc::new(model))
}

fn effective_context_size_tokens(config: &LlmConfig) -> usize {
    if config.context_size_tokens < MIN_CONTEXT_SIZE_TOKENS {
        warn!(
            "llm.context_size_tokens={} too small, clamping to {}",
            config.context_size_tokens, MIN_CONTEXT_SIZE_TOKENS
        );
        return MIN_CONTEXT_SIZE_TOKENS;
    }
    config.context_size_tokens
}

/// Conversation session backed by a loaded mistralrs model.
pub struct LocalSession {
    model: Arc<Model>,
    config: LlmConfig,
    /// Conversation history: (role, content) pairs, system prompt at index 0.
    history: Arc<Mutex<Vec<(TextMessageRole, String)>>>,
}

impl LanguageSession for LocalSession {
    fn prompt_streaming(&self, text: &str) -> TextStream {
        let model = Arc::clone(&self.model);
        let config = self.config.clone();
        let history = Arc::clone(&self.history);
        let user_text = text.to_owned();

        Box::pin(try_stream! {
            let mut messages = TextMessages::new().enable_thinking(false);
            {
                let guard = history.lock().unwrap_or_else(|e| e.into_inner());
                for (role, content) in guard.iter() {
                    messages = messages.add_message(role.clone(), content);
                }
            }
            messages = messages.add_message(TextMessageRole::User, &user_text);

            let request = RequestBuilder::from(messages)
                .set_sampler_temperature(config.temperature)
                .set_sampler_topp(config.top_p)
                .set_sampler_max_len(config.max_tokens)
                .enable_thinking(false);

            let gen_start = Instant::now();
            let mut stream = model
                .stream_chat_request(request)
                .await
                .map_err(|e| ChatError::classify_prompt(format!("stream request failed: {e}")))?;

            let mut generated = String::new();
            let mut first_token_received = false;

            loop {
                let response = if first_token_received {
                    match stream.next().await {
                        Some(r) => r,
                        None => break,
                    }
                } else {
                    match tokio::time::timeout(FIRST_TOKEN_TIMEOUT, stream.next()).await {
                        Ok(Some(r)) => r,
                        Ok(None) => break,
                        Err(_) => Err(ChatError::Prompt(
                            "first token timeout — model did not produce output in time".to_owned(),
                        ))?,
                    }
                };

                match response {
                    Response::Chunk(chunk) => {
                        if let Some(choice) = chunk.choices.first() {
                            let content = choice.delta.content.as_deref().unwrap_or_default();
                            if content.is_empty() {
                                continue;
                            }
                            if !first_token_received {
                                first_token_received = true;
                                info!(
                                    "first token received in {:.1}s",
                                    gen_start.elapsed().as_secs_f64()
                                );
                            }
                            generated.push_str(content);
                            yield content.to_owned();
                        }
                    }
                    Response::Done(done) => {
                        if let Some(choice) = done.choices.first() {
                            let content = choice.message.content.as_deref().unwrap_or_default();
                            if !content.is_empty() {
                                generated.push_str(content);
                                yield content.to_owned();
                            }
                        }
                        break;
                    }
                    Response::ModelError(msg, _) => {
                        Err(ChatError::classify_prompt(format!("model error: {msg}")))?;
                    }
                    Response::InternalError(e) => {
                        Err(ChatError::classify_prompt(format!("internal error: {e}")))?;
                    }
                    Response::ValidationError(e) => {
                        Err(ChatError::Prompt(format!("validation error: {e}")))?;
                    }
                    _ => {}
                }
            }

            info!(
                "generated {} chars in {:.1}s",
                generated.len(),
                gen_start.elapsed().as_secs_f64()
            );

            let final_text = generated.trim().to_owned();
            let mut guard = history.lock().unwrap_or_else(|e| e.into_inner());
            guard.push((TextMessageRole::User, user_text.clone()));
            if !final_text.is_empty() {
                guard.push((TextMessageRole::Assistant, final_text));
            }
            trim_history(&mut guard, config.max_history_messages);
        })
    }
}

/// Keep the system prompt at index 0, then retain the last `max` messages.
fn trim_history(history: &mut Vec<(TextMessageRole, String)>, max: usize) {
    if max == 0 {
        return;
    }
    if history.len() > 1 + max {
        let drain_end = history.len().saturating_sub(max);
        if drain_end > 1 {
            history.drain(1..drain_end);
        }
    }
}
