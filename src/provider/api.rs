//! OpenAI-compatible API backend.
//!
//! Supports any server implementing the OpenAI chat completions API:
//! - Ollama (`http://localhost:11434`)
//! - MLX server (`http://localhost:8080`)
//! - vLLM, llama.cpp server, etc.
//!
//! Responses stream via Server-Sent Events (SSE).

use crate::config::LlmConfig;
use crate::error::{ChatError, Result};
use crate::provider::{Availability, LanguageProvider, LanguageSession, SessionOptions, TextStream};
use async_stream::try_stream;
use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

/// A single message in the conversation history.
#[derive(Debug, Clone)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Provider for OpenAI-compatible HTTP endpoints.
pub struct ApiProvider {
    base_url: String,
    model: String,
    api_key: String,
    llm: LlmConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl ApiProvider {
    /// Create a provider for the given endpoint.
    pub fn new(base_url: String, model: String, api_key: String, llm: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            base_url: normalize_base_url(&base_url),
            model,
            api_key,
            llm,
            client,
        }
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            req
        } else {
            req.bearer_auth(&self.api_key)
        }
    }
}

/// Strip a trailing slash and a trailing `/v1` so both spellings work.
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    trimmed.strip_suffix("/v1").unwrap_or(trimmed).to_owned()
}

#[async_trait::async_trait]
impl LanguageProvider for ApiProvider {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn availability(&self) -> Result<Availability> {
        let url = format!("{}/v1/models", self.base_url);
        let resp = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ChatError::Availability(format!("cannot reach {url}: {e}")))?;

        if !resp.status().is_success() {
            return Err(ChatError::Availability(format!(
                "{url} returned status {}",
                resp.status()
            )));
        }

        // Servers that don't implement model listing get the benefit of the doubt.
        let Ok(listing) = resp.json::<ModelsResponse>().await else {
            return Ok(Availability::Available);
        };
        if listing.data.is_empty() || listing.data.iter().any(|m| m.id == self.model) {
            Ok(Availability::Available)
        } else {
            Ok(Availability::Unavailable)
        }
    }

    async fn create(&self, options: SessionOptions) -> Result<Box<dyn LanguageSession>> {
        info!("API session: {} model={}", self.base_url, self.model);

        let history = vec![ChatMessage {
            role: "system",
            content: options.system_prompt,
        }];

        Ok(Box::new(ApiSession {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            llm: self.llm.clone(),
            client: self.client.clone(),
            history: Arc::new(Mutex::new(history)),
        }))
    }
}

/// Conversation session over an OpenAI-compatible endpoint.
pub struct ApiSession {
    base_url: String,
    model: String,
    api_key: String,
    llm: LlmConfig,
    client: reqwest::Client,
    history: Arc<Mutex<Vec<ChatMessage>>>,
}

impl LanguageSession for ApiSession {
    fn prompt_streaming(&self, text: &str) -> TextStream {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let model = self.model.clone();
        let api_key = self.api_key.clone();
        let llm = self.llm.clone();
        let client = self.client.clone();
        let history = Arc::clone(&self.history);
        let user_text = text.to_owned();

        Box::pin(try_stream! {
            let mut messages: Vec<serde_json::Value> = {
                let guard = history.lock().unwrap_or_else(|e| e.into_inner());
                guard
                    .iter()
                    .map(|m| serde_json::json!({"role": m.role, "content": m.content}))
                    .collect()
            };
            messages.push(serde_json::json!({"role": "user", "content": user_text}));

            let body = serde_json::json!({
                "model": model,
                "messages": messages,
                "stream": true,
                "temperature": llm.temperature,
                "top_p": llm.top_p,
                "max_tokens": llm.max_tokens,
            });

            let mut req = client.post(&url).json(&body);
            if !api_key.is_empty() {
                req = req.bearer_auth(&api_key);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| ChatError::classify_prompt(format!("API request failed: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let detail = resp.text().await.unwrap_or_default();
                Err(ChatError::classify_prompt(format!(
                    "API returned status {status}: {detail}"
                )))?;
                return;
            }

            let mut generated = String::new();
            let mut buffer = String::new();
            let mut byte_stream = resp.bytes_stream();
            let mut done = false;

            while !done {
                let Some(chunk) = byte_stream.next().await else {
                    break;
                };
                let chunk = chunk
                    .map_err(|e| ChatError::classify_prompt(format!("stream read error: {e}")))?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim_end_matches('\r').to_owned();
                    buffer.drain(..=pos);

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        done = true;
                        break;
                    }

                    let event: serde_json::Value = serde_json::from_str(data)
                        .map_err(|e| ChatError::Prompt(format!("SSE parse error: {e}")))?;

                    if let Some(content) = event["choices"][0]["delta"]["content"].as_str()
                        && !content.is_empty()
                    {
                        generated.push_str(content);
                        yield content.to_owned();
                    }

                    if event["choices"][0]["finish_reason"].as_str() == Some("stop") {
                        done = true;
                        break;
                    }
                }
            }

            let final_text = generated.trim().to_owned();
            let mut guard = history.lock().unwrap_or_else(|e| e.into_inner());
            guard.push(ChatMessage {
                role: "user",
                content: user_text.clone(),
            });
            if !final_text.is_empty() {
                guard.push(ChatMessage {
                    role: "assistant",
                    content: final_text,
                });
            }
            trim_history(&mut guard, llm.max_history_messages);
        })
    }
}

/// Keep the system prompt at index 0, then retain the last `max` messages.
fn trim_history(history: &mut Vec<ChatMessage>, max: usize) {
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
