//! Generative answer capability.
//!
//! Retrieval never depends on a generative model. When enabled, the retrieved
//! context is handed to an OpenAI-compatible chat-completions endpoint (LM
//! Studio, vLLM, llama.cpp server, OpenAI itself) with a bounded timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{ConfigError, GeneratorError};

/// System prompt sent with every generative request.
pub const SYSTEM_PROMPT: &str = "You are a contract and insurance-policy analyst. \
Answer in the same language as the question, using ONLY the contract context provided. \
If the context does not clearly state something, say so explicitly and do not invent details. \
Point out risks, obligations and deadlines, and keep answers structured and concise.";

/// Capability interface for generative models.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a natural-language completion for `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String, GeneratorError>;

    fn model_name(&self) -> &str;
}

/// Configuration for the generative capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding a bearer token; local servers need none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Context longer than this keeps only its trailing characters.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

fn default_base_url() -> String {
    "http://127.0.0.1:1234".into()
}

fn default_model() -> String {
    "local-model".into()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    512
}

fn default_timeout_secs() -> u64 {
    90
}

fn default_max_context_chars() -> usize {
    16_000
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

/// Build the user prompt for a generative request.
///
/// Inputs are trimmed. A context longer than `max_context_chars` keeps only
/// its last `max_context_chars` characters.
pub fn build_prompt(question: &str, context: &str, extra: &str, max_context_chars: usize) -> String {
    let context = tail_chars(context.trim(), max_context_chars);
    let extra = extra.trim();
    let question = question.trim();
    let context = if context.is_empty() {
        "(no context provided)"
    } else {
        context
    };
    format!(
        "CONTRACT CONTEXT (may be truncated):\n{context}\n\n\
         EXTRA CONTEXT (metadata or notes, may be empty):\n{extra}\n\n\
         QUESTION:\n{question}\n"
    )
}

fn tail_chars(s: &str, max_chars: usize) -> &str {
    let total = s.chars().count();
    if total <= max_chars {
        return s;
    }
    match s.char_indices().nth(total - max_chars) {
        Some((byte, _)) => &s[byte..],
        None => s,
    }
}

/// Chat-completions client for OpenAI-compatible servers.
pub struct OpenAiCompatGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatGenerator {
    pub fn new(config: GeneratorConfig, api_key: Option<String>) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeneratorError::Request {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl Generator for OpenAiCompatGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, GeneratorError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        tracing::info!(url = %url, model = %self.config.model, "Calling generator");
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GeneratorError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                }
            } else {
                GeneratorError::Request {
                    message: e.to_string(),
                }
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let preview: String = text.chars().take(400).collect();
            tracing::warn!(status = %status, preview = %preview, "Generator returned error status");
            return Err(GeneratorError::Request {
                message: format!("HTTP {status}: {preview}"),
            });
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| GeneratorError::ResponseParse {
            message: e.to_string(),
        })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| GeneratorError::ResponseParse {
                message: "response has no choices[0].message.content".into(),
            })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// A mock generator for testing and development.
///
/// Replies with a fixed text (or a fixed error) and records every prompt.
pub struct MockGenerator {
    reply: Result<String, GeneratorError>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn with_response(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: GeneratorError) -> Self {
        Self {
            reply: Err(error),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, GeneratorError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.reply.clone()
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Build the configured generator, or `None` when generation is disabled.
pub fn create_generator(
    config: &GeneratorConfig,
) -> Result<Option<Arc<dyn Generator>>, ConfigError> {
    if !config.enabled {
        return Ok(None);
    }
    let api_key = match &config.api_key_env {
        Some(var) => Some(std::env::var(var).map_err(|_| ConfigError::Invalid {
            message: format!("generator.api_key_env is set but {var} is not defined"),
        })?),
        None => None,
    };
    let generator =
        OpenAiCompatGenerator::new(config.clone(), api_key).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })?;
    Ok(Some(Arc::new(generator)))
}
