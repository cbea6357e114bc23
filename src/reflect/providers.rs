use reqwest::blocking::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::reflect::config::ReflectConfig;
use crate::reflect::prompt::ChatRequest;
use crate::reflect::util::{env_first_non_empty, env_non_empty};

const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenRouter,
    HuggingFace,
    Gemini,
    OpenAi,
}

impl ProviderKind {
    /// Fixed order in which the chain tries providers.
    pub const PRIORITY: [ProviderKind; 4] = [
        ProviderKind::OpenRouter,
        ProviderKind::HuggingFace,
        ProviderKind::Gemini,
        ProviderKind::OpenAi,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
        }
    }

    pub fn parse_alias(raw: &str) -> Option<ProviderKind> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Some(ProviderKind::OpenRouter),
            "huggingface" | "hf" | "hugging-face" => Some(ProviderKind::HuggingFace),
            "gemini" | "google" => Some(ProviderKind::Gemini),
            "openai" => Some(ProviderKind::OpenAi),
            _ => None,
        }
    }

    pub fn default_models(self) -> &'static [&'static str] {
        match self {
            ProviderKind::OpenRouter => &[
                "meta-llama/llama-3.3-70b-instruct:free",
                "mistralai/mistral-small-3.1-24b-instruct:free",
                "google/gemma-3-27b-it:free",
            ],
            ProviderKind::HuggingFace => &[
                "meta-llama/Llama-3.1-8B-Instruct",
                "mistralai/Mistral-7B-Instruct-v0.3",
            ],
            ProviderKind::Gemini => &["gemini-2.0-flash", "gemini-1.5-flash"],
            ProviderKind::OpenAi => &["gpt-4o-mini"],
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderKind::HuggingFace => "https://router.huggingface.co/v1",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
        }
    }

    fn api_key_vars(self) -> &'static [&'static str] {
        match self {
            ProviderKind::OpenRouter => &["OPENROUTER_API_KEY"],
            ProviderKind::HuggingFace => &["HUGGINGFACE_API_KEY", "HF_TOKEN"],
            ProviderKind::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            ProviderKind::OpenAi => &["OPENAI_API_KEY"],
        }
    }

    fn base_url_var(self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "REFLECT_OPENROUTER_BASE_URL",
            ProviderKind::HuggingFace => "REFLECT_HUGGINGFACE_BASE_URL",
            ProviderKind::Gemini => "REFLECT_GEMINI_BASE_URL",
            ProviderKind::OpenAi => "REFLECT_OPENAI_BASE_URL",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
    pub text: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} returned status {status}: {body}")]
    Status {
        provider: ProviderKind,
        status: u16,
        body: String,
    },
    #[error("{provider} request failed: {message}")]
    Transport {
        provider: ProviderKind,
        message: String,
        timed_out: bool,
    },
    #[error("{provider} response could not be decoded: {message}")]
    Decode {
        provider: ProviderKind,
        message: String,
    },
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Transport { timed_out: true, .. })
    }

    fn transport(provider: ProviderKind, err: &reqwest::Error) -> Self {
        ProviderError::Transport {
            provider,
            message: err.to_string(),
            timed_out: err.is_timeout(),
        }
    }
}

/// A chat-completion backend that may serve several models.
pub trait ChatProvider {
    fn kind(&self) -> ProviderKind;
    /// Candidate models, in the order they should be tried.
    fn models(&self) -> &[String];
    fn complete(&self, model: &str, request: &ChatRequest) -> Result<ChatReply, ProviderError>;
}

fn truncate_body(body: &str) -> String {
    crate::reflect::util::truncate_with_ellipsis(body.trim(), MAX_ERROR_BODY_CHARS)
}

fn send_json(provider: ProviderKind, builder: RequestBuilder) -> Result<Value, ProviderError> {
    let response = builder
        .send()
        .map_err(|err| ProviderError::transport(provider, &err))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ProviderError::Status {
            provider,
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }
    response.json::<Value>().map_err(|err| ProviderError::Decode {
        provider,
        message: err.to_string(),
    })
}

fn join_text_parts(parts: &[Value]) -> Option<String> {
    let chunks: Vec<&str> = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if chunks.is_empty() {
        None
    } else {
        Some(chunks.join("\n"))
    }
}

pub(crate) fn extract_chat_completion_text(json: &Value) -> Option<String> {
    let first = json.get("choices").and_then(Value::as_array)?.first()?;
    match first.get("message")?.get("content")? {
        Value::String(s) => Some(s.to_string()),
        Value::Array(parts) => join_text_parts(parts),
        _ => None,
    }
}

pub(crate) fn extract_gemini_text(json: &Value) -> Option<String> {
    let parts = json
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("content"))
        .and_then(|v| v.get("parts"))
        .and_then(Value::as_array)?;
    join_text_parts(parts)
}

/// OpenAI-style `/chat/completions` endpoint. Serves OpenRouter, the
/// Hugging Face router, and OpenAI itself.
pub struct OpenAiCompatClient {
    kind: ProviderKind,
    base_url: String,
    api_key: SecretString,
    models: Vec<String>,
    http: Client,
}

impl OpenAiCompatClient {
    pub fn new(
        kind: ProviderKind,
        base_url: impl Into<String>,
        api_key: SecretString,
        models: Vec<String>,
        http: Client,
    ) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
            api_key,
            models,
            http,
        }
    }
}

impl ChatProvider for OpenAiCompatClient {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    fn complete(&self, model: &str, request: &ChatRequest) -> Result<ChatReply, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": model,
            "messages": [
                {"role": "system", "content": request.system_message},
                {"role": "user", "content": request.user_message}
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_output_tokens
        });

        let mut builder = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload);
        if self.kind == ProviderKind::OpenRouter {
            builder = builder.header("X-Title", env!("CARGO_PKG_NAME"));
        }

        let json = send_json(self.kind, builder)?;
        Ok(ChatReply {
            text: extract_chat_completion_text(&json),
        })
    }
}

pub struct GeminiClient {
    base_url: String,
    api_key: SecretString,
    models: Vec<String>,
    http: Client,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        models: Vec<String>,
        http: Client,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            models,
            http,
        }
    }
}

impl ChatProvider for GeminiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    fn complete(&self, model: &str, request: &ChatRequest) -> Result<ChatReply, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        );
        let payload = json!({
            "systemInstruction": {
                "parts": [{"text": request.system_message}]
            },
            "contents": [
                {
                    "role": "user",
                    "parts": [{"text": request.user_message}]
                }
            ],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_output_tokens
            }
        });

        let builder = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&payload);
        let json = send_json(ProviderKind::Gemini, builder)?;
        Ok(ChatReply {
            text: extract_gemini_text(&json),
        })
    }
}

pub fn resolve_api_key(kind: ProviderKind) -> Option<SecretString> {
    env_first_non_empty(kind.api_key_vars()).map(SecretString::from)
}

pub fn resolve_base_url(kind: ProviderKind) -> String {
    env_non_empty(kind.base_url_var()).unwrap_or_else(|| kind.default_base_url().to_string())
}

/// Configured override list, else the built-in defaults.
pub fn resolve_models(kind: ProviderKind, cfg: &ReflectConfig) -> Vec<String> {
    match cfg.models.for_provider(kind) {
        Some(list) if !list.is_empty() => list.to_vec(),
        _ => kind
            .default_models()
            .iter()
            .map(|m| (*m).to_string())
            .collect(),
    }
}

pub fn build_http_client(cfg: &ReflectConfig) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(cfg.http.request_timeout_secs))
        .build()
}

/// Build the client for `kind`, or `None` when it has no credential or is
/// disabled in configuration.
pub fn build_provider(
    kind: ProviderKind,
    cfg: &ReflectConfig,
    http: &Client,
) -> Option<Box<dyn ChatProvider>> {
    if cfg.providers.is_disabled(kind) {
        return None;
    }
    let api_key = resolve_api_key(kind)?;
    let models = resolve_models(kind, cfg);
    let base_url = resolve_base_url(kind);
    let provider: Box<dyn ChatProvider> = match kind {
        ProviderKind::Gemini => Box::new(GeminiClient::new(base_url, api_key, models, http.clone())),
        ProviderKind::OpenRouter | ProviderKind::HuggingFace | ProviderKind::OpenAi => Box::new(
            OpenAiCompatClient::new(kind, base_url, api_key, models, http.clone()),
        ),
    };
    Some(provider)
}
