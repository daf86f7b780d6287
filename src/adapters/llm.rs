//! OpenAI-compatible chat completions client.
//!
//! Groq and OpenAI expose the same `/chat/completions` shape; the provider
//! only decides the base URL, the default model and whether JSON mode is sent.

use crate::domain::ports::{ChatMessage, ChatModel, ChatRequest};
use crate::utils::error::{HubError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    Groq,
    OpenAi,
}

impl Provider {
    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::OpenAi => "https://api.openai.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Groq => "llama-3.1-8b-instant",
            Provider::OpenAi => "gpt-4o",
        }
    }

    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::Groq => "GROQ_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }

    fn supports_json_mode(&self) -> bool {
        matches!(self, Provider::OpenAi)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Groq => write!(f, "groq"),
            Provider::OpenAi => write!(f, "openai"),
        }
    }
}

impl FromStr for Provider {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Provider::Groq),
            "openai" => Ok(Provider::OpenAi),
            other => Err(HubError::InvalidConfigValueError {
                field: "llm.provider".to_string(),
                value: other.to_string(),
                reason: "expected 'groq' or 'openai'".to_string(),
            }),
        }
    }
}

pub struct OpenAiCompatClient {
    client: Client,
    api_key: String,
    base_url: String,
    provider: Provider,
}

impl OpenAiCompatClient {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: provider.base_url().to_string(),
            provider,
        }
    }

    /// Point at a different endpoint, e.g. a proxy or a local mock.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    fn body(&self, request: &ChatRequest) -> CompletionBody {
        let (max_tokens, top_p) = match self.provider {
            Provider::Groq => (
                Some(request.max_tokens.unwrap_or(2048)),
                Some(request.top_p.unwrap_or(0.95)),
            ),
            Provider::OpenAi => (request.max_tokens, request.top_p),
        };

        CompletionBody {
            model: request.model.clone(),
            messages: request.messages(),
            temperature: request.temperature,
            max_tokens,
            top_p,
            response_format: (request.json_mode && self.provider.supports_json_mode())
                .then(|| ResponseFormat {
                    kind: "json_object".to_string(),
                }),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!("POST {} model={} provider={}", url, request.model, self.provider);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HubError::ProviderError {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let completion: CompletionResponse = response.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| HubError::ProviderError {
                status: status.as_u16(),
                message: format!("no choices returned by {}", self.provider),
            })?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

/// `{"error": {"message": ...}}` when present, otherwise the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[derive(Debug, Serialize)]
struct CompletionBody {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
