use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// One chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    /// Ask the provider for a JSON object reply where it supports that.
    pub json_mode: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            user: user.into(),
            temperature: 0.2,
            max_tokens: None,
            top_p: None,
            json_mode: false,
        }
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: "system".to_string(),
                content: self.system.clone(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: self.user.clone(),
            },
        ]
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one request and return the assistant's text.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Research: Send + Sync;
    type Plan: Send + Sync;
    type Output: Deliverable + Send + Sync;

    fn name(&self) -> &str;
    async fn research(&self) -> Result<Self::Research>;
    async fn plan(&self, research: &Self::Research) -> Result<Self::Plan>;
    async fn produce(&self, research: &Self::Research, plan: &Self::Plan) -> Result<Self::Output>;
}

/// Artifacts that can be packaged into a ZIP bundle.
pub trait Deliverable {
    fn bundle_name(&self) -> String;
    fn entries(&self) -> Vec<(String, String)>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormInfo {
    pub form_id: String,
    pub responder_url: Option<String>,
    pub edit_url: String,
}

impl FormInfo {
    /// Link to hand out to attendees.
    pub fn share_url(&self) -> String {
        if let Some(url) = self.responder_url.as_ref().filter(|u| !u.is_empty()) {
            return url.clone();
        }
        if !self.form_id.is_empty() {
            return format!("https://docs.google.com/forms/d/{}/viewform", self.form_id);
        }
        self.edit_url.clone()
    }
}

#[async_trait]
pub trait FormPublisher: Send + Sync {
    async fn create_registration_form(&self, title: &str, description: &str) -> Result<FormInfo>;
}
