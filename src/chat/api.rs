use crate::chat::message::{ChatMessage, ChatMessageThread, Role};
use crate::config::Config;
use crate::error::{DomesticatedError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat completion request body
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, thread: &ChatMessageThread) -> Self {
        Self {
            model: model.into(),
            messages: thread.messages().to_vec(),
        }
    }
}

/// Chat completion response; only the fields the client reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
}

/// Remote chat completion endpoint
#[async_trait]
pub trait CompletionApi: Send + Sync {
    async fn create_chat_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

#[async_trait]
impl<T: CompletionApi + ?Sized> CompletionApi for std::sync::Arc<T> {
    async fn create_chat_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        (**self).create_chat_completion(request).await
    }
}

/// Builds a [`CompletionApi`] for an API key
pub type ApiConnector = dyn Fn(&Config, &str) -> Result<Box<dyn CompletionApi>> + Send + Sync;

/// OpenAI-compatible HTTP endpoint
pub struct OpenAiApi {
    api_key: String,
    api_url: String,
    client: reqwest::Client,
}

impl OpenAiApi {
    pub fn new(config: &Config, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DomesticatedError::Network(e.to_string()))?;

        Ok(Self {
            api_key: api_key.into(),
            api_url: config.api_url.clone(),
            client,
        })
    }

    /// Connector for [`ChatClient::connect`](crate::chat::ChatClient::connect)
    pub fn connector(config: &Config, api_key: &str) -> Result<Box<dyn CompletionApi>> {
        Ok(Box::new(Self::new(config, api_key)?))
    }
}

#[async_trait]
impl CompletionApi for OpenAiApi {
    async fn create_chat_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        log::debug!("Completion request: {} messages to {}", request.messages.len(), request.model);
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| DomesticatedError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            log::warn!("Completion API returned {}", status);
            return Err(DomesticatedError::Api { status, message });
        }

        let body = response
            .text()
            .await
            .map_err(|e| DomesticatedError::Network(e.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }
}
