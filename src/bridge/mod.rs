//! Background side of the message bridge
//!
//! [`Background`] owns the storage and the chat client and answers the four
//! [`BridgeRequest`] operations, either typed or as JSON.

pub mod messages;

pub use messages::{BridgeRequest, BridgeResponse};

use crate::chat::{ApiConnector, CREDENTIAL_KEY, ChatClient, ChatMessage, ChatMessageThread, KeyValueStorage, OpenAiApi};
use crate::config::Config;
use crate::error::{DomesticatedError, Result};
use parking_lot::RwLock;
use std::sync::Arc;

pub struct Background {
    config: Config,
    storage: Arc<dyn KeyValueStorage>,
    connector: Box<ApiConnector>,
    client: RwLock<Option<Arc<ChatClient>>>,
}

impl Background {
    /// Background talking to the configured OpenAI-compatible endpoint
    pub fn new(config: Config, storage: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_connector(config, storage, Box::new(OpenAiApi::connector))
    }

    pub fn with_connector(config: Config, storage: Arc<dyn KeyValueStorage>, connector: Box<ApiConnector>) -> Self {
        let background = Self {
            config,
            storage,
            connector,
            client: RwLock::new(None),
        };
        if let Err(e) = background.reconnect() {
            log::warn!("Chat client unavailable: {}", e);
        }
        background
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Store `key` and rebuild the client from it
    pub fn set_key(&self, key: &str) -> bool {
        if let Err(e) = self.storage.set_item(CREDENTIAL_KEY, key) {
            log::warn!("Failed to store API key: {}", e);
            return false;
        }
        match self.reconnect() {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Failed to connect with new key: {}", e);
                false
            }
        }
    }

    pub fn create_chat_thread(&self, messages: Vec<ChatMessage>) -> Result<String> {
        self.client()?.create_thread(messages)
    }

    pub async fn send_chat_message(&self, thread_id: &str, message: &str) -> Result<ChatMessageThread> {
        self.client()?.send_message(thread_id, message).await
    }

    pub async fn summarize(&self, text: &str) -> Result<String> {
        self.client()?.summarize(text).await
    }

    pub async fn handle(&self, request: BridgeRequest) -> Result<BridgeResponse> {
        log::debug!("Bridge request: {}", request.name());
        match request {
            BridgeRequest::SetKey { key } => Ok(BridgeResponse::KeySet(self.set_key(&key))),
            BridgeRequest::CreateChatThread(messages) => {
                Ok(BridgeResponse::ThreadCreated(self.create_chat_thread(messages)?))
            }
            BridgeRequest::SendChatMessage { thread_id, message } => {
                Ok(BridgeResponse::Thread(self.send_chat_message(&thread_id, &message).await?))
            }
            BridgeRequest::Summarize { text } => Ok(BridgeResponse::Summary(self.summarize(&text).await?)),
        }
    }

    /// Answer a JSON request with a JSON response; failures become `error` responses
    pub async fn handle_json(&self, raw: &str) -> String {
        let response = match serde_json::from_str::<BridgeRequest>(raw) {
            Ok(request) => match self.handle(request).await {
                Ok(response) => response,
                Err(e) => {
                    log::warn!("Bridge request failed: {}", e);
                    BridgeResponse::from(&e)
                }
            },
            Err(e) => BridgeResponse::from(&DomesticatedError::from(e)),
        };
        serde_json::to_string(&response)
            .unwrap_or_else(|e| format!(r#"{{"type":"error","data":{{"kind":"serialization","message":"{}"}}}}"#, e))
    }

    fn client(&self) -> Result<Arc<ChatClient>> {
        if let Some(client) = self.client.read().as_ref() {
            return Ok(client.clone());
        }
        self.reconnect()
    }

    fn reconnect(&self) -> Result<Arc<ChatClient>> {
        let client = Arc::new(ChatClient::connect(&self.config, self.storage.clone(), &*self.connector)?);
        *self.client.write() = Some(client.clone());
        Ok(client)
    }
}
