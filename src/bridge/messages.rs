use crate::chat::{ChatMessage, ChatMessageThread};
use crate::error::DomesticatedError;
use serde::{Deserialize, Serialize};

/// Operations a page or UI can ask the background for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BridgeRequest {
    SetKey {
        key: String,
    },
    /// Seed messages of the new thread
    CreateChatThread(Vec<ChatMessage>),
    SendChatMessage {
        #[serde(rename = "threadId", alias = "thread_id")]
        thread_id: String,
        message: String,
    },
    Summarize {
        text: String,
    },
}

impl BridgeRequest {
    pub fn name(&self) -> &'static str {
        match self {
            BridgeRequest::SetKey { .. } => "set_key",
            BridgeRequest::CreateChatThread(_) => "create_chat_thread",
            BridgeRequest::SendChatMessage { .. } => "send_chat_message",
            BridgeRequest::Summarize { .. } => "summarize",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BridgeResponse {
    /// Whether the key was stored and a client could be built from it
    KeySet(bool),
    ThreadCreated(String),
    Thread(ChatMessageThread),
    Summary(String),
    Error { kind: String, message: String },
}

impl From<&DomesticatedError> for BridgeResponse {
    fn from(err: &DomesticatedError) -> Self {
        BridgeResponse::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let request: BridgeRequest = serde_json::from_value(json!({
            "type": "send_chat_message",
            "data": { "threadId": "3", "message": "Hi" }
        }))
        .unwrap();
        assert_eq!(
            request,
            BridgeRequest::SendChatMessage {
                thread_id: "3".into(),
                message: "Hi".into()
            }
        );
        assert_eq!(request.name(), "send_chat_message");

        let create: BridgeRequest = serde_json::from_value(json!({
            "type": "create_chat_thread",
            "data": [{ "role": "system", "content": "Be brief." }]
        }))
        .unwrap();
        assert_eq!(create, BridgeRequest::CreateChatThread(vec![ChatMessage::system("Be brief.")]));
    }

    #[test]
    fn test_snake_case_thread_id_accepted() {
        let request: BridgeRequest = serde_json::from_value(json!({
            "type": "send_chat_message",
            "data": { "thread_id": "3", "message": "Hi" }
        }))
        .unwrap();
        assert!(matches!(request, BridgeRequest::SendChatMessage { ref thread_id, .. } if thread_id == "3"));
    }

    #[test]
    fn test_response_wire_format() {
        assert_eq!(
            serde_json::to_value(BridgeResponse::KeySet(true)).unwrap(),
            json!({ "type": "key_set", "data": true })
        );
        let error = BridgeResponse::from(&DomesticatedError::InvalidThread("9".into()));
        assert_eq!(
            serde_json::to_value(error).unwrap(),
            json!({ "type": "error", "data": { "kind": "invalid_thread", "message": "Invalid thread ID: 9" } })
        );
    }
}
