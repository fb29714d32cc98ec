use crate::chat::api::{ApiConnector, CompletionApi, CompletionRequest};
use crate::chat::message::{ChatMessage, ChatMessageThread, Role};
use crate::chat::storage::{CREDENTIAL_KEY, KeyValueStorage};
use crate::chat::store::ChatThreadStore;
use crate::config::Config;
use crate::error::{DomesticatedError, Result};
use std::sync::Arc;

/// System instruction for [`ChatClient::summarize`]
pub const SUMMARIZE_INSTRUCTION: &str = "You are a tool that summarizes text. The outputs you provide are as short \
     and concise as possible without leaving any important information out.";

/// Chat threads backed by a completion API
pub struct ChatClient {
    store: ChatThreadStore,
    api: Box<dyn CompletionApi>,
    model: String,
}

impl ChatClient {
    /// Open the thread store on `storage` and build the API from the stored key.
    ///
    /// Fails with [`DomesticatedError::MissingCredential`] when no key is stored.
    pub fn connect(config: &Config, storage: Arc<dyn KeyValueStorage>, connector: &ApiConnector) -> Result<Self> {
        let store = ChatThreadStore::new(storage.clone())?;
        let key = storage
            .get_item(CREDENTIAL_KEY)?
            .filter(|key| !key.is_empty())
            .ok_or(DomesticatedError::MissingCredential)?;
        let api = connector(config, &key)?;

        log::info!("Chat client ready (model: {})", config.model);
        Ok(Self::new(store, api, config.model.clone()))
    }

    pub fn new(store: ChatThreadStore, api: Box<dyn CompletionApi>, model: impl Into<String>) -> Self {
        Self {
            store,
            api,
            model: model.into(),
        }
    }

    pub fn store(&self) -> &ChatThreadStore {
        &self.store
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Store a new thread seeded with `messages` and return its id
    pub fn create_thread(&self, messages: Vec<ChatMessage>) -> Result<String> {
        self.store.write_thread(&ChatMessageThread::from(messages), None)
    }

    /// Append `message` to a stored thread, ask for a reply, and persist the result.
    ///
    /// The first choice carrying a message is appended. A response without one
    /// still persists the user message.
    pub async fn send_message(&self, thread_id: &str, message: &str) -> Result<ChatMessageThread> {
        let mut thread = self
            .store
            .read_thread(thread_id)?
            .ok_or_else(|| DomesticatedError::InvalidThread(thread_id.to_string()))?;

        thread.push_user_message(message);

        let response = self
            .api
            .create_chat_completion(&CompletionRequest::new(&self.model, &thread))
            .await?;

        match response.choices.into_iter().find_map(|choice| choice.message) {
            Some(reply) => thread.push(ChatMessage::new(reply.role, reply.content.unwrap_or_default())),
            None => log::warn!("Completion for thread {} carried no message", thread_id),
        }

        self.store.write_thread(&thread, Some(thread_id))?;
        Ok(thread)
    }

    /// One-shot summary of `text` from the last choice of the response
    pub async fn summarize(&self, text: &str) -> Result<String> {
        let mut thread = ChatMessageThread::new();
        thread.push_system_message(SUMMARIZE_INSTRUCTION);
        thread.push_user_message(format!("Summarize this text: {}", text));

        let response = self
            .api
            .create_chat_completion(&CompletionRequest::new(&self.model, &thread))
            .await?;

        let summary = response
            .choices
            .into_iter()
            .last()
            .and_then(|choice| choice.message)
            .filter(|message| message.role == Role::Assistant)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
            .ok_or(DomesticatedError::NoChoices)?;

        log::debug!("Summary: {}", summary);
        Ok(summary)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chat::api::{Choice, CompletionResponse, ResponseMessage};
    use crate::chat::storage::MemoryStorage;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays queued responses and records every request
    #[derive(Default)]
    pub(crate) struct ScriptedApi {
        responses: Mutex<VecDeque<CompletionResponse>>,
        pub(crate) requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedApi {
        pub(crate) fn replying(responses: Vec<CompletionResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn call_count(&self) -> usize {
            self.requests.lock().len()
        }
    }

    #[async_trait]
    impl CompletionApi for ScriptedApi {
        async fn create_chat_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
            self.requests.lock().push(request.clone());
            Ok(self.responses.lock().pop_front().unwrap_or_default())
        }
    }

    pub(crate) fn choice(role: Role, content: Option<&str>) -> Choice {
        Choice {
            index: 0,
            message: Some(ResponseMessage {
                role,
                content: content.map(str::to_string),
            }),
            finish_reason: Some("stop".to_string()),
        }
    }

    fn empty_choice() -> Choice {
        Choice {
            index: 0,
            message: None,
            finish_reason: None,
        }
    }

    pub(crate) fn reply(choices: Vec<Choice>) -> CompletionResponse {
        CompletionResponse { choices }
    }

    fn client(api: Arc<ScriptedApi>) -> ChatClient {
        let store = ChatThreadStore::new(Arc::new(MemoryStorage::new())).unwrap();
        ChatClient::new(store, Box::new(api), "gpt-3.5-turbo")
    }

    #[test]
    fn test_connect_requires_key() {
        let storage = Arc::new(MemoryStorage::new());
        let connector = |_: &Config, _: &str| -> Result<Box<dyn CompletionApi>> { Ok(Box::new(ScriptedApi::default())) };
        let result = ChatClient::connect(&Config::default(), storage.clone(), &connector);
        assert!(matches!(result, Err(DomesticatedError::MissingCredential)));

        // The thread record is initialized even without a key
        assert!(storage.get_item("chat_threads").unwrap().is_some());
    }

    #[test]
    fn test_connect_passes_stored_key() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(CREDENTIAL_KEY, "sk-stored").unwrap();
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = seen.clone();
        let connector = move |_: &Config, key: &str| -> Result<Box<dyn CompletionApi>> {
            *sink.lock() = key.to_string();
            Ok(Box::new(ScriptedApi::default()))
        };

        let client = ChatClient::connect(&Config::default().model("gpt-4"), storage, &connector).unwrap();
        assert_eq!(*seen.lock(), "sk-stored");
        assert_eq!(client.model(), "gpt-4");
    }

    #[tokio::test]
    async fn test_unknown_thread_makes_no_request() {
        let api = ScriptedApi::replying(vec![]);
        let client = client(api.clone());

        let result = client.send_message("404", "hello?").await;
        assert!(matches!(result, Err(DomesticatedError::InvalidThread(ref id)) if id == "404"));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_send_message_appends_first_reply() {
        let api = ScriptedApi::replying(vec![reply(vec![
            empty_choice(),
            choice(Role::Assistant, Some("First.")),
            choice(Role::Assistant, Some("Second.")),
        ])]);
        let client = client(api.clone());
        let id = client.create_thread(vec![ChatMessage::system("Be brief.")]).unwrap();

        let thread = client.send_message(&id, "Hi").await.unwrap();
        let contents: Vec<&str> = thread.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Be brief.", "Hi", "First."]);

        // Whole thread is sent, and the result persisted
        assert_eq!(api.requests.lock()[0].messages.len(), 2);
        assert_eq!(client.store().read_thread(&id).unwrap(), Some(thread));
    }

    #[tokio::test]
    async fn test_send_message_without_reply_keeps_user_message() {
        let api = ScriptedApi::replying(vec![reply(vec![empty_choice()])]);
        let client = client(api);
        let id = client.create_thread(vec![]).unwrap();

        let thread = client.send_message(&id, "Anyone?").await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(client.store().read_thread(&id).unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_summarize_uses_last_choice() {
        let api = ScriptedApi::replying(vec![reply(vec![
            choice(Role::Assistant, Some("Ignored.")),
            choice(Role::Assistant, Some("Short.")),
        ])]);
        let client = client(api.clone());

        assert_eq!(client.summarize("A long text").await.unwrap(), "Short.");
        let request = &api.requests.lock()[0];
        assert_eq!(request.messages[0], ChatMessage::system(SUMMARIZE_INSTRUCTION));
        assert_eq!(request.messages[1], ChatMessage::user("Summarize this text: A long text"));
    }

    #[tokio::test]
    async fn test_summarize_rejects_unusable_choices() {
        let cases = vec![
            reply(vec![]),
            reply(vec![empty_choice()]),
            reply(vec![choice(Role::User, Some("Echo"))]),
            reply(vec![choice(Role::Assistant, Some(""))]),
            reply(vec![choice(Role::Assistant, None)]),
            reply(vec![choice(Role::Assistant, Some("Good.")), empty_choice()]),
        ];
        for response in cases {
            let client = client(ScriptedApi::replying(vec![response]));
            assert!(matches!(client.summarize("text").await, Err(DomesticatedError::NoChoices)));
        }
    }
}
