//! Chat threads and the completion client
//!
//! Threads are persisted as a single JSON record in a [`KeyValueStorage`];
//! [`ChatClient`] appends to them through a [`CompletionApi`].

pub mod api;
pub mod client;
pub mod message;
pub mod storage;
pub mod store;

pub use api::{ApiConnector, Choice, CompletionApi, CompletionRequest, CompletionResponse, OpenAiApi, ResponseMessage};
pub use client::{ChatClient, SUMMARIZE_INSTRUCTION};
pub use message::{ChatMessage, ChatMessageThread, ChatThreads, Role};
pub use storage::{CREDENTIAL_KEY, FileStorage, KeyValueStorage, MemoryStorage};
pub use store::{ChatThreadStore, THREADS_KEY};
