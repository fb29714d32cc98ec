use thiserror::Error;

/// Errors produced by the locator toolkit, the chat layer and the browser glue
#[derive(Debug, Error)]
pub enum DomesticatedError {
    /// No API key has been stored
    #[error("No API key found")]
    MissingCredential,

    /// A chat thread lookup by an unknown id
    #[error("Invalid thread ID: {0}")]
    InvalidThread(String),

    /// The completion endpoint answered without a usable choice
    #[error("No choices returned")]
    NoChoices,

    /// An element wait exceeded its budget
    #[error("Timed out waiting for element '{0}'")]
    Timeout(String),

    /// The global id counter reached its ceiling
    #[error("Max auto increment ID reached")]
    MaxIdExhausted,

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("JavaScript evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A background task was requested outside a tokio runtime
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl DomesticatedError {
    pub(crate) fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable name, used when errors cross the message bridge
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidThread(_) => "invalid_thread",
            Self::NoChoices => "no_choices",
            Self::Timeout(_) => "timeout",
            Self::MaxIdExhausted => "max_id_exhausted",
            Self::InvalidSelector { .. } => "invalid_selector",
            Self::ElementNotFound(_) => "element_not_found",
            Self::EvaluationFailed(_) => "evaluation_failed",
            Self::LaunchFailed(_) => "launch_failed",
            Self::ConnectionFailed(_) => "connection_failed",
            Self::NavigationFailed(_) => "navigation_failed",
            Self::Storage(_) => "storage",
            Self::Serialization(_) => "serialization",
            Self::Network(_) => "network",
            Self::Api { .. } => "api",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Runtime(_) => "runtime",
        }
    }
}

impl From<std::io::Error> for DomesticatedError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, DomesticatedError>;
