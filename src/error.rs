//! Error types for Mail Assist.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Empty conversation history for {provider}")]
    EmptyHistory { provider: String },
}

/// Mailbox integration errors.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Mailbox {name} connection failed: {reason}")]
    ConnectionFailed { name: String, reason: String },

    #[error("Mailbox {name} did not become active within {timeout_secs}s")]
    ActivationTimeout { name: String, timeout_secs: u64 },

    #[error("Mailbox {name} failed to enable trigger {trigger}: {reason}")]
    TriggerFailed {
        name: String,
        trigger: String,
        reason: String,
    },

    #[error("Mailbox {name} action {action} failed: {reason}")]
    ActionFailed {
        name: String,
        action: String,
        reason: String,
    },

    #[error("Failed to send reply on mailbox {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Mailbox {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors from a single conversational turn.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("Thread id must not be empty")]
    EmptyThreadId,

    #[error("Model call failed: {0}")]
    Llm(#[from] LlmError),
}

/// Errors from answering one inbound email, tagged by the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to compute reply for thread {thread_id}: {source}")]
    Turn {
        thread_id: String,
        #[source]
        source: TurnError,
    },

    #[error("Failed to send reply to {recipient}: {source}")]
    Reply {
        recipient: String,
        #[source]
        source: MailboxError,
    },
}

/// Errors that end the interactive console loop.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Turn(#[from] TurnError),
}

/// Top-level error aggregating every subsystem.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Turn error: {0}")]
    Turn(#[from] TurnError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Console error: {0}")]
    Console(#[from] ConsoleError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
