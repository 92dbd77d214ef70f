//! Error types for the support orchestrator.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Reasoning engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Authentication failed")]
    Auth(#[from] AuthError),
}

/// Configuration-related errors.
///
/// Fatal only for strictly required settings at startup; optional subsystems
/// (the mailbox worker) run disabled instead of erroring.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Reasoning engine errors.
///
/// Inside the router these are recoverable (fall back to the default
/// category); inside an orchestration round they abort the transaction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine request failed: {0}")]
    RequestFailed(String),

    #[error("Engine returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tool dispatch errors.
///
/// The dispatcher converts all of these into structured payloads for the
/// engine to verbalize; they never abort a transaction.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool requested: {name}")]
    UnknownTool { name: String },

    #[error("Invalid arguments for tool {name}: {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("Adapter call failed for tool {name}: {reason}")]
    AdapterFailed { name: String, reason: String },
}

/// Mailbox client errors — transient, retried on the next worker cycle.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Mailbox request failed: {0}")]
    RequestFailed(String),

    #[error("Mailbox returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed mailbox payload: {0}")]
    MalformedPayload(String),
}

/// Authentication failure on the interactive surface.
///
/// Rejected uniformly with no partial processing and no side effects.
#[derive(Debug, thiserror::Error)]
#[error("invalid or missing shared secret")]
pub struct AuthError;

/// Result type alias for the orchestrator.
pub type Result<T> = std::result::Result<T, Error>;
