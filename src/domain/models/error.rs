use std::path::PathBuf;

use thiserror::Error;

/// Failures a chat session surfaces to the user. Raised through `anyhow`;
/// callers that need to branch use `downcast_ref::<ChatError>()`.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("No model named {name} is available. Possible values are: {available}")]
    ModelNotFound { name: String, available: String },

    #[error("Model {name} could not be loaded: {reason}")]
    ModelUnavailable { name: String, reason: String },

    #[error("History file {} is corrupt: {source}", .path.display())]
    CorruptHistory {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("History file {} could not be read: {source}", .path.display())]
    UnreadableHistory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No history file found at {}", .path.display())]
    HistoryNotFound { path: PathBuf },

    #[error("Max length must be a positive number, got: {0}")]
    InvalidMaxLength(usize),

    #[error("Generation failed: {0}")]
    GenerationFailure(String),
}
