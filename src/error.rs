use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompareError {
    #[error("Cannot initialize LLM client: API key is empty")]
    Initialization,

    #[error("LLM client used before initialization")]
    NotInitialized,

    #[error("Failed to read file {path:?}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start streaming chat completion: {0}")]
    StreamSetup(String),

    #[error("Stream interrupted: {0}")]
    Stream(String),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Failed to write history file {path:?}: {source}")]
    HistorySave {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CompareError>;
