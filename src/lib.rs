use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetrievalError>;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Vector length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod corpus;
pub mod models;
pub mod retrieval;
pub mod routing;
pub mod similarity;
