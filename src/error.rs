// src/error.rs
use thiserror::Error;

use crate::types::NodeId;

pub type Result<T> = std::result::Result<T, ChainError>;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Node not found: {0}")]
    NotFound(NodeId),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChainError {
    /// True when the error means the caller's view of the chain was stale.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ChainError::NotFound(_))
    }
}
