// pot-rust/src/error.rs

use thiserror::Error;

/// Custom error type for the proximity-order trie library.
#[derive(Error, Debug)]
pub enum PotError {
    #[error("not found")]
    NotFound,

    #[error("invalid reference length: expected 32 bytes, got {0}")]
    InvalidReference(usize),

    #[error("invalid node binary: {0}")]
    InvalidBinary(String),

    #[error("proof mismatch: {0}")]
    ProofMismatch(String),

    #[error("storage operation failed: {0}")]
    Storage(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias for trie operations.
pub type Result<T> = std::result::Result<T, PotError>;
