//! Crate-wide error type.

use thiserror::Error;

use crate::common::config::ConfigError;
use crate::common::logging::LoggingError;
use crate::leaf::LeafError;
use crate::logger::LoggerError;
use crate::storage::StorageError;
use crate::tlv::DecodeError;
use crate::tree::{MerkleError, TreeError};

/// Root error type aggregating every module's failures.
#[derive(Debug, Error)]
pub enum SigLogError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("merkle tree error: {0}")]
    Merkle(#[from] MerkleError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("leaf error: {0}")]
    Leaf(#[from] LeafError),

    #[error("logger error: {0}")]
    Logger(#[from] LoggerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`SigLogError`].
pub type Result<T> = std::result::Result<T, SigLogError>;
