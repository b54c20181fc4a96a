//! Error types for partial message operations.

use thiserror::Error;

use crate::types::GroupId;

/// Errors raised while decoding or producing partial message payloads.
///
/// All of them are local and recoverable: the operation that reports one
/// leaves the message it was called on unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartialError {
    /// The wire buffer is too short, or its part section has the wrong size.
    #[error("invalid data length {len}: {reason}")]
    InvalidLength { len: usize, reason: &'static str },

    /// The trailing group id does not belong to the target message.
    #[error("group id mismatch: expected {expected:?}, received {}", hex::encode(.received))]
    GroupMismatch { expected: GroupId, received: Vec<u8> },

    /// A parts metadata argument is not exactly one byte.
    #[error("invalid parts metadata length: expected 1, got {0}")]
    InvalidMetadataLength(usize),
}

/// Result type for partial message operations.
pub type Result<T> = std::result::Result<T, PartialError>;
