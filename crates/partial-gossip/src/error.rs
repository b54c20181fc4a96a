//! Error types for nodes and the scripted driver.

use partial_gossip_sync::SyncError;
use thiserror::Error;

/// Errors that can occur while running a node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Coordinator or transport error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Script JSON could not be parsed.
    #[error("invalid script: {0}")]
    Script(#[from] serde_json::Error),

    /// A node task panicked or was cancelled.
    #[error("node task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
