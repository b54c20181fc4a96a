//! Error types for the sync module.

use thiserror::Error;

use partial_gossip_core::{GroupId, PartialError};

use crate::messages::{PeerId, TopicId};

/// Errors that can occur while talking to the coordinator or the transport.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The coordinator has shut down and no longer accepts requests.
    #[error("coordinator closed")]
    Closed,

    /// Publish was requested for a group the coordinator does not hold.
    #[error("unknown group {group_id} on topic {topic}")]
    UnknownGroup { topic: TopicId, group_id: GroupId },

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Peer is not connected.
    #[error("peer not connected: {0}")]
    PeerNotConnected(PeerId),

    /// Fragment or metadata could not be processed.
    #[error("partial message error: {0}")]
    Partial(#[from] PartialError),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
