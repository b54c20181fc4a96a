//! Reconciliation message types.
//!
//! These are the values that cross the coordinator's boundary: inbound
//! extension RPCs from the transport, outbound publish options, and the
//! events the coordinator reports to observers.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use partial_gossip_core::{GroupId, PartsBitmap};

/// Unique identifier for a peer in the overlay.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the identity of a scripted node from its index.
    ///
    /// Every node of a test network computes the same id for the same index,
    /// so scripts can name destinations by index.
    pub fn for_node(index: u32) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"partial-gossip-peer:");
        hasher.update(&index.to_be_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Name of a pub/sub topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicId(String);

impl TopicId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TopicId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TopicId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Partial messages extension payload as carried by the pub/sub transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialRpc {
    /// Topic the group belongs to.
    pub topic: TopicId,
    /// Group being reconciled.
    pub group_id: GroupId,
    /// Sender's availability, normally one byte.
    pub parts_metadata: Option<Bytes>,
    /// Encoded fragment, if the sender included parts.
    pub partial_message: Option<Bytes>,
}

impl PartialRpc {
    /// Metadata-only announcement of `available`.
    pub fn announce(topic: TopicId, group_id: GroupId, available: PartsBitmap) -> Self {
        Self {
            topic,
            group_id,
            parts_metadata: Some(Bytes::copy_from_slice(&available.to_metadata())),
            partial_message: None,
        }
    }

    /// The sender's bitmap, if the metadata is well formed.
    pub fn peer_bitmap(&self) -> Option<PartsBitmap> {
        self.parts_metadata
            .as_deref()
            .and_then(|metadata| PartsBitmap::from_metadata(metadata).ok())
    }
}

/// An inbound reconciliation event handed to the coordinator.
#[derive(Debug, Clone)]
pub struct IncomingRpc {
    /// Peer the RPC came from.
    pub from: PeerId,
    /// The extension payload.
    pub rpc: PartialRpc,
    /// Where to send a re-announcement. Empty means the whole topic.
    pub reply_to: Vec<PeerId>,
}

impl IncomingRpc {
    pub fn new(from: PeerId, rpc: PartialRpc) -> Self {
        Self {
            from,
            rpc,
            reply_to: Vec::new(),
        }
    }
}

/// Options for an outbound publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Restrict the publish to these peers. Empty means every peer on the topic.
    pub peers: Vec<PeerId>,
}

impl PublishOptions {
    pub fn to_peers(peers: Vec<PeerId>) -> Self {
        Self { peers }
    }

    pub fn is_broadcast(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Notifications emitted by the coordinator after a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// A message gained parts from an inbound fragment.
    Extended {
        topic: TopicId,
        group_id: GroupId,
        available: PartsBitmap,
    },
    /// A message now holds every part.
    Completed { topic: TopicId, group_id: GroupId },
}
