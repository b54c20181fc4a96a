//! # Partial Gossip Sync
//!
//! The concurrent half of partial message reconciliation: a single
//! coordinator task that owns every [`PartialMessage`] of a node and applies
//! inbound fragments, synthetic insertions and publish requests one at a
//! time.
//!
//! ## Overview
//!
//! - **Single writer**: only the coordinator task touches the group store
//! - **Idempotent**: replaying a fragment never changes state twice
//! - **Monotonic**: a part, once held, is never lost or overwritten
//! - **Transport agnostic**: anything implementing [`Transport`] can carry
//!   the extension RPCs
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use partial_gossip_core::{GroupId, PartialMessage, PartsBitmap};
//! use partial_gossip_sync::{Coordinator, CoordinatorConfig, MemoryNetwork, PeerId, TopicId};
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let transport = Arc::new(network.create_transport(PeerId::for_node(0)).await);
//!
//!     let (coordinator, handle) = Coordinator::new(transport, CoordinatorConfig::default());
//!     coordinator.start();
//!
//!     let topic = TopicId::from("blocks");
//!     let group = GroupId::from_u64(42);
//!     handle
//!         .add(topic.clone(), PartialMessage::filled(group, PartsBitmap(0x0f)))
//!         .await
//!         .unwrap();
//!     handle.publish(topic, group, Vec::new()).await.unwrap();
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Node A                                   Node B
//!   |-- metadata(A) + parts B lacks -------->|   extend, store
//!   |<-------- metadata(B) + parts A lacks --|   re-announce
//!   |   extend, store                        |
//!   |-- metadata(A) ------------------------>|   equal: nothing to send
//! ```

pub mod coordinator;
pub mod error;
pub mod ingress;
pub mod messages;
pub mod store;
pub mod transport;

pub use coordinator::{Coordinator, CoordinatorConfig};
pub use error::{Result, SyncError};
pub use ingress::CoordinatorHandle;
pub use messages::{CoordinatorEvent, IncomingRpc, PartialRpc, PeerId, PublishOptions, TopicId};
pub use store::GroupStore;
pub use transport::{
    memory::MemoryNetwork, memory::MemoryTransport, recording::Published,
    recording::RecordingTransport, Connector, Transport,
};
