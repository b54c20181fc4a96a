//! # Partial Gossip
//!
//! Reconciliation of large messages split into fixed-size parts, exchanged
//! between pub/sub peers by availability bitmap until every interested peer
//! holds the whole message.
//!
//! ## Overview
//!
//! - **Parts**: a message is eight 1024-byte, write-once fragments
//! - **Bitmaps**: peers advertise what they hold in a single byte
//! - **Coordinator**: one task per node owns all partial message state
//! - **Scripts**: interop experiments drive nodes from a JSON script
//!
//! ## Usage
//!
//! ```rust,no_run
//! use partial_gossip::{MemoryNetwork, Node, NodeConfig, PartsBitmap, TopicId};
//! use partial_gossip::sync::Connector;
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let a = Node::memory(&network, &NodeConfig::with_index(0)).await;
//!     let b = Node::memory(&network, &NodeConfig::with_index(1)).await;
//!     a.transport().connect_to(1).await.unwrap();
//!
//!     let topic = TopicId::from("blocks");
//!     a.add_synthetic(topic.clone(), 42, PartsBitmap(0x0f)).await.unwrap();
//!     b.add_synthetic(topic.clone(), 42, PartsBitmap(0xf0)).await.unwrap();
//!     a.publish(topic, 42, &[]).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `partial_gossip::core` - Parts, bitmaps and the wire codec
//! - `partial_gossip::sync` - Coordinator and transports

pub mod error;
pub mod node;
pub mod script;

// Re-export component crates
pub use partial_gossip_core as core;
pub use partial_gossip_sync as sync;

// Re-export main types for convenience
pub use error::{NodeError, Result};
pub use node::{Node, NodeConfig};
pub use script::{load_script, Script, ScriptInstruction, ScriptRunner};

// Re-export commonly used types
pub use partial_gossip_core::{GroupId, PartialMessage, PartsBitmap, PART_COUNT, PART_LEN};
pub use partial_gossip_sync::{
    CoordinatorConfig, CoordinatorEvent, CoordinatorHandle, MemoryNetwork, MemoryTransport,
    PeerId, TopicId,
};
