//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::{Arc, Once};

use bytes::Bytes;
use rand::seq::SliceRandom;

use partial_gossip_core::{GroupId, PartialMessage, PartsBitmap};
use partial_gossip_sync::{
    IncomingRpc, MemoryNetwork, MemoryTransport, PartialRpc, PeerId, Result, TopicId,
};

/// How the nodes of a [`TestNetwork`] are linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// `0 - 1 - 2 - ... - n-1`.
    Line,
    /// Every node linked to every other.
    Full,
    /// Node 0 linked to everyone else.
    Star,
    /// No links.
    Isolated,
}

/// A memory network with one transport per node index.
pub struct TestNetwork {
    pub network: Arc<MemoryNetwork>,
    /// Transport `i` has identity `PeerId::for_node(i)`.
    pub transports: Vec<Arc<MemoryTransport>>,
}

impl TestNetwork {
    /// Create `nodes` transports and link them.
    pub async fn build(nodes: u32, topology: Topology) -> Result<Self> {
        let network = MemoryNetwork::new();
        let mut transports = Vec::with_capacity(nodes as usize);
        for index in 0..nodes {
            let transport = network.create_transport(PeerId::for_node(index)).await;
            transports.push(Arc::new(transport));
        }

        for (a, b) in links(nodes, topology) {
            network
                .connect(PeerId::for_node(a), PeerId::for_node(b))
                .await?;
        }
        Ok(Self {
            network,
            transports,
        })
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.transports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}

/// Node index pairs to link for `topology`.
pub fn links(nodes: u32, topology: Topology) -> Vec<(u32, u32)> {
    match topology {
        Topology::Line => (1..nodes).map(|i| (i - 1, i)).collect(),
        Topology::Full => (0..nodes)
            .flat_map(|a| (a + 1..nodes).map(move |b| (a, b)))
            .collect(),
        Topology::Star => (1..nodes).map(|i| (0, i)).collect(),
        Topology::Isolated => Vec::new(),
    }
}

/// Split `PartsBitmap::FULL` across `nodes` holders in a random order, so
/// that together they hold every part and no part is held twice.
pub fn scatter_parts(nodes: usize) -> Vec<PartsBitmap> {
    let mut holders = vec![PartsBitmap::EMPTY; nodes.max(1)];
    let mut indices: Vec<usize> = PartsBitmap::FULL.iter().collect();
    indices.shuffle(&mut rand::thread_rng());
    for (slot, index) in indices.into_iter().enumerate() {
        let holder = &mut holders[slot % nodes.max(1)];
        *holder = holder.union(PartsBitmap::single(index));
    }
    holders
}

/// Encoded fragment carrying `bits` of `group`, with deterministic content.
pub fn fragment(group: u64, bits: PartsBitmap) -> Option<Bytes> {
    PartialMessage::filled(GroupId::from_u64(group), bits)
        .payload_for(PartsBitmap::EMPTY)
        .wire
}

/// An inbound RPC from node `from` advertising and carrying `bits`.
pub fn incoming(from: u32, topic: &str, group: u64, bits: PartsBitmap) -> IncomingRpc {
    let mut rpc = PartialRpc::announce(TopicId::from(topic), GroupId::from_u64(group), bits);
    rpc.partial_message = fragment(group, bits);
    IncomingRpc::new(PeerId::for_node(from), rpc)
}

/// Install a tracing subscriber that writes to the test output.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .try_init();
    });
}
