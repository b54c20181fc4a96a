//! A reconciliation node: one coordinator wired to one transport.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use partial_gossip_core::{GroupId, PartialMessage, PartsBitmap};
use partial_gossip_sync::{
    Coordinator, CoordinatorConfig, CoordinatorEvent, CoordinatorHandle, MemoryNetwork,
    MemoryTransport, PeerId, TopicId, Transport,
};

use crate::error::Result;

/// Configuration for a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Index of this node in the test network.
    pub index: u32,
    /// Coordinator configuration.
    pub coordinator: CoordinatorConfig,
}

impl NodeConfig {
    pub fn with_index(index: u32) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }
}

/// A running node.
///
/// Owns the coordinator task and the task pumping inbound RPCs from the
/// transport into it.
pub struct Node<T: Transport> {
    index: u32,
    transport: Arc<T>,
    handle: CoordinatorHandle,
    coordinator: JoinHandle<()>,
    inbound: JoinHandle<partial_gossip_sync::Result<()>>,
}

impl<T: Transport> Node<T> {
    /// Start a node on `transport`.
    pub fn spawn(transport: Arc<T>, config: &NodeConfig) -> Self {
        let (coordinator, handle) =
            Coordinator::new(Arc::clone(&transport), config.coordinator.clone());
        let coordinator = coordinator.start();

        let inbound = {
            let transport = Arc::clone(&transport);
            let handle = handle.clone();
            tokio::spawn(async move { transport.forward_inbound(handle).await })
        };

        info!(
            index = config.index,
            peer = %transport.local_peer_id(),
            "node started"
        );
        Self {
            index: config.index,
            transport,
            handle,
            coordinator,
            inbound,
        }
    }

    /// Index of this node in the test network.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn peer_id(&self) -> PeerId {
        self.transport.local_peer_id()
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Handle to this node's coordinator.
    pub fn handle(&self) -> &CoordinatorHandle {
        &self.handle
    }

    /// Subscribe to this node's coordinator events.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.handle.subscribe()
    }

    /// Build a message for `group_id` with deterministic content in `parts`
    /// and hand it to the coordinator.
    ///
    /// Returns whether the group was new to this node.
    pub async fn add_synthetic(&self, topic: TopicId, group_id: u64, parts: PartsBitmap) -> Result<bool> {
        let message = PartialMessage::filled(GroupId::from_u64(group_id), parts);
        let inserted = self.handle.add(topic.clone(), message).await?;
        debug!(index = self.index, %topic, group_id, %parts, inserted, "added synthetic message");
        Ok(inserted)
    }

    /// Publish a held group to the topic, or only to the listed node indices.
    pub async fn publish(&self, topic: TopicId, group_id: u64, to_nodes: &[u32]) -> Result<()> {
        let peers = to_nodes.iter().copied().map(PeerId::for_node).collect();
        self.handle
            .publish(topic, GroupId::from_u64(group_id), peers)
            .await?;
        Ok(())
    }

    /// Snapshot of a held group.
    pub async fn get(&self, topic: TopicId, group_id: u64) -> Result<Option<PartialMessage>> {
        Ok(self.handle.get(topic, GroupId::from_u64(group_id)).await?)
    }

    /// Stop the coordinator and the inbound pump.
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown();
        self.coordinator.await?;

        // The pump only notices a closed coordinator on its next delivery.
        self.inbound.abort();
        match self.inbound.await {
            Ok(Err(err)) => warn!(index = self.index, %err, "inbound pump failed"),
            Ok(Ok(())) => {}
            Err(err) if err.is_cancelled() => {}
            Err(err) => return Err(err.into()),
        }
        info!(index = self.index, "node stopped");
        Ok(())
    }
}

impl Node<MemoryTransport> {
    /// Start a node on `network` under the identity of `config.index`.
    pub async fn memory(network: &Arc<MemoryNetwork>, config: &NodeConfig) -> Self {
        let transport = network
            .create_transport(PeerId::for_node(config.index))
            .await;
        Self::spawn(Arc::new(transport), config)
    }
}
