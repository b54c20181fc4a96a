//! Transport abstraction for partial message reconciliation.
//!
//! The pub/sub transport owns framing, message ids, signing and queueing.
//! The coordinator only needs two things from it: a way to publish a
//! partial message on a topic, and an inbound hook that feeds received
//! extension RPCs into the coordinator.

use async_trait::async_trait;

use partial_gossip_core::PartialMessage;

use crate::error::Result;
use crate::ingress::CoordinatorHandle;
use crate::messages::{PeerId, PublishOptions, TopicId};

/// Pub/sub transport as seen by the coordinator.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Get the local peer's identity.
    fn local_peer_id(&self) -> PeerId;

    /// Publish `message` on `topic`.
    ///
    /// The transport decides per destination which parts to include, using
    /// what it knows of each peer's availability.
    async fn publish_partial(
        &self,
        topic: &TopicId,
        message: &PartialMessage,
        options: PublishOptions,
    ) -> Result<()>;

    /// Forward every received extension RPC to `handle` until the transport
    /// or the coordinator closes.
    async fn forward_inbound(&self, handle: CoordinatorHandle) -> Result<()>;
}

/// Peer connectivity layer: dialing scripted nodes by index.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to the node with the given index.
    async fn connect_to(&self, node_index: u32) -> Result<()>;
}

/// An in-memory transport for tests and simulations.
///
/// Uses channels to simulate extension RPCs between linked peers.
pub mod memory {
    use super::*;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;
    use tokio::sync::mpsc::error::TrySendError;
    use tokio::sync::{mpsc, Mutex, RwLock};
    use tracing::{debug, trace, warn};

    use partial_gossip_core::{GroupId, PartsBitmap};

    use crate::error::SyncError;
    use crate::messages::{IncomingRpc, PartialRpc};

    /// Message envelope for internal routing.
    #[derive(Debug, Clone)]
    struct Envelope {
        from: PeerId,
        rpc: PartialRpc,
    }

    /// Inbound queue depth per transport unless configured otherwise.
    pub const DEFAULT_INBOX_CAPACITY: usize = 1000;

    type ViewKey = (PeerId, TopicId, GroupId);

    /// What we have learned a peer holds, per group.
    type PeerView = HashMap<ViewKey, PartsBitmap>;

    /// Shared state for the memory transport network.
    pub struct MemoryNetwork {
        /// Sender channels for each peer.
        senders: RwLock<HashMap<PeerId, mpsc::Sender<Envelope>>>,
        /// Bidirectional links.
        links: RwLock<HashMap<PeerId, BTreeSet<PeerId>>>,
        /// Inbound queue depth of each transport.
        capacity: usize,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Self::with_capacity(DEFAULT_INBOX_CAPACITY)
        }

        /// Create a network whose transports queue at most `capacity`
        /// inbound RPCs each. A zero capacity is treated as one.
        pub fn with_capacity(capacity: usize) -> Arc<Self> {
            Arc::new(Self {
                senders: RwLock::new(HashMap::new()),
                links: RwLock::new(HashMap::new()),
                capacity: capacity.max(1),
            })
        }

        /// Create a transport attached to this network.
        ///
        /// Registering an id again replaces its inbound queue.
        pub async fn create_transport(self: &Arc<Self>, peer_id: PeerId) -> MemoryTransport {
            let (tx, rx) = mpsc::channel(self.capacity);

            self.senders.write().await.insert(peer_id, tx);

            MemoryTransport {
                peer_id,
                network: Arc::clone(self),
                receiver: Mutex::new(Some(rx)),
                views: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        /// Link two registered peers.
        pub async fn connect(&self, a: PeerId, b: PeerId) -> Result<()> {
            {
                let senders = self.senders.read().await;
                for peer in [a, b] {
                    if !senders.contains_key(&peer) {
                        return Err(SyncError::PeerNotConnected(peer));
                    }
                }
            }
            let mut links = self.links.write().await;
            links.entry(a).or_default().insert(b);
            links.entry(b).or_default().insert(a);
            Ok(())
        }

        /// Peers linked to `peer`, in a stable order.
        pub async fn peers_of(&self, peer: &PeerId) -> Vec<PeerId> {
            self.links
                .read()
                .await
                .get(peer)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        }

        async fn is_linked(&self, a: &PeerId, b: &PeerId) -> bool {
            self.links
                .read()
                .await
                .get(a)
                .is_some_and(|set| set.contains(b))
        }

        async fn sender(&self, peer: &PeerId) -> Option<mpsc::Sender<Envelope>> {
            self.senders.read().await.get(peer).cloned()
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        peer_id: PeerId,
        network: Arc<MemoryNetwork>,
        receiver: Mutex<Option<mpsc::Receiver<Envelope>>>,
        views: Arc<Mutex<PeerView>>,
    }

    impl MemoryTransport {
        /// What this transport believes `peer` holds for a group.
        pub async fn peer_view(&self, peer: &PeerId, topic: &TopicId, group_id: &GroupId) -> PartsBitmap {
            self.views
                .lock()
                .await
                .get(&(*peer, topic.clone(), *group_id))
                .copied()
                .unwrap_or_default()
        }

        /// Build the RPC for `peer` along with the parts it carries.
        ///
        /// Returns `None` when the peer is already known to hold exactly what
        /// we hold. The view is left untouched until the RPC is queued.
        async fn prepare(
            &self,
            key: &ViewKey,
            message: &PartialMessage,
        ) -> Option<(PartialRpc, PartsBitmap)> {
            let ours = message.available_parts();
            let known = self.views.lock().await.get(key).copied().unwrap_or_default();
            if known == ours {
                trace!(peer = %key.0, group_id = %message.group_id(), "peer already in sync");
                return None;
            }

            let payload = message.payload_for(known);
            let mut rpc = PartialRpc::announce(key.1.clone(), *message.group_id(), ours);
            rpc.partial_message = payload.wire;
            Some((rpc, payload.included))
        }

        /// Record that the peer in `key` holds `parts`.
        async fn merge_view(&self, key: ViewKey, parts: PartsBitmap) {
            let mut views = self.views.lock().await;
            let known = views.entry(key).or_default();
            *known = known.merge(parts);
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        fn local_peer_id(&self) -> PeerId {
            self.peer_id
        }

        async fn publish_partial(
            &self,
            topic: &TopicId,
            message: &PartialMessage,
            options: PublishOptions,
        ) -> Result<()> {
            let targets = if options.is_broadcast() {
                self.network.peers_of(&self.peer_id).await
            } else {
                for peer in &options.peers {
                    if !self.network.is_linked(&self.peer_id, peer).await {
                        return Err(SyncError::PeerNotConnected(*peer));
                    }
                }
                options.peers
            };

            for peer in targets {
                let key = (peer, topic.clone(), *message.group_id());
                let Some((rpc, included)) = self.prepare(&key, message).await else {
                    continue;
                };
                let Some(sender) = self.network.sender(&peer).await else {
                    continue;
                };
                let envelope = Envelope {
                    from: self.peer_id,
                    rpc,
                };
                // Undelivered parts stay out of the view.
                match sender.try_send(envelope) {
                    Ok(()) => self.merge_view(key, included).await,
                    Err(TrySendError::Full(_)) => {
                        debug!(%peer, "peer inbox full, dropping rpc");
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!(%peer, "peer disconnected");
                    }
                }
            }
            Ok(())
        }

        async fn forward_inbound(&self, handle: CoordinatorHandle) -> Result<()> {
            let mut rx = self
                .receiver
                .lock()
                .await
                .take()
                .ok_or_else(|| SyncError::Transport("inbound already attached".into()))?;

            while let Some(Envelope { from, rpc }) = rx.recv().await {
                if let Some(theirs) = rpc.peer_bitmap() {
                    self.merge_view((from, rpc.topic.clone(), rpc.group_id), theirs)
                        .await;
                }
                if handle.deliver(IncomingRpc::new(from, rpc)).await.is_err() {
                    warn!(peer = %self.peer_id, "coordinator closed, dropping inbound rpc");
                    break;
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Connector for MemoryTransport {
        async fn connect_to(&self, node_index: u32) -> Result<()> {
            self.network
                .connect(self.peer_id, PeerId::for_node(node_index))
                .await
        }
    }
}

/// A transport that only records what it was asked to publish.
pub mod recording {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    use partial_gossip_core::{GroupId, PartsBitmap};

    use crate::error::SyncError;

    /// One recorded publish.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Published {
        pub topic: TopicId,
        pub group_id: GroupId,
        pub available: PartsBitmap,
        pub options: PublishOptions,
    }

    pub struct RecordingTransport {
        peer_id: PeerId,
        published: Mutex<Vec<Published>>,
        failing: AtomicBool,
    }

    impl RecordingTransport {
        pub fn new(peer_id: PeerId) -> Self {
            Self {
                peer_id,
                published: Mutex::new(Vec::new()),
                failing: AtomicBool::new(false),
            }
        }

        /// Make subsequent publishes fail with a transport error.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Everything published so far.
        pub async fn published(&self) -> Vec<Published> {
            self.published.lock().await.clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn local_peer_id(&self) -> PeerId {
            self.peer_id
        }

        async fn publish_partial(
            &self,
            topic: &TopicId,
            message: &PartialMessage,
            options: PublishOptions,
        ) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(SyncError::Transport("publish rejected".into()));
            }
            self.published.lock().await.push(Published {
                topic: topic.clone(),
                group_id: *message.group_id(),
                available: message.available_parts(),
                options,
            });
            Ok(())
        }

        async fn forward_inbound(&self, _handle: CoordinatorHandle) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryNetwork;
    use super::*;
    use crate::coordinator::{Coordinator, CoordinatorConfig};
    use partial_gossip_core::{GroupId, PartsBitmap};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_connect_requires_registered_peers() {
        let network = MemoryNetwork::new();
        let a = PeerId::for_node(0);
        let _ta = network.create_transport(a).await;

        let err = network.connect(a, PeerId::for_node(1)).await.unwrap_err();
        assert!(matches!(err, crate::SyncError::PeerNotConnected(_)));
    }

    #[tokio::test]
    async fn test_directed_publish_to_unlinked_peer_fails() {
        let network = MemoryNetwork::new();
        let a = PeerId::for_node(0);
        let b = PeerId::for_node(1);
        let ta = network.create_transport(a).await;
        let _tb = network.create_transport(b).await;

        let message = PartialMessage::filled(GroupId::from_u64(1), PartsBitmap::FULL);
        let err = ta
            .publish_partial(&TopicId::from("t"), &message, PublishOptions::to_peers(vec![b]))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::SyncError::PeerNotConnected(p) if p == b));
    }

    #[tokio::test]
    async fn test_publish_tracks_peer_view() {
        let network = MemoryNetwork::new();
        let a = PeerId::for_node(0);
        let b = PeerId::for_node(1);
        let ta = network.create_transport(a).await;
        let _tb = network.create_transport(b).await;
        ta.connect_to(1).await.unwrap();

        let topic = TopicId::from("t");
        let group = GroupId::from_u64(5);
        let message = PartialMessage::filled(group, PartsBitmap(0x0f));

        ta.publish_partial(&topic, &message, PublishOptions::default())
            .await
            .unwrap();
        assert_eq!(ta.peer_view(&b, &topic, &group).await, PartsBitmap(0x0f));
    }

    #[tokio::test]
    async fn test_failed_send_leaves_view_unchanged() {
        let network = MemoryNetwork::new();
        let a = PeerId::for_node(0);
        let b = PeerId::for_node(1);
        let ta = network.create_transport(a).await;
        let tb = network.create_transport(b).await;
        ta.connect_to(1).await.unwrap();

        let topic = TopicId::from("t");
        let group = GroupId::from_u64(5);
        let message = PartialMessage::filled(group, PartsBitmap(0x0f));

        // Dropping the transport closes its inbox.
        drop(tb);
        ta.publish_partial(&topic, &message, PublishOptions::default())
            .await
            .unwrap();
        assert_eq!(ta.peer_view(&b, &topic, &group).await, PartsBitmap::EMPTY);

        // The peer comes back under the same id and gets the parts.
        let _tb = network.create_transport(b).await;
        ta.publish_partial(&topic, &message, PublishOptions::default())
            .await
            .unwrap();
        assert_eq!(ta.peer_view(&b, &topic, &group).await, PartsBitmap(0x0f));
    }

    #[tokio::test]
    async fn test_full_inbox_does_not_block_publish() {
        let network = MemoryNetwork::with_capacity(1);
        let a = PeerId::for_node(0);
        let b = PeerId::for_node(1);
        let ta = network.create_transport(a).await;
        let _tb = network.create_transport(b).await;
        ta.connect_to(1).await.unwrap();

        let topic = TopicId::from("t");
        let first = PartialMessage::filled(GroupId::from_u64(1), PartsBitmap(0x01));
        let second = PartialMessage::filled(GroupId::from_u64(2), PartsBitmap(0x02));

        ta.publish_partial(&topic, &first, PublishOptions::default())
            .await
            .unwrap();
        // Nobody drains b, so this one finds the inbox full.
        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            ta.publish_partial(&topic, &second, PublishOptions::default()),
        )
        .await
        .expect("publish waited on a full inbox")
        .unwrap();

        assert_eq!(
            ta.peer_view(&b, &topic, &GroupId::from_u64(1)).await,
            PartsBitmap(0x01)
        );
        assert_eq!(
            ta.peer_view(&b, &topic, &GroupId::from_u64(2)).await,
            PartsBitmap::EMPTY
        );
    }

    #[tokio::test]
    async fn test_forward_inbound_only_once() {
        let network = MemoryNetwork::new();
        let transport = Arc::new(network.create_transport(PeerId::for_node(0)).await);
        let (coordinator, handle) =
            Coordinator::new(Arc::clone(&transport), CoordinatorConfig::default());
        let task = coordinator.start();

        let forward = {
            let transport = Arc::clone(&transport);
            let handle = handle.clone();
            tokio::spawn(async move { transport.forward_inbound(handle).await })
        };
        // Give the first forwarder time to take the receiver.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(transport.forward_inbound(handle.clone()).await.is_err());

        handle.shutdown();
        task.await.unwrap();
        forward.abort();
    }
}
