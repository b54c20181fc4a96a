//! Ingress handle for the [`Coordinator`](crate::Coordinator).
//!
//! Every producer (the transport's inbound hook, the scripted driver, test
//! code) talks to the coordinator through a cloned [`CoordinatorHandle`].
//! Each request kind has its own bounded channel; a full channel blocks the
//! sender until the coordinator catches up. Once the coordinator has shut
//! down every call fails with [`SyncError::Closed`].

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use partial_gossip_core::{GroupId, PartialMessage};

use crate::error::{Result, SyncError};
use crate::messages::{CoordinatorEvent, IncomingRpc, PeerId, PublishOptions, TopicId};

/// Insert a ready-made message if its group is not yet known.
pub(crate) struct AddRequest {
    pub topic: TopicId,
    pub message: PartialMessage,
    pub responder: oneshot::Sender<bool>,
}

/// Push a stored message out through the transport.
pub(crate) struct PublishRequest {
    pub topic: TopicId,
    pub group_id: GroupId,
    pub options: PublishOptions,
    pub responder: oneshot::Sender<Result<()>>,
}

/// Read a snapshot of a stored message.
pub(crate) struct QueryRequest {
    pub topic: TopicId,
    pub group_id: GroupId,
    pub responder: oneshot::Sender<Option<PartialMessage>>,
}

/// Receiving ends, owned by the coordinator task.
pub(crate) struct Inbox {
    pub incoming: mpsc::Receiver<IncomingRpc>,
    pub add: mpsc::Receiver<AddRequest>,
    pub publish: mpsc::Receiver<PublishRequest>,
    pub query: mpsc::Receiver<QueryRequest>,
    pub shutdown: watch::Receiver<bool>,
}

/// Cloneable handle for submitting work to the coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    incoming: mpsc::Sender<IncomingRpc>,
    add: mpsc::Sender<AddRequest>,
    publish: mpsc::Sender<PublishRequest>,
    query: mpsc::Sender<QueryRequest>,
    shutdown: Arc<watch::Sender<bool>>,
    events: broadcast::Sender<CoordinatorEvent>,
}

impl CoordinatorHandle {
    pub(crate) fn new(
        incoming: mpsc::Sender<IncomingRpc>,
        add: mpsc::Sender<AddRequest>,
        publish: mpsc::Sender<PublishRequest>,
        query: mpsc::Sender<QueryRequest>,
        shutdown: watch::Sender<bool>,
        events: broadcast::Sender<CoordinatorEvent>,
    ) -> Self {
        Self {
            incoming,
            add,
            publish,
            query,
            shutdown: Arc::new(shutdown),
            events,
        }
    }

    /// Hand an inbound extension RPC to the coordinator.
    ///
    /// This is the transport's inbound hook.
    pub async fn deliver(&self, rpc: IncomingRpc) -> Result<()> {
        self.incoming.send(rpc).await.map_err(|_| SyncError::Closed)
    }

    /// Insert `message` under `topic` unless its group is already held.
    ///
    /// Returns whether the message was inserted.
    pub async fn add(&self, topic: TopicId, message: PartialMessage) -> Result<bool> {
        let (responder, receiver) = oneshot::channel();
        self.add
            .send(AddRequest {
                topic,
                message,
                responder,
            })
            .await
            .map_err(|_| SyncError::Closed)?;
        receiver.await.map_err(|_| SyncError::Closed)
    }

    /// Publish a stored group to the whole topic, or to `peers` if non-empty.
    ///
    /// Fails with [`SyncError::UnknownGroup`] if the group is not held.
    pub async fn publish(&self, topic: TopicId, group_id: GroupId, peers: Vec<PeerId>) -> Result<()> {
        let (responder, receiver) = oneshot::channel();
        self.publish
            .send(PublishRequest {
                topic,
                group_id,
                options: PublishOptions::to_peers(peers),
                responder,
            })
            .await
            .map_err(|_| SyncError::Closed)?;
        receiver.await.map_err(|_| SyncError::Closed)?
    }

    /// Snapshot of a stored group.
    pub async fn get(&self, topic: TopicId, group_id: GroupId) -> Result<Option<PartialMessage>> {
        let (responder, receiver) = oneshot::channel();
        self.query
            .send(QueryRequest {
                topic,
                group_id,
                responder,
            })
            .await
            .map_err(|_| SyncError::Closed)?;
        receiver.await.map_err(|_| SyncError::Closed)
    }

    /// Subscribe to coordinator events.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    /// Ask the coordinator to stop. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Whether the coordinator has stopped accepting work.
    pub fn is_closed(&self) -> bool {
        self.incoming.is_closed()
    }
}
