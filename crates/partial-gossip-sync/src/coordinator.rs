//! The reconciliation coordinator.
//!
//! A single task owns every [`PartialMessage`] of the process and applies all
//! state transitions one at a time, in the order it dequeues them. Producers
//! never touch the store; they send requests through a
//! [`CoordinatorHandle`](crate::CoordinatorHandle).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use partial_gossip_core::PartialMessage;

use crate::error::{Result, SyncError};
use crate::ingress::{AddRequest, CoordinatorHandle, Inbox, PublishRequest, QueryRequest};
use crate::messages::{CoordinatorEvent, IncomingRpc, PublishOptions, TopicId};
use crate::store::GroupStore;
use crate::transport::Transport;

/// Configuration for the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Capacity of the inbound RPC channel.
    pub incoming_capacity: usize,
    /// Capacity of the add channel.
    pub add_capacity: usize,
    /// Capacity of the publish channel.
    pub publish_capacity: usize,
    /// Capacity of the query channel.
    pub query_capacity: usize,
    /// Events buffered per subscriber before it starts lagging.
    pub event_capacity: usize,
    /// Evict a topic's oldest group beyond this many. `None` keeps everything.
    pub max_groups_per_topic: Option<usize>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            incoming_capacity: 64,
            add_capacity: 1,
            publish_capacity: 1,
            query_capacity: 16,
            event_capacity: 256,
            max_groups_per_topic: None,
        }
    }
}

/// Single-writer owner of all partial message state.
pub struct Coordinator<T: Transport> {
    transport: Arc<T>,
    store: GroupStore,
    inbox: Inbox,
    events: broadcast::Sender<CoordinatorEvent>,
}

impl<T: Transport> Coordinator<T> {
    /// Create a coordinator and the handle used to reach it.
    pub fn new(transport: Arc<T>, config: CoordinatorConfig) -> (Self, CoordinatorHandle) {
        let (incoming_tx, incoming) = mpsc::channel(config.incoming_capacity.max(1));
        let (add_tx, add) = mpsc::channel(config.add_capacity.max(1));
        let (publish_tx, publish) = mpsc::channel(config.publish_capacity.max(1));
        let (query_tx, query) = mpsc::channel(config.query_capacity.max(1));
        let (shutdown_tx, shutdown) = watch::channel(false);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let handle = CoordinatorHandle::new(
            incoming_tx,
            add_tx,
            publish_tx,
            query_tx,
            shutdown_tx,
            events.clone(),
        );
        let coordinator = Self {
            transport,
            store: GroupStore::new(config.max_groups_per_topic),
            inbox: Inbox {
                incoming,
                add,
                publish,
                query,
                shutdown,
            },
            events,
        };
        (coordinator, handle)
    }

    /// Spawn the control loop on the current tokio runtime.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// The control loop. Returns once shutdown is requested or every handle
    /// has been dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                changed = self.inbox.shutdown.changed() => {
                    if changed.is_err() || *self.inbox.shutdown.borrow() {
                        debug!("shutdown");
                        break;
                    }
                },

                req = self.inbox.add.recv() => {
                    let Some(req) = req else { break };
                    trace!("mailbox: add");
                    self.handle_add(req);
                },

                req = self.inbox.publish.recv() => {
                    let Some(req) = req else { break };
                    trace!("mailbox: publish");
                    self.handle_publish(req).await;
                },

                rpc = self.inbox.incoming.recv() => {
                    let Some(rpc) = rpc else { break };
                    trace!(peer = %rpc.from, "network: partial rpc");
                    self.handle_rpc(rpc).await;
                },

                // Last, so a query observes every request queued before it.
                req = self.inbox.query.recv() => {
                    let Some(req) = req else { break };
                    self.handle_query(req);
                },
            }
        }
        self.close();
    }

    /// Reject everything still queued and refuse further sends.
    ///
    /// Dropping the queued requests drops their responders, so waiting callers
    /// observe [`SyncError::Closed`].
    fn close(&mut self) {
        self.inbox.incoming.close();
        self.inbox.add.close();
        self.inbox.publish.close();
        self.inbox.query.close();

        let mut discarded = 0usize;
        while self.inbox.incoming.try_recv().is_ok() {
            discarded += 1;
        }
        while self.inbox.add.try_recv().is_ok() {
            discarded += 1;
        }
        while self.inbox.publish.try_recv().is_ok() {
            discarded += 1;
        }
        while self.inbox.query.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(discarded, "discarded queued requests on shutdown");
        }
        info!(groups = self.store.len(), "coordinator stopped");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Handling
    // ─────────────────────────────────────────────────────────────────────────

    /// Handles an inbound reconciliation event from a peer.
    async fn handle_rpc(&mut self, incoming: IncomingRpc) {
        let IncomingRpc { from, rpc, reply_to } = incoming;
        let topic = rpc.topic.clone();
        let group_id = rpc.group_id;

        // Work on a snapshot so a rejected fragment leaves the store untouched,
        // including not creating the group.
        let existing = self.store.get(&topic, &group_id).cloned();
        let created = existing.is_none();
        let mut message = existing.unwrap_or_else(|| PartialMessage::new(group_id));

        let before = message.available_parts();
        if let Some(data) = rpc.partial_message.as_ref().filter(|data| !data.is_empty()) {
            if let Err(err) = message.extend(data) {
                warn!(%err, peer = %from, %topic, %group_id, "failed to extend partial message");
                return;
            }
        }
        let after = message.available_parts();
        let extended = before != after;

        let peer_differs = match rpc.peer_bitmap() {
            Some(theirs) => {
                if message.should_request(theirs) {
                    debug!(peer = %from, %group_id, %theirs, ours = %after, "peer holds parts we lack");
                }
                theirs != after
            }
            None => {
                if rpc.parts_metadata.is_some() {
                    debug!(peer = %from, %group_id, "ignoring malformed parts metadata");
                }
                false
            }
        };

        if created || extended {
            if let Some(evicted) = self.store.put(&topic, message.clone()) {
                debug!(%topic, group_id = %evicted, "evicted oldest group");
            }
        }

        if extended {
            debug!(%topic, %group_id, %before, %after, "extended partial message");
            let _ = self.events.send(CoordinatorEvent::Extended {
                topic: topic.clone(),
                group_id,
                available: after,
            });
            if message.is_complete() {
                info!(%topic, group_id = group_id.as_u64(), "all parts received");
                let _ = self.events.send(CoordinatorEvent::Completed {
                    topic: topic.clone(),
                    group_id,
                });
            }
        }

        if extended || peer_differs || created {
            if peer_differs {
                debug!(%topic, %group_id, "republishing because parts metadata differ");
            }
            // Failures are logged by `publish`; the loop carries on.
            let _ = self
                .publish(&topic, &message, PublishOptions::to_peers(reply_to))
                .await;
        }
    }

    /// Handles a synthetic insertion.
    fn handle_add(&mut self, req: AddRequest) {
        let AddRequest {
            topic,
            message,
            responder,
        } = req;
        let group_id = *message.group_id();
        let available = message.available_parts();
        let complete = message.is_complete();

        let inserted = self.store.insert_if_absent(&topic, message);
        if inserted {
            debug!(%topic, %group_id, %available, "added partial message");
            if complete {
                info!(%topic, group_id = group_id.as_u64(), "all parts received");
                let _ = self.events.send(CoordinatorEvent::Completed {
                    topic: topic.clone(),
                    group_id,
                });
            }
        } else {
            debug!(%topic, %group_id, "group already held, ignoring add");
        }
        let _ = responder.send(inserted);
    }

    /// Handles an explicit publish request.
    async fn handle_publish(&mut self, req: PublishRequest) {
        let PublishRequest {
            topic,
            group_id,
            options,
            responder,
        } = req;

        let result = match self.store.get(&topic, &group_id).cloned() {
            Some(message) => {
                info!(
                    %topic,
                    group_id = %group_id.to_hex(),
                    peers = options.peers.len(),
                    "publishing partial message"
                );
                self.publish(&topic, &message, options).await
            }
            None => {
                warn!(%topic, %group_id, "publish requested for unknown group");
                Err(SyncError::UnknownGroup { topic, group_id })
            }
        };
        let _ = responder.send(result);
    }

    fn handle_query(&self, req: QueryRequest) {
        let message = self.store.get(&req.topic, &req.group_id).cloned();
        let _ = req.responder.send(message);
    }

    async fn publish(
        &self,
        topic: &TopicId,
        message: &PartialMessage,
        options: PublishOptions,
    ) -> Result<()> {
        self.transport
            .publish_partial(topic, message, options)
            .await
            .map_err(|err| {
                error!(%err, %topic, group_id = %message.group_id(), "failed to publish partial message");
                err
            })
    }
}
