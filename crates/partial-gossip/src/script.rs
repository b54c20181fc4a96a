//! Scripted driver for interop experiments.
//!
//! A script is a JSON document `{ "script": [ ... ] }` of instructions
//! tagged on `"type"`. Every node of an experiment runs the same script;
//! `ifNodeIDEquals` narrows an instruction to a single node.
//!
//! Scripts written for the full pub/sub harness also carry `initGossipSub`,
//! `subscribeToTopic`, `publish` and `setTopicValidationDelay`. They parse
//! here so the same file drives this node, but they only apply to a
//! pub/sub router and are logged and skipped.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use partial_gossip_core::PartsBitmap;
use partial_gossip_sync::{Connector, SyncError, TopicId, Transport};

use crate::error::Result;
use crate::node::Node;

/// One step of an experiment script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScriptInstruction {
    /// Create a group locally, filled with deterministic parts.
    AddPartialMessage {
        parts: u8,
        #[serde(rename = "topicID")]
        topic_id: String,
        #[serde(rename = "groupID")]
        group_id: u64,
    },
    /// Publish a held group, to everyone or to the listed node indices.
    PublishPartial {
        #[serde(rename = "topicID")]
        topic_id: String,
        #[serde(rename = "groupID")]
        group_id: u64,
        #[serde(rename = "publishToNodeIDs", default)]
        publish_to_node_ids: Option<Vec<u32>>,
    },
    /// Dial the listed node indices.
    Connect {
        #[serde(rename = "connectTo")]
        connect_to: Vec<u32>,
    },
    /// Run `instruction` only on node `node_id`.
    #[serde(rename = "ifNodeIDEquals")]
    IfNodeIdEquals {
        #[serde(rename = "nodeID")]
        node_id: u32,
        instruction: Box<ScriptInstruction>,
    },
    /// Sleep until this many seconds after the script started.
    WaitUntil {
        #[serde(rename = "elapsedSeconds")]
        elapsed_seconds: u64,
    },
    /// Router parameters, kept as raw JSON.
    InitGossipSub {
        #[serde(rename = "gossipSubParams", default)]
        gossip_sub_params: serde_json::Value,
    },
    SubscribeToTopic {
        #[serde(rename = "topicID")]
        topic_id: String,
        #[serde(default)]
        partial: bool,
    },
    /// Publish a full message of the given size.
    Publish {
        #[serde(rename = "messageID")]
        message_id: u64,
        #[serde(rename = "messageSizeBytes")]
        message_size_bytes: u64,
        #[serde(rename = "topicID")]
        topic_id: String,
    },
    SetTopicValidationDelay {
        #[serde(rename = "topicID")]
        topic_id: String,
        #[serde(rename = "delaySeconds")]
        delay_seconds: f64,
    },
}

/// A whole script file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub script: Vec<ScriptInstruction>,
}

impl Script {
    /// Parse a script from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Load a script file.
pub fn load_script(path: impl AsRef<Path>) -> anyhow::Result<Script> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    let script = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse script {}", path.display()))?;
    Ok(script)
}

/// Executes script instructions on behalf of one node.
pub struct ScriptRunner<'a, T: Transport + Connector> {
    node: &'a Node<T>,
    start: Instant,
}

impl<'a, T: Transport + Connector> ScriptRunner<'a, T> {
    /// A runner whose `waitUntil` offsets count from now.
    pub fn new(node: &'a Node<T>) -> Self {
        Self {
            node,
            start: Instant::now(),
        }
    }

    /// Run every instruction in order.
    pub async fn run(&self, script: &Script) -> Result<()> {
        for instruction in &script.script {
            self.execute(instruction).await?;
        }
        info!(index = self.node.index(), "script finished");
        Ok(())
    }

    /// Run one instruction.
    ///
    /// Publishing a group this node does not hold is logged and skipped so a
    /// shared script keeps going on nodes that never added it.
    pub async fn execute(&self, instruction: &ScriptInstruction) -> Result<()> {
        let mut instruction = instruction;
        while let ScriptInstruction::IfNodeIdEquals {
            node_id,
            instruction: inner,
        } = instruction
        {
            if *node_id != self.node.index() {
                return Ok(());
            }
            instruction = inner.as_ref();
        }

        match instruction {
            ScriptInstruction::AddPartialMessage {
                parts,
                topic_id,
                group_id,
            } => {
                self.node
                    .add_synthetic(TopicId::new(topic_id), *group_id, PartsBitmap(*parts))
                    .await?;
            }
            ScriptInstruction::PublishPartial {
                topic_id,
                group_id,
                publish_to_node_ids,
            } => {
                let targets = publish_to_node_ids.as_deref().unwrap_or_default();
                match self
                    .node
                    .publish(TopicId::new(topic_id), *group_id, targets)
                    .await
                {
                    Err(crate::NodeError::Sync(SyncError::UnknownGroup { .. })) => {
                        warn!(index = self.node.index(), group_id, "no partial message to publish");
                    }
                    other => other?,
                }
            }
            ScriptInstruction::Connect { connect_to } => {
                for &index in connect_to {
                    self.node.transport().connect_to(index).await?;
                    info!(index = self.node.index(), to = index, "connected");
                }
            }
            ScriptInstruction::WaitUntil { elapsed_seconds } => {
                tokio::time::sleep_until(self.start + Duration::from_secs(*elapsed_seconds)).await;
            }
            ScriptInstruction::InitGossipSub { .. } => {
                debug!(index = self.node.index(), "router parameters ignored");
            }
            ScriptInstruction::SubscribeToTopic { topic_id, partial } => {
                debug!(index = self.node.index(), topic = %topic_id, partial, "subscription ignored");
            }
            ScriptInstruction::Publish {
                message_id,
                topic_id,
                ..
            } => {
                debug!(index = self.node.index(), topic = %topic_id, message_id, "full publish ignored");
            }
            ScriptInstruction::SetTopicValidationDelay { topic_id, .. } => {
                debug!(index = self.node.index(), topic = %topic_id, "validation delay ignored");
            }
            ScriptInstruction::IfNodeIdEquals { .. } => {}
        }
        Ok(())
    }
}
