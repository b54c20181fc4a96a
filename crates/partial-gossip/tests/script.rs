//! Scripted driver end to end: script files on disk, shared by every node.

use std::io::Write;
use std::time::Duration;

use tokio::time::timeout;

use partial_gossip::{
    load_script, CoordinatorEvent, GroupId, Node, NodeConfig, ScriptRunner, TopicId,
};
use partial_gossip_testkit::fixtures::{init_tracing, TestNetwork, Topology};

const SCRIPT: &str = r#"{
  "script": [
    {"type": "ifNodeIDEquals", "nodeID": 0,
     "instruction": {"type": "connect", "connectTo": [1]}},
    {"type": "ifNodeIDEquals", "nodeID": 0,
     "instruction": {"type": "addPartialMessage", "parts": 15, "topicID": "blocks", "groupID": 42}},
    {"type": "ifNodeIDEquals", "nodeID": 1,
     "instruction": {"type": "addPartialMessage", "parts": 240, "topicID": "blocks", "groupID": 42}},
    {"type": "waitUntil", "elapsedSeconds": 0},
    {"type": "ifNodeIDEquals", "nodeID": 0,
     "instruction": {"type": "publishPartial", "topicID": "blocks", "groupID": 42}},
    {"type": "publishPartial", "topicID": "blocks", "groupID": 7}
  ]
}"#;

fn write_script(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_script_drives_two_nodes_to_completion() {
    init_tracing();
    let file = write_script(SCRIPT);
    let script = load_script(file.path()).unwrap();

    let net = TestNetwork::build(2, Topology::Isolated).await.unwrap();
    let a = Node::spawn(net.transports[0].clone(), &NodeConfig::with_index(0));
    let b = Node::spawn(net.transports[1].clone(), &NodeConfig::with_index(1));
    let mut events = b.subscribe();

    // Node 1 adds its share before node 0 dials and publishes.
    ScriptRunner::new(&b).run(&script).await.unwrap();
    ScriptRunner::new(&a).run(&script).await.unwrap();

    let completed = timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(CoordinatorEvent::Completed { group_id, .. }) = events.recv().await {
                return group_id;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(completed, GroupId::from_u64(42));

    let held = b.get(TopicId::from("blocks"), 42).await.unwrap().unwrap();
    assert!(held.is_complete());

    a.shutdown().await.unwrap();
    b.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_wait_until_counts_from_start() {
    let file = write_script(r#"{"script": [{"type": "waitUntil", "elapsedSeconds": 1}]}"#);
    let script = load_script(file.path()).unwrap();
    let net = TestNetwork::build(1, Topology::Isolated).await.unwrap();
    let node = Node::spawn(net.transports[0].clone(), &NodeConfig::default());

    let runner = ScriptRunner::new(&node);
    let started = std::time::Instant::now();
    runner.run(&script).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(900));

    // Already past the mark: returns at once.
    let started = std::time::Instant::now();
    runner.run(&script).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn test_connect_to_unknown_node_fails() {
    let file = write_script(r#"{"script": [{"type": "connect", "connectTo": [9]}]}"#);
    let script = load_script(file.path()).unwrap();
    let net = TestNetwork::build(1, Topology::Isolated).await.unwrap();
    let node = Node::spawn(net.transports[0].clone(), &NodeConfig::default());

    let err = ScriptRunner::new(&node).run(&script).await.unwrap_err();
    assert!(matches!(
        err,
        partial_gossip::NodeError::Sync(partial_gossip::sync::SyncError::PeerNotConnected(_))
    ));
}

#[tokio::test]
async fn test_pubsub_only_instructions_are_skipped() {
    let file = write_script(
        r#"{"script": [
            {"type": "initGossipSub", "gossipSubParams": {"D": 8}},
            {"type": "subscribeToTopic", "topicID": "blocks", "partial": true},
            {"type": "setTopicValidationDelay", "topicID": "blocks", "delaySeconds": 0.1},
            {"type": "publish", "messageID": 1, "messageSizeBytes": 512, "topicID": "blocks"},
            {"type": "addPartialMessage", "parts": 3, "topicID": "blocks", "groupID": 5}
        ]}"#,
    );
    let script = load_script(file.path()).unwrap();
    let net = TestNetwork::build(1, Topology::Isolated).await.unwrap();
    let node = Node::spawn(net.transports[0].clone(), &NodeConfig::default());

    ScriptRunner::new(&node).run(&script).await.unwrap();
    let held = node.get(TopicId::from("blocks"), 5).await.unwrap().unwrap();
    assert_eq!(held.available_parts().bits(), 3);

    node.shutdown().await.unwrap();
}

#[test]
fn test_load_script_reports_path() {
    let err = load_script("/nonexistent/script.json").unwrap_err();
    assert!(format!("{err}").contains("failed to read script"));

    let file = write_script("{ not json");
    let err = load_script(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse script"));
}
