//! Multi-node reconciliation over the in-memory network.
//!
//! Every test scatters the parts of one group across nodes, lets each node
//! announce what it holds, and waits for the `Completed` event on every node.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use partial_gossip::sync::Connector;
use partial_gossip::{
    CoordinatorEvent, GroupId, MemoryTransport, Node, NodeConfig, PartsBitmap, TopicId,
};
use partial_gossip_testkit::fixtures::{init_tracing, scatter_parts, TestNetwork, Topology};

const WAIT: Duration = Duration::from_secs(5);

fn spawn_nodes(net: &TestNetwork) -> Vec<Node<MemoryTransport>> {
    net.transports
        .iter()
        .enumerate()
        .map(|(index, transport)| {
            Node::spawn(transport.clone(), &NodeConfig::with_index(index as u32))
        })
        .collect()
}

async fn wait_completed(events: &mut broadcast::Receiver<CoordinatorEvent>, group: u64) {
    let target = GroupId::from_u64(group);
    let result = timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(CoordinatorEvent::Completed { group_id, .. }) if group_id == target => return,
                Ok(_) => {}
                Err(err) => panic!("event stream failed: {err}"),
            }
        }
    })
    .await;
    assert!(result.is_ok(), "group {group} did not complete in time");
}

/// Scatter group `group` across `topology`, announce from every node, and
/// check every node ends up with the whole message.
async fn converge(nodes: u32, topology: Topology, group: u64) {
    init_tracing();
    let net = TestNetwork::build(nodes, topology).await.unwrap();
    let nodes = spawn_nodes(&net);
    let topic = TopicId::from("blocks");
    let shares = scatter_parts(nodes.len());

    let mut subscriptions: Vec<_> = nodes.iter().map(|node| node.subscribe()).collect();

    // Every node holds its share before anyone announces, so no add loses
    // to an earlier inbound fragment.
    for (node, share) in nodes.iter().zip(&shares) {
        assert!(node.add_synthetic(topic.clone(), group, *share).await.unwrap());
    }
    for node in &nodes {
        node.publish(topic.clone(), group, &[]).await.unwrap();
    }

    for (events, share) in subscriptions.iter_mut().zip(&shares) {
        if share.is_full() {
            continue;
        }
        wait_completed(events, group).await;
    }

    for node in &nodes {
        let message = node.get(topic.clone(), group).await.unwrap().unwrap();
        assert!(message.is_complete(), "node {} incomplete", node.index());
    }
    for node in nodes {
        node.shutdown().await.unwrap();
    }
}

#[tokio::test]
async fn test_two_nodes_converge() {
    converge(2, Topology::Line, 42).await;
}

#[tokio::test]
async fn test_line_converges() {
    converge(5, Topology::Line, 7).await;
}

#[tokio::test]
async fn test_full_mesh_converges() {
    converge(4, Topology::Full, 1_000).await;
}

#[tokio::test]
async fn test_star_converges() {
    converge(8, Topology::Star, u64::MAX).await;
}

#[tokio::test]
async fn test_parts_match_fill_content() {
    let net = TestNetwork::build(2, Topology::Line).await.unwrap();
    let nodes = spawn_nodes(&net);
    let topic = TopicId::from("blocks");
    let mut events = nodes[1].subscribe();

    nodes[0]
        .add_synthetic(topic.clone(), 42, PartsBitmap::FULL)
        .await
        .unwrap();
    nodes[0].publish(topic.clone(), 42, &[]).await.unwrap();
    wait_completed(&mut events, 42).await;

    let sent = nodes[0].get(topic.clone(), 42).await.unwrap().unwrap();
    let received = nodes[1].get(topic, 42).await.unwrap().unwrap();
    assert_eq!(sent, received);
}

#[tokio::test]
async fn test_isolated_nodes_do_not_share() {
    let net = TestNetwork::build(2, Topology::Isolated).await.unwrap();
    let nodes = spawn_nodes(&net);
    let topic = TopicId::from("blocks");

    nodes[0]
        .add_synthetic(topic.clone(), 3, PartsBitmap::FULL)
        .await
        .unwrap();
    nodes[0].publish(topic.clone(), 3, &[]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(nodes[1].get(topic, 3).await.unwrap().is_none());
}

#[tokio::test]
async fn test_directed_publish_reaches_only_target() {
    let net = TestNetwork::build(3, Topology::Star).await.unwrap();
    let nodes = spawn_nodes(&net);
    let topic = TopicId::from("blocks");
    let mut events = nodes[2].subscribe();

    nodes[0]
        .add_synthetic(topic.clone(), 9, PartsBitmap(0x0f))
        .await
        .unwrap();
    nodes[0].publish(topic.clone(), 9, &[2]).await.unwrap();

    let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(
        event,
        CoordinatorEvent::Extended {
            topic: topic.clone(),
            group_id: GroupId::from_u64(9),
            available: PartsBitmap(0x0f),
        }
    );
    // Node 2 re-announces only to its own links, which are just node 0.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(nodes[1].get(topic, 9).await.unwrap().is_none());
}

#[tokio::test]
async fn test_late_link_then_reconcile() {
    let net = TestNetwork::build(2, Topology::Isolated).await.unwrap();
    let nodes = spawn_nodes(&net);
    let topic = TopicId::from("blocks");
    let mut events = nodes[0].subscribe();

    nodes[0]
        .add_synthetic(topic.clone(), 5, PartsBitmap(0x55))
        .await
        .unwrap();
    nodes[1]
        .add_synthetic(topic.clone(), 5, PartsBitmap(0xaa))
        .await
        .unwrap();

    nodes[1].transport().connect_to(0).await.unwrap();
    nodes[1].publish(topic.clone(), 5, &[]).await.unwrap();

    wait_completed(&mut events, 5).await;
}
