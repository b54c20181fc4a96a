//! In-memory store of partial messages, keyed by topic then group.
//!
//! The store is plain data owned by the coordinator task; it has no locking
//! because nothing else ever touches it.

use std::collections::{HashMap, VecDeque};

use partial_gossip_core::{GroupId, PartialMessage};

use crate::messages::TopicId;

/// Messages of a single topic.
#[derive(Debug, Default)]
struct TopicGroups {
    messages: HashMap<GroupId, PartialMessage>,
    /// Insertion order, oldest first. Used for eviction.
    order: VecDeque<GroupId>,
}

/// `topic -> group -> PartialMessage`.
#[derive(Debug, Default)]
pub struct GroupStore {
    topics: HashMap<TopicId, TopicGroups>,
    /// Evict the oldest group of a topic beyond this many. `None` = unbounded.
    max_groups_per_topic: Option<usize>,
}

impl GroupStore {
    /// Create a store. With `max_groups_per_topic` set, inserting a group into
    /// a full topic evicts that topic's oldest group. A limit of zero keeps
    /// one group, so the group just inserted always survives.
    pub fn new(max_groups_per_topic: Option<usize>) -> Self {
        Self {
            topics: HashMap::new(),
            max_groups_per_topic: max_groups_per_topic.map(|limit| limit.max(1)),
        }
    }

    pub fn get(&self, topic: &TopicId, group_id: &GroupId) -> Option<&PartialMessage> {
        self.topics.get(topic)?.messages.get(group_id)
    }

    pub fn contains(&self, topic: &TopicId, group_id: &GroupId) -> bool {
        self.get(topic, group_id).is_some()
    }

    /// Insert `message` unless its group is already present.
    ///
    /// Returns whether the message was inserted.
    pub fn insert_if_absent(&mut self, topic: &TopicId, message: PartialMessage) -> bool {
        if self.contains(topic, message.group_id()) {
            return false;
        }
        self.put(topic, message);
        true
    }

    /// Store `message`, replacing any earlier snapshot of the same group.
    ///
    /// Callers only ever replace a message with a superset of itself.
    pub fn put(&mut self, topic: &TopicId, message: PartialMessage) -> Option<GroupId> {
        let group_id = *message.group_id();
        let groups = self.topics.entry(topic.clone()).or_default();
        if groups.messages.insert(group_id, message).is_some() {
            return None;
        }
        groups.order.push_back(group_id);

        let limit = self.max_groups_per_topic?;
        if groups.order.len() <= limit {
            return None;
        }
        let evicted = groups.order.pop_front()?;
        groups.messages.remove(&evicted);
        Some(evicted)
    }

    /// Number of groups held for `topic`.
    pub fn group_count(&self, topic: &TopicId) -> usize {
        self.topics.get(topic).map_or(0, |groups| groups.messages.len())
    }

    /// Total number of groups across all topics.
    pub fn len(&self) -> usize {
        self.topics.values().map(|groups| groups.messages.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partial_gossip_core::PartsBitmap;

    fn message(group: u64, bits: u8) -> PartialMessage {
        PartialMessage::filled(GroupId::from_u64(group), PartsBitmap(bits))
    }

    #[test]
    fn test_insert_if_absent_first_writer_wins() {
        let mut store = GroupStore::default();
        let topic = TopicId::from("t");

        assert!(store.insert_if_absent(&topic, message(1, 0x01)));
        assert!(!store.insert_if_absent(&topic, message(1, 0xff)));

        let held = store.get(&topic, &GroupId::from_u64(1)).unwrap();
        assert_eq!(held.available_parts(), PartsBitmap(0x01));
    }

    #[test]
    fn test_topics_are_separate() {
        let mut store = GroupStore::default();
        let a = TopicId::from("a");
        let b = TopicId::from("b");

        store.insert_if_absent(&a, message(1, 0x01));
        store.insert_if_absent(&b, message(1, 0x02));

        assert_eq!(store.len(), 2);
        assert_eq!(store.group_count(&a), 1);
        assert_eq!(
            store.get(&b, &GroupId::from_u64(1)).unwrap().available_parts(),
            PartsBitmap(0x02)
        );
        assert!(store.get(&TopicId::from("c"), &GroupId::from_u64(1)).is_none());
    }

    #[test]
    fn test_put_replaces_without_reordering() {
        let mut store = GroupStore::new(Some(2));
        let topic = TopicId::from("t");

        store.put(&topic, message(1, 0x01));
        store.put(&topic, message(2, 0x01));
        // Updating group 1 must not make it the newest.
        assert_eq!(store.put(&topic, message(1, 0x03)), None);

        let evicted = store.put(&topic, message(3, 0x01));
        assert_eq!(evicted, Some(GroupId::from_u64(1)));
        assert_eq!(store.group_count(&topic), 2);
        assert!(!store.contains(&topic, &GroupId::from_u64(1)));
    }

    #[test]
    fn test_zero_limit_keeps_newest() {
        let mut store = GroupStore::new(Some(0));
        let topic = TopicId::from("t");

        assert_eq!(store.put(&topic, message(1, 0x01)), None);
        assert!(store.contains(&topic, &GroupId::from_u64(1)));

        assert_eq!(store.put(&topic, message(2, 0x01)), Some(GroupId::from_u64(1)));
        assert!(store.contains(&topic, &GroupId::from_u64(2)));
        assert_eq!(store.group_count(&topic), 1);
    }

    #[test]
    fn test_unbounded_by_default() {
        let mut store = GroupStore::default();
        let topic = TopicId::from("t");
        for group in 0..100 {
            assert_eq!(store.put(&topic, message(group, 0x01)), None);
        }
        assert_eq!(store.group_count(&topic), 100);
        assert!(!store.is_empty());
    }
}
