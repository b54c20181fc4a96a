//! Proptest generators for property-based testing.

use proptest::prelude::*;

use partial_gossip_core::{GroupId, PartialMessage, PartsBitmap};

/// Generate a random GroupId.
pub fn group_id() -> impl Strategy<Value = GroupId> {
    any::<[u8; 8]>().prop_map(GroupId::from_bytes)
}

/// Generate any availability bitmap.
pub fn parts_bitmap() -> impl Strategy<Value = PartsBitmap> {
    any::<u8>().prop_map(PartsBitmap)
}

/// Generate raw metadata of up to `max_len` bytes.
pub fn metadata(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a message with deterministic content in random slots.
pub fn partial_message() -> impl Strategy<Value = PartialMessage> {
    (group_id(), parts_bitmap()).prop_map(|(group, bits)| PartialMessage::filled(group, bits))
}

/// Parameters for one reconciliation step: what we hold and what a peer
/// advertises for the same group.
#[derive(Debug, Clone)]
pub struct MessageParams {
    pub group_id: GroupId,
    pub held: PartsBitmap,
    pub peer: PartsBitmap,
}

impl MessageParams {
    /// The message we hold.
    pub fn message(&self) -> PartialMessage {
        PartialMessage::filled(self.group_id, self.held)
    }
}

impl Arbitrary for MessageParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (group_id(), parts_bitmap(), parts_bitmap())
            .prop_map(|(group_id, held, peer)| MessageParams {
                group_id,
                held,
                peer,
            })
            .boxed()
    }
}
