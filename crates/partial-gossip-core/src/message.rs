//! PartialMessage: a large message held as a fixed set of fragments.
//!
//! A message is split into [`PART_COUNT`] parts of [`PART_LEN`] bytes each.
//! Every slot is write-once: a part is either absent or holds exactly the
//! bytes that first filled it. Merging is therefore idempotent and order
//! independent, which is what lets peers exchange fragments in any order.

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::bitmap::PartsBitmap;
use crate::error::Result;
use crate::types::{GroupId, PART_COUNT, PART_LEN};
use crate::wire;

/// Number of big-endian u64 counters in one part.
const COUNTERS_PER_PART: u64 = (PART_LEN / 8) as u64;

/// A message known only in part.
///
/// Cloning is cheap: parts are reference-counted [`Bytes`] that are never
/// mutated once set.
#[derive(Clone, PartialEq, Eq)]
pub struct PartialMessage {
    group_id: GroupId,
    parts: [Option<Bytes>; PART_COUNT],
}

/// Outcome of [`PartialMessage::partial_message_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialPayload {
    /// Encoded fragment, or `None` when there is nothing to send.
    pub wire: Option<Bytes>,
    /// Parts carried by `wire`.
    pub included: PartsBitmap,
    /// Parts the peer lacks that we could not supply either.
    pub remaining: PartsBitmap,
}

impl PartialMessage {
    /// Create an empty message for `group_id`.
    pub fn new(group_id: GroupId) -> Self {
        Self {
            group_id,
            parts: Default::default(),
        }
    }

    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    /// Read-only access to part `index`, if held.
    pub fn part(&self, index: usize) -> Option<&Bytes> {
        self.parts.get(index).and_then(Option::as_ref)
    }

    /// Bitmap of the parts we hold.
    pub fn available_parts(&self) -> PartsBitmap {
        self.parts
            .iter()
            .enumerate()
            .filter(|(_, part)| part.is_some())
            .fold(PartsBitmap::EMPTY, |acc, (i, _)| acc.union(PartsBitmap::single(i)))
    }

    /// Bitmap of the parts we lack. Empty once the message is complete.
    pub fn missing_parts(&self) -> PartsBitmap {
        self.available_parts().complement()
    }

    pub fn is_complete(&self) -> bool {
        self.available_parts().is_full()
    }

    /// Merge an encoded fragment into this message.
    ///
    /// The buffer is validated in full before any slot is touched; on error the
    /// message is unchanged. Parts we already hold are skipped, so applying
    /// the same buffer twice has the same effect as applying it once.
    pub fn extend(&mut self, data: &Bytes) -> Result<()> {
        let fragment = wire::decode(data, &self.group_id)?;
        for (index, part) in fragment.parts() {
            let slot = &mut self.parts[index];
            if slot.is_none() {
                *slot = Some(part);
            }
        }
        Ok(())
    }

    /// Build the fragment a peer advertising `peer_metadata` is missing.
    ///
    /// Only parts we hold and the peer does not are included. When no part
    /// qualifies, `wire` is `None` rather than an empty fragment.
    pub fn partial_message_bytes(&self, peer_metadata: &[u8]) -> Result<PartialPayload> {
        let peer = PartsBitmap::from_metadata(peer_metadata)?;
        Ok(self.payload_for(peer))
    }

    /// Typed form of [`partial_message_bytes`](Self::partial_message_bytes).
    pub fn payload_for(&self, peer: PartsBitmap) -> PartialPayload {
        let requested = peer.complement();
        let included = self.available_parts().intersection(requested);
        let wire = wire::encode(
            &self.group_id,
            included
                .iter()
                .filter_map(|i| self.part(i).map(|part| (i, &part[..]))),
        );
        PartialPayload {
            wire,
            included,
            remaining: requested.difference(included),
        }
    }

    /// Whether `peer` advertises at least one part we lack.
    pub fn should_request(&self, peer: PartsBitmap) -> bool {
        !self.missing_parts().intersection(peer).is_empty()
    }

    /// Fill the empty slots named by `bitmap` with deterministic content.
    ///
    /// The group id is read as a big-endian counter start; part `i` holds the
    /// 128 consecutive big-endian u64 values beginning at `start + i * 128`.
    /// Used to build reproducible fixtures on every node of a test network.
    pub fn fill_parts(&mut self, bitmap: PartsBitmap) {
        let start = self.group_id.as_u64();
        for index in bitmap.iter() {
            if self.parts[index].is_some() {
                continue;
            }
            let mut counter = start.wrapping_add(index as u64 * COUNTERS_PER_PART);
            let mut part = BytesMut::with_capacity(PART_LEN);
            for _ in 0..COUNTERS_PER_PART {
                part.put_u64(counter);
                counter = counter.wrapping_add(1);
            }
            self.parts[index] = Some(part.freeze());
        }
    }

    /// A message for `group_id` pre-filled with `bitmap`.
    pub fn filled(group_id: GroupId, bitmap: PartsBitmap) -> Self {
        let mut message = Self::new(group_id);
        message.fill_parts(bitmap);
        message
    }
}

impl fmt::Debug for PartialMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialMessage")
            .field("group_id", &self.group_id)
            .field("available", &self.available_parts())
            .finish()
    }
}
