//! Golden wire vectors for deterministic verification.
//!
//! Each vector fills a message with the deterministic counter content, asks
//! for the fragment a peer with the given bitmap should receive, and pins
//! the length and the first and last bytes of the encoding. Any
//! implementation of the fragment format must produce the same bytes.

use partial_gossip_core::{GroupId, PartialMessage, PartialPayload, PartsBitmap};

/// A golden wire vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Group id, read as a big-endian u64.
    pub group_id: u64,
    /// Parts held by the sender.
    pub held: u8,
    /// Parts the receiving peer advertises.
    pub peer: u8,
    /// Expected included bitmap.
    pub included: u8,
    /// Expected encoded length; 0 when nothing is sent.
    pub wire_len: usize,
    /// Expected first 9 bytes (hex): the bitmap and the first counter.
    pub head: &'static str,
    /// Expected last 16 bytes (hex): the last counter and the group id.
    pub tail: &'static str,
}

/// Get all golden wire vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "group 42, parts 0 and 1, empty peer",
            group_id: 42,
            held: 0x03,
            peer: 0x00,
            included: 0x03,
            wire_len: 2057,
            head: "03000000000000002a",
            tail: "0000000000000129000000000000002a",
        },
        GoldenVector {
            name: "group 42, full message, peer holds low half",
            group_id: 42,
            held: 0xff,
            peer: 0x0f,
            included: 0xf0,
            wire_len: 4105,
            head: "f0000000000000022a",
            tail: "0000000000000429000000000000002a",
        },
        GoldenVector {
            name: "max group id wraps the counter",
            group_id: u64::MAX,
            held: 0x01,
            peer: 0x00,
            included: 0x01,
            wire_len: 1033,
            head: "01ffffffffffffffff",
            tail: "000000000000007effffffffffffffff",
        },
        GoldenVector {
            name: "peer already holds everything",
            group_id: 42,
            held: 0x0f,
            peer: 0xff,
            included: 0x00,
            wire_len: 0,
            head: "",
            tail: "",
        },
    ]
}

/// Compute the payload a vector describes.
pub fn encode_vector(vector: &GoldenVector) -> PartialPayload {
    let message = PartialMessage::filled(GroupId::from_u64(vector.group_id), PartsBitmap(vector.held));
    message.payload_for(PartsBitmap(vector.peer))
}

/// Check one vector, describing the first mismatch.
pub fn verify_vector(vector: &GoldenVector) -> Result<(), String> {
    let payload = encode_vector(vector);
    if payload.included != PartsBitmap(vector.included) {
        return Err(format!(
            "{}: included {} != {}",
            vector.name,
            payload.included,
            PartsBitmap(vector.included)
        ));
    }

    let wire = payload.wire.as_deref().unwrap_or_default();
    if wire.len() != vector.wire_len {
        return Err(format!("{}: length {} != {}", vector.name, wire.len(), vector.wire_len));
    }
    if wire.is_empty() {
        return Ok(());
    }

    let head = hex::encode(&wire[..9]);
    if head != vector.head {
        return Err(format!("{}: head {} != {}", vector.name, head, vector.head));
    }
    let tail = hex::encode(&wire[wire.len() - 16..]);
    if tail != vector.tail {
        return Err(format!("{}: tail {} != {}", vector.name, tail, vector.tail));
    }
    Ok(())
}

/// Verify all golden vectors.
pub fn verify_all_vectors() -> Vec<(&'static str, bool)> {
    all_vectors()
        .iter()
        .map(|v| (v.name, verify_vector(v).is_ok()))
        .collect()
}
