//! Wire codec for partial message fragments.
//!
//! ```text
//! +----------+----------------------------------+-----------------+
//! | included |  part_i  for each set bit i      |    group id     |
//! |  1 byte  |  PART_LEN bytes each, ascending  |  8 bytes, BE    |
//! +----------+----------------------------------+-----------------+
//! ```
//!
//! Parts carry no length prefix; their size is fixed by the protocol.

use bytes::{BufMut, Bytes, BytesMut};

use crate::bitmap::PartsBitmap;
use crate::error::{PartialError, Result};
use crate::types::{GroupId, GROUP_ID_LEN, PART_COUNT, PART_LEN};

/// Smallest valid encoding: the included byte plus the group id.
pub const MIN_WIRE_LEN: usize = 1 + GROUP_ID_LEN;

/// Encoded length of a fragment carrying `parts` parts.
pub const fn encoded_len(parts: usize) -> usize {
    MIN_WIRE_LEN + parts * PART_LEN
}

/// A validated view over an encoded fragment.
///
/// Part slices share the input buffer.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Parts present in this fragment.
    pub included: PartsBitmap,
    /// Group the fragment belongs to.
    pub group_id: GroupId,
    parts: Bytes,
}

impl Fragment {
    /// Iterate over `(index, part)` pairs in ascending part order.
    pub fn parts(&self) -> impl Iterator<Item = (usize, Bytes)> + '_ {
        self.included
            .iter()
            .enumerate()
            .map(move |(n, index)| (index, self.parts.slice(n * PART_LEN..(n + 1) * PART_LEN)))
    }
}

/// Decode and fully validate a fragment destined for `expected`.
///
/// Nothing is returned unless the whole buffer is well formed, so callers can
/// apply the result without risking a partial update.
pub fn decode(data: &Bytes, expected: &GroupId) -> Result<Fragment> {
    if data.len() < MIN_WIRE_LEN {
        return Err(PartialError::InvalidLength {
            len: data.len(),
            reason: "shorter than included byte and group id",
        });
    }

    let included = PartsBitmap::new(data[0]);
    let trailer = &data[data.len() - GROUP_ID_LEN..];
    if trailer != expected.as_bytes() {
        return Err(PartialError::GroupMismatch {
            expected: *expected,
            received: trailer.to_vec(),
        });
    }

    let parts = data.slice(1..data.len() - GROUP_ID_LEN);
    if parts.len() % PART_LEN != 0 {
        return Err(PartialError::InvalidLength {
            len: data.len(),
            reason: "part section is not a multiple of the part length",
        });
    }
    if parts.len() != included.count() * PART_LEN {
        return Err(PartialError::InvalidLength {
            len: data.len(),
            reason: "part section does not match the included bitmap",
        });
    }

    Ok(Fragment {
        included,
        group_id: *expected,
        parts,
    })
}

/// Encode the given parts, listed in ascending index order.
///
/// Entries that would not decode back into the same slot are skipped: an
/// index out of range or not above the previous one, or a part that is not
/// exactly [`PART_LEN`] bytes. Returns `None` when there is nothing to send.
pub fn encode<'a, I>(group_id: &GroupId, parts: I) -> Option<Bytes>
where
    I: IntoIterator<Item = (usize, &'a [u8])>,
{
    let mut included = PartsBitmap::EMPTY;
    let mut last = None;
    let mut buf = BytesMut::with_capacity(encoded_len(1));
    buf.put_u8(0);
    for (index, part) in parts {
        if index >= PART_COUNT || part.len() != PART_LEN || last.is_some_and(|l| index <= l) {
            continue;
        }
        last = Some(index);
        included = included.union(PartsBitmap::single(index));
        buf.put_slice(part);
    }
    if included.is_empty() {
        return None;
    }
    buf[0] = included.bits();
    buf.put_slice(group_id.as_bytes());
    Some(buf.freeze())
}
