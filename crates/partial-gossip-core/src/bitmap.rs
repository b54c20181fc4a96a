//! Availability bitmaps.
//!
//! Bit `i` of a [`PartsBitmap`] is set iff part `i` is held. On the wire the
//! bitmap travels as one byte of "parts metadata"; [`PartsBitmap::from_metadata`]
//! is the single place that checks the one-byte domain.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use crate::error::{PartialError, Result};
use crate::types::PART_COUNT;

/// One-byte availability bitmap over the [`PART_COUNT`] parts of a message.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartsBitmap(pub u8);

impl PartsBitmap {
    /// No parts. Also the "nothing missing" result of
    /// [`PartialMessage::missing_parts`](crate::PartialMessage::missing_parts).
    pub const EMPTY: Self = Self(0);

    /// All parts.
    pub const FULL: Self = Self(0xff);

    /// Create from the raw byte.
    pub const fn new(bits: u8) -> Self {
        Self(bits)
    }

    /// Bitmap holding only part `index`; empty if `index` is out of range.
    pub const fn single(index: usize) -> Self {
        if index < PART_COUNT {
            Self(1 << index)
        } else {
            Self::EMPTY
        }
    }

    /// Decode one-byte parts metadata.
    pub fn from_metadata(metadata: &[u8]) -> Result<Self> {
        match metadata {
            [bits] => Ok(Self(*bits)),
            _ => Err(PartialError::InvalidMetadataLength(metadata.len())),
        }
    }

    /// Encode as parts metadata.
    pub const fn to_metadata(self) -> [u8; 1] {
        [self.0]
    }

    /// The raw byte.
    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, index: usize) -> bool {
        index < PART_COUNT && self.0 & (1 << index) != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn is_full(self) -> bool {
        self.0 == 0xff
    }

    /// Number of parts in the bitmap.
    pub const fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Parts in `self` that are not in `other`.
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub const fn complement(self) -> Self {
        Self(!self.0)
    }

    /// Fold another peer's advertisement into this view.
    ///
    /// Commutative, associative and idempotent with [`PartsBitmap::EMPTY`]
    /// as identity.
    pub const fn merge(self, other: Self) -> Self {
        self.union(other)
    }

    /// Part indices in ascending order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..PART_COUNT).filter(move |i| self.contains(*i))
    }
}

impl fmt::Debug for PartsBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartsBitmap({:#010b})", self.0)
    }
}

impl fmt::Display for PartsBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

impl From<u8> for PartsBitmap {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl From<PartsBitmap> for u8 {
    fn from(bitmap: PartsBitmap) -> Self {
        bitmap.0
    }
}

impl BitOr for PartsBitmap {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitAnd for PartsBitmap {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl Not for PartsBitmap {
    type Output = Self;

    fn not(self) -> Self {
        self.complement()
    }
}

/// Merge two raw parts metadata buffers.
///
/// Overlapping bytes are OR-ed; the tail of the longer buffer is kept as is.
/// For one-byte metadata this is [`PartsBitmap::merge`]; the slice form lets
/// callers carry metadata wider than a single byte.
pub fn merge_metadata(left: &[u8], right: &[u8]) -> Vec<u8> {
    let (longer, shorter) = if right.len() > left.len() {
        (right, left)
    } else {
        (left, right)
    };
    let mut out = longer.to_vec();
    for (byte, other) in out.iter_mut().zip(shorter) {
        *byte |= other;
    }
    out
}
