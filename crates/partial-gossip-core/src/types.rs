//! Strong type definitions for partial messages.
//!
//! Identifiers are newtypes to prevent mixing them up at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of every part in bytes.
pub const PART_LEN: usize = 1024;

/// Number of parts a message is divided into. One bit per part in a
/// [`PartsBitmap`](crate::PartsBitmap).
pub const PART_COUNT: usize = 8;

/// Length of an encoded [`GroupId`].
pub const GROUP_ID_LEN: usize = 8;

/// An 8-byte identifier of one logical message within a topic.
///
/// Stored and transmitted big-endian, so `GroupId::from_u64(42)` encodes as
/// `00 00 00 00 00 00 00 2a`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub [u8; GROUP_ID_LEN]);

impl GroupId {
    /// Create a GroupId from raw bytes.
    pub const fn from_bytes(bytes: [u8; GROUP_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Create a GroupId from its integer value.
    pub const fn from_u64(value: u64) -> Self {
        Self(value.to_be_bytes())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; GROUP_ID_LEN] {
        &self.0
    }

    /// Interpret the identifier as a big-endian integer.
    pub const fn as_u64(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != GROUP_ID_LEN {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; GROUP_ID_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", self.to_hex())
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u64())
    }
}

impl AsRef<[u8]> for GroupId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; GROUP_ID_LEN]> for GroupId {
    fn from(bytes: [u8; GROUP_ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<u64> for GroupId {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl TryFrom<&[u8]> for GroupId {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; GROUP_ID_LEN] = slice.try_into()?;
        Ok(Self(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_id_big_endian() {
        let id = GroupId::from_u64(42);
        assert_eq!(id.as_bytes(), &[0, 0, 0, 0, 0, 0, 0, 42]);
        assert_eq!(id.as_u64(), 42);
    }

    #[test]
    fn test_group_id_hex_roundtrip() {
        let id = GroupId::from_bytes([0xde, 0xad, 0xbe, 0xef, 0, 1, 2, 3]);
        let recovered = GroupId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, recovered);
        assert!(GroupId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_group_id_display_and_debug() {
        let id = GroupId::from_u64(7);
        assert_eq!(format!("{}", id), "7");
        assert_eq!(format!("{:?}", id), "GroupId(0000000000000007)");
    }

    #[test]
    fn test_group_id_try_from_slice() {
        assert!(GroupId::try_from(&[1u8; 8][..]).is_ok());
        assert!(GroupId::try_from(&[1u8; 7][..]).is_err());
    }
}
