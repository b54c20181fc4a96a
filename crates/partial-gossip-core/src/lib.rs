//! # Partial Gossip Core
//!
//! Pure primitives for partial-message reconciliation: parts, availability
//! bitmaps and the fragment wire codec.
//!
//! This crate contains no I/O, no channels, no networking. It is pure
//! computation over fixed-size fragments.
//!
//! ## Key Types
//!
//! - [`PartialMessage`] - A message held as up to [`PART_COUNT`] write-once parts
//! - [`GroupId`] - 8-byte big-endian identifier of one logical message
//! - [`PartsBitmap`] - One-byte availability bitmap, bit `i` = part `i` held
//!
//! ## Wire Format
//!
//! `included (1 byte) || parts in ascending bit order || group id (8 bytes)`.
//! See the [`wire`] module.

pub mod bitmap;
pub mod error;
pub mod message;
pub mod types;
pub mod wire;

pub use bitmap::{merge_metadata, PartsBitmap};
pub use error::{PartialError, Result};
pub use message::{PartialMessage, PartialPayload};
pub use types::{GroupId, GROUP_ID_LEN, PART_COUNT, PART_LEN};
