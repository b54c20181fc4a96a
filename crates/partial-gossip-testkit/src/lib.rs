//! # Partial Gossip Testkit
//!
//! Testing utilities for partial message reconciliation.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known fragments with expected wire bytes
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Memory networks with common topologies and RPC builders
//!
//! ## Golden Vectors
//!
//! ```rust
//! use partial_gossip_testkit::vectors::{all_vectors, encode_vector};
//!
//! for vector in all_vectors() {
//!     let payload = encode_vector(&vector);
//!     println!("{}: {:?}", vector.name, payload.included);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use partial_gossip_testkit::generators::MessageParams;
//!
//! proptest! {
//!     #[test]
//!     fn fill_is_deterministic(params: MessageParams) {
//!         prop_assert_eq!(params.message(), params.message());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use partial_gossip_testkit::fixtures::{Topology, TestNetwork};
//!
//! async fn example() {
//!     let net = TestNetwork::build(3, Topology::Line).await.unwrap();
//!     assert_eq!(net.transports.len(), 3);
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{init_tracing, TestNetwork, Topology};
pub use generators::MessageParams;
pub use vectors::{all_vectors, encode_vector, verify_all_vectors, GoldenVector};
