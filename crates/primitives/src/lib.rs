#![warn(missing_docs)]
#![deny(unused_must_use, rust_2018_idioms)]

//! Commonly used types for the mempool tracker.
//!
//! This crate is intentionally small: it only carries the data the tracker's core state machine
//! needs to reason about, not the full breadth of the node's wire protocol. Decoding raw
//! transaction and block payloads into these types is the responsibility of an external
//! [`Decoder`](mempool_interfaces::decode::Decoder) implementation; this crate only defines the
//! shapes that decoder produces.

mod txid;
pub use txid::Txid;

mod transaction;
pub use transaction::{OutPoint, Transaction, TxInput};

mod block;
pub use block::BlockData;
