#![warn(missing_docs)]
#![deny(unused_must_use, rust_2018_idioms)]

//! Traits describing the external collaborators the mempool core consumes.
//!
//! The core never talks to a socket, a node process, or a consensus-encoding library directly.
//! Instead it is generic over the traits in this crate, so that transport, RPC, and decoding
//! concerns can be swapped, mocked, or tested independently of the state machine that fuses their
//! output into a coherent view of the mempool.

pub mod decode;
pub mod notifications;
pub mod publish;
pub mod rpc;

pub use decode::Decoder;
pub use notifications::{NotificationStream, StreamKind};
pub use publish::PublishSink;
pub use rpc::RpcClient;
