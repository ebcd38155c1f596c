//! The three notification streams the event dispatcher demultiplexes.

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

/// Identifies which of the node's three notification channels a stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// The sequence-of-events stream: txid add/remove announcements, strictly ordered.
    Sequence,
    /// The raw-transaction stream: serialized transaction bodies, unordered.
    RawTx,
    /// The raw-block stream: serialized confirmed blocks, unordered.
    RawBlock,
}

/// An error reading from a notification stream's transport.
#[derive(Debug, Clone, Error)]
#[error("notification transport error on {kind:?}: {message}")]
pub struct NotificationError {
    /// Which stream the failure occurred on.
    pub kind: StreamKind,
    /// A human-readable description of the transport failure.
    pub message: String,
}

/// A framed byte payload delivered by a notification stream, tagged with the channel it
/// originated on. The dispatcher reconnects the stream and continues on receiving an `Err`;
/// events lost on the wire are recovered by the next periodic resync, so no redelivery guarantee
/// is made here.
pub type NotificationResult = Result<(StreamKind, Bytes), NotificationError>;

/// Subscribes to the node's framed notification channels.
///
/// No backpressure is applied between the transport and the dispatcher: if the dispatcher falls
/// behind, it is the transport's prerogative to drop messages rather than buffer unboundedly.
/// This is documented, not accidental, behavior — see `§4.2` of the design notes.
#[async_trait::async_trait]
pub trait NotificationStream: Send + Sync + 'static {
    /// Subscribes to the given stream kind, returning a channel of framed payloads.
    async fn subscribe(&self, kind: StreamKind) -> mpsc::Receiver<NotificationResult>;
}
