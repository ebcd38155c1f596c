//! The downstream fan-out registry the state machine pushes count updates to.

/// A sink the state machine pushes serialized publication payloads to on every count change.
///
/// The registry that fans these payloads out to external subscribers (websocket clients, a
/// message bus, ...) is not specified here; this trait is the seam between the core and whatever
/// that registry turns out to be.
#[auto_impl::auto_impl(&, Arc)]
pub trait PublishSink: Send + Sync + 'static {
    /// Publishes a UTF-8 encoded JSON payload, e.g. `{"type": "count", "count": 42}`.
    fn publish(&self, payload: Vec<u8>);
}

/// A [`PublishSink`] that discards everything it is given. Useful for tests and for reconcilers
/// run with publication disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublishSink;

impl PublishSink for NoopPublishSink {
    fn publish(&self, _payload: Vec<u8>) {}
}
