//! A [`Connector`] dialing a Bitcoin Core-compatible ZMQ `PUB` socket per stream kind.
//!
//! Bitcoin Core exposes its three notification channels as independent ZMQ `PUB` endpoints
//! (`zmqpubsequence`, `zmqpubrawtx`, `zmqpubrawblock`), each publishing multipart messages of
//! `[topic, body, zmq_sequence]`. This connector subscribes to the topic matching `kind`, and
//! forwards only the `body` frame — the payload the dispatcher already knows how to parse — up
//! through [`ReconnectingNotificationStream`](crate::ReconnectingNotificationStream).
//!
//! `zmq`'s socket API is synchronous, so the receive loop runs on a blocking task rather than the
//! async runtime, matching the usual pattern for wrapping a `Send`-but-not-async C library.

use crate::Connector;
use async_trait::async_trait;
use bytes::Bytes;
use mempool_interfaces::notifications::StreamKind;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::warn;

fn topic(kind: StreamKind) -> &'static str {
    match kind {
        StreamKind::Sequence => "sequence",
        StreamKind::RawTx => "rawtx",
        StreamKind::RawBlock => "rawblock",
    }
}

/// Per-stream-kind ZMQ endpoint addresses, e.g. `tcp://127.0.0.1:28332`.
///
/// Mirrors spec.md §6's `notification_endpoints_per_kind` configuration option: a Bitcoin Core
/// deployment typically publishes each channel on its own port, configured independently in
/// `bitcoin.conf`.
#[derive(Debug, Clone, Default)]
pub struct ZmqEndpoints(HashMap<StreamKindKey, String>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum StreamKindKey {
    Sequence,
    RawTx,
    RawBlock,
}

fn key(kind: StreamKind) -> StreamKindKey {
    match kind {
        StreamKind::Sequence => StreamKindKey::Sequence,
        StreamKind::RawTx => StreamKindKey::RawTx,
        StreamKind::RawBlock => StreamKindKey::RawBlock,
    }
}

impl ZmqEndpoints {
    /// Starts from an empty endpoint map; every [`StreamKind`] must be registered with
    /// [`with_endpoint`](Self::with_endpoint) before the resulting [`ZmqConnector`] is used.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the ZMQ endpoint address to dial for `kind`.
    pub fn with_endpoint(mut self, kind: StreamKind, endpoint: impl Into<String>) -> Self {
        self.0.insert(key(kind), endpoint.into());
        self
    }

    fn get(&self, kind: StreamKind) -> Option<&str> {
        self.0.get(&key(kind)).map(String::as_str)
    }
}

/// A [`Connector`] over the `zmq` crate's `SUB` socket type.
#[derive(Debug, Clone)]
pub struct ZmqConnector {
    endpoints: ZmqEndpoints,
}

impl ZmqConnector {
    /// Creates a connector dialing the endpoints in `endpoints`.
    pub fn new(endpoints: ZmqEndpoints) -> Self {
        Self { endpoints }
    }
}

#[async_trait]
impl Connector for ZmqConnector {
    async fn run(&self, kind: StreamKind, tx: mpsc::Sender<Result<Bytes, String>>) {
        let Some(endpoint) = self.endpoints.get(kind) else {
            let _ = tx.send(Err(format!("no zmq endpoint configured for {kind:?}"))).await;
            return;
        };
        let endpoint = endpoint.to_owned();
        let topic_str = topic(kind);

        let (blocking_tx, mut blocking_rx) = mpsc::channel::<Result<Vec<u8>, String>>(1024);
        let join = tokio::task::spawn_blocking(move || receive_loop(&endpoint, topic_str, blocking_tx));

        while let Some(frame) = blocking_rx.recv().await {
            let mapped = frame.map(Bytes::from);
            if tx.send(mapped).await.is_err() {
                break;
            }
        }

        if let Err(err) = join.await {
            warn!(target: "mempool::net", ?kind, %err, "zmq receive task panicked");
        }
    }
}

/// Runs on a blocking task: opens the `SUB` socket, subscribes to `topic`, and forwards each
/// message's body frame until the socket errors or the channel closes.
fn receive_loop(endpoint: &str, topic: &str, tx: mpsc::Sender<Result<Vec<u8>, String>>) {
    let ctx = zmq::Context::new();
    let socket = match ctx.socket(zmq::SUB) {
        Ok(socket) => socket,
        Err(err) => {
            let _ = tx.blocking_send(Err(format!("failed to create zmq socket: {err}")));
            return;
        }
    };
    if let Err(err) = socket.connect(endpoint) {
        let _ = tx.blocking_send(Err(format!("failed to connect to {endpoint}: {err}")));
        return;
    }
    if let Err(err) = socket.set_subscribe(topic.as_bytes()) {
        let _ = tx.blocking_send(Err(format!("failed to subscribe to {topic}: {err}")));
        return;
    }

    loop {
        let frames = match socket.recv_multipart(0) {
            Ok(frames) => frames,
            Err(err) => {
                let _ = tx.blocking_send(Err(format!("zmq recv failed: {err}")));
                return;
            }
        };
        // [topic, body, zmq-internal-sequence]; only the body is meaningful to the dispatcher.
        let Some(body) = frames.into_iter().nth(1) else {
            let _ = tx.blocking_send(Err("zmq message missing body frame".to_string()));
            continue;
        };
        if tx.blocking_send(Ok(body)).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names_match_bitcoin_core_conventions() {
        assert_eq!(topic(StreamKind::Sequence), "sequence");
        assert_eq!(topic(StreamKind::RawTx), "rawtx");
        assert_eq!(topic(StreamKind::RawBlock), "rawblock");
    }

    #[tokio::test]
    async fn connector_errors_when_endpoint_missing() {
        let connector = ZmqConnector::new(ZmqEndpoints::new());
        let (tx, mut rx) = mpsc::channel(1);
        connector.run(StreamKind::RawTx, tx).await;
        let result = rx.recv().await.expect("a single error message");
        assert!(result.is_err());
    }
}
