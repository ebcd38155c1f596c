#![warn(missing_docs)]
#![deny(unused_must_use, rust_2018_idioms)]

//! Reconnecting notification-stream transport.
//!
//! The reconnect-on-error policy and the framing onto [`StreamKind`]-tagged channels that the
//! event dispatcher consumes lives here, generic over a [`Connector`] that actually opens the
//! socket; [`zmq::ZmqConnector`] is the concrete instance dialing a Bitcoin Core node's ZMQ `PUB`
//! endpoints, but any other transport (a unix socket, a long-poll HTTP stream, ...) plugs in the
//! same way.

pub mod mock;
pub mod zmq;

use async_trait::async_trait;
use bytes::Bytes;
use mempool_interfaces::notifications::{
    NotificationError, NotificationResult, NotificationStream, StreamKind,
};
use mempool_tasks::TaskExecutor;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Opens a single raw connection to the node's notification endpoint for one stream kind.
///
/// A real implementation dials the configured ZMQ/unix-socket endpoint; this crate only drives
/// the reconnect loop around whatever `Connector` is plugged in.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connects and yields raw payloads until the connection drops or errors.
    ///
    /// Each yielded item is handed to the dispatcher unmodified; framing/deframing of the node's
    /// wire protocol happens inside the connector, not here.
    async fn run(&self, kind: StreamKind, tx: mpsc::Sender<Result<Bytes, String>>);
}

/// A [`NotificationStream`] that reconnects a [`Connector`] with a fixed backoff whenever it
/// returns.
#[derive(Debug, Clone)]
pub struct ReconnectingNotificationStream<C> {
    connector: std::sync::Arc<C>,
    executor: TaskExecutor,
    backoff: Duration,
    buffer: usize,
}

impl<C: Connector> ReconnectingNotificationStream<C> {
    /// Creates a new reconnecting stream driven by `connector`, spawning its reconnect loops on
    /// `executor`.
    pub fn new(connector: C, executor: TaskExecutor) -> Self {
        Self {
            connector: std::sync::Arc::new(connector),
            executor,
            backoff: Duration::from_secs(1),
            buffer: 1024,
        }
    }

    /// Overrides the default 1-second reconnect backoff.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

#[async_trait]
impl<C: Connector> NotificationStream for ReconnectingNotificationStream<C> {
    async fn subscribe(&self, kind: StreamKind) -> mpsc::Receiver<NotificationResult> {
        let (out_tx, out_rx) = mpsc::channel(self.buffer);
        let connector = self.connector.clone();
        let backoff = self.backoff;
        let buffer = self.buffer;
        let mut shutdown = self.executor.on_shutdown();

        self.executor.spawn_critical("notification-stream", async move {
            loop {
                let (raw_tx, mut raw_rx) = mpsc::channel(buffer);
                let run = connector.run(kind, raw_tx);
                tokio::pin!(run);

                loop {
                    tokio::select! {
                        biased;
                        _ = &mut shutdown => return,
                        _ = &mut run => break,
                        maybe = raw_rx.recv() => {
                            match maybe {
                                Some(Ok(bytes)) => {
                                    if out_tx.send(Ok((kind, bytes))).await.is_err() {
                                        return;
                                    }
                                }
                                Some(Err(message)) => {
                                    warn!(target: "mempool::net", ?kind, %message, "notification transport error");
                                    if out_tx
                                        .send(Err(NotificationError { kind, message }))
                                        .await
                                        .is_err()
                                    {
                                        return;
                                    }
                                }
                                None => break,
                            }
                        }
                    }
                }

                debug!(target: "mempool::net", ?kind, backoff_ms = backoff.as_millis(), "reconnecting notification stream");
                tokio::select! {
                    _ = &mut shutdown => return,
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        });

        out_rx
    }
}
