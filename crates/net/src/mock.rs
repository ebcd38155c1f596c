//! An in-memory [`NotificationStream`] for tests: each stream kind gets its own channel that the
//! test drives directly, with no reconnect logic involved.

use async_trait::async_trait;
use bytes::Bytes;
use mempool_interfaces::notifications::{NotificationResult, NotificationStream, StreamKind};
use std::{collections::HashMap, sync::Mutex};
use tokio::sync::mpsc;

/// Hands out a fixed receiver per [`StreamKind`], fed by a paired [`MockSender`].
#[derive(Default)]
pub struct MockNotificationStream {
    receivers: Mutex<HashMap<u8, mpsc::Receiver<NotificationResult>>>,
}

/// The sending half of a [`MockNotificationStream`] for one stream kind.
#[derive(Debug, Clone)]
pub struct MockSender(mpsc::Sender<NotificationResult>);

impl MockSender {
    /// Delivers a successfully-decoded raw payload.
    pub async fn send(&self, kind: StreamKind, payload: impl Into<Bytes>) {
        let _ = self.0.send(Ok((kind, payload.into()))).await;
    }
}

fn kind_key(kind: StreamKind) -> u8 {
    match kind {
        StreamKind::Sequence => 0,
        StreamKind::RawTx => 1,
        StreamKind::RawBlock => 2,
    }
}

impl MockNotificationStream {
    /// Registers a channel for `kind`, returning the sender half for the test to drive.
    pub fn register(&self, kind: StreamKind) -> MockSender {
        let (tx, rx) = mpsc::channel(1024);
        self.receivers.lock().unwrap().insert(kind_key(kind), rx);
        MockSender(tx)
    }
}

#[async_trait]
impl NotificationStream for MockNotificationStream {
    async fn subscribe(&self, kind: StreamKind) -> mpsc::Receiver<NotificationResult> {
        self.receivers
            .lock()
            .unwrap()
            .remove(&kind_key(kind))
            .expect("subscribe() called before register()")
    }
}
