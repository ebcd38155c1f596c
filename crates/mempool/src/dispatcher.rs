//! Demultiplexes the three notification streams onto [`StateMachine`] transitions.
//!
//! Rawtx and rawblock messages have no ordering relationship with each other or with the sequence
//! stream, so each stream kind gets its own task reading its own channel; nothing here imposes an
//! ordering across tasks beyond what the node's own streams already guarantee within themselves.
//! No backpressure is applied back to the transport: a task that falls behind simply processes
//! whatever its channel hands it next, and messages lost on the wire are recovered by the next
//! periodic resync (see [`crate::reconciler`]).

use crate::state::StateMachine;
use bytes::Bytes;
use mempool_interfaces::{
    decode::Decoder,
    notifications::{NotificationStream, StreamKind},
};
use mempool_primitives::Txid;
use mempool_tasks::TaskExecutor;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// A single sequence-stream event: an add or a remove, tagged with the node's mempool sequence
/// number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SequenceEvent {
    /// `A`: txid added to the mempool.
    Add { txid: Txid, seq: u64 },
    /// `R`: txid removed from the mempool.
    Remove { txid: Txid, seq: u64 },
}

/// An error parsing a sequence-stream payload.
#[derive(Debug, Clone, Error)]
#[error("malformed sequence-stream payload: {0}")]
pub(crate) struct SequenceParseError(String);

/// Parses a sequence-stream payload: a 32-byte txid, a one-byte label (`'A'` or `'R'`; block
/// connect/disconnect labels `'C'`/`'D'` are recognized and ignored, since the tracker only acts
/// on mempool add/remove), and, for `'A'`/`'R'`, an 8-byte little-endian mempool sequence number.
pub(crate) fn parse_sequence_message(raw: &[u8]) -> Result<Option<SequenceEvent>, SequenceParseError> {
    if raw.len() < 33 {
        return Err(SequenceParseError(format!("payload too short: {} bytes", raw.len())));
    }
    let mut txid_bytes = [0u8; 32];
    txid_bytes.copy_from_slice(&raw[..32]);
    let txid = Txid::from_bytes(txid_bytes);
    let label = raw[32];

    match label {
        b'A' | b'R' => {
            if raw.len() < 41 {
                return Err(SequenceParseError(format!(
                    "{} payload missing sequence number",
                    label as char
                )));
            }
            let mut seq_bytes = [0u8; 8];
            seq_bytes.copy_from_slice(&raw[33..41]);
            let seq = u64::from_le_bytes(seq_bytes);
            Ok(Some(if label == b'A' {
                SequenceEvent::Add { txid, seq }
            } else {
                SequenceEvent::Remove { txid, seq }
            }))
        }
        b'C' | b'D' => Ok(None),
        other => Err(SequenceParseError(format!("unrecognized label {other:#x}"))),
    }
}

/// Consumes the three notification streams and drives the [`StateMachine`] accordingly.
pub struct EventDispatcher<N, D> {
    state: Arc<StateMachine>,
    notifications: Arc<N>,
    decoder: Arc<D>,
    executor: TaskExecutor,
}

impl<N, D> EventDispatcher<N, D>
where
    N: NotificationStream,
    D: Decoder,
{
    /// Creates a dispatcher over `notifications` and `decoder`, ready to [`spawn`](Self::spawn).
    pub fn new(state: Arc<StateMachine>, notifications: Arc<N>, decoder: Arc<D>, executor: TaskExecutor) -> Self {
        Self { state, notifications, decoder, executor }
    }

    /// Subscribes to all three stream kinds and spawns one task per kind on the executor.
    pub async fn spawn(&self) {
        self.spawn_sequence().await;
        self.spawn_rawtx().await;
        self.spawn_rawblock().await;
    }

    async fn spawn_sequence(&self) {
        let mut rx = self.notifications.subscribe(StreamKind::Sequence).await;
        let state = self.state.clone();
        let mut shutdown = self.executor.on_shutdown();

        self.executor.spawn_critical("dispatcher-sequence", async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => return,
                    message = rx.recv() => {
                        let Some(message) = message else { return };
                        handle_sequence_message(&state, message);
                    }
                }
            }
        });
    }

    async fn spawn_rawtx(&self) {
        let mut rx = self.notifications.subscribe(StreamKind::RawTx).await;
        let state = self.state.clone();
        let decoder = self.decoder.clone();
        let mut shutdown = self.executor.on_shutdown();

        self.executor.spawn_critical("dispatcher-rawtx", async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => return,
                    message = rx.recv() => {
                        let Some(message) = message else { return };
                        handle_rawtx_message(&state, decoder.as_ref(), message);
                    }
                }
            }
        });
    }

    async fn spawn_rawblock(&self) {
        let mut rx = self.notifications.subscribe(StreamKind::RawBlock).await;
        let state = self.state.clone();
        let decoder = self.decoder.clone();
        let mut shutdown = self.executor.on_shutdown();

        self.executor.spawn_critical("dispatcher-rawblock", async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => return,
                    message = rx.recv() => {
                        let Some(message) = message else { return };
                        handle_rawblock_message(&state, decoder.as_ref(), message);
                    }
                }
            }
        });
    }
}

fn handle_sequence_message(
    state: &StateMachine,
    message: mempool_interfaces::notifications::NotificationResult,
) {
    let (_, raw) = match message {
        Ok(pair) => pair,
        Err(err) => {
            warn!(target: "mempool::dispatcher", %err, "sequence stream transport error");
            return;
        }
    };

    match parse_sequence_message(&raw) {
        Ok(Some(SequenceEvent::Add { txid, seq })) => {
            if state.register(txid, Some(seq), true).is_some() {
                state.publish_count();
            }
        }
        Ok(Some(SequenceEvent::Remove { txid, .. })) => {
            if state.drop_tx(txid) {
                state.publish_count();
            }
        }
        Ok(None) => {}
        Err(err) => {
            warn!(target: "mempool::dispatcher", %err, "discarding malformed sequence message");
        }
    }
}

fn handle_rawtx_message(
    state: &StateMachine,
    decoder: &impl Decoder,
    message: mempool_interfaces::notifications::NotificationResult,
) {
    let (_, raw) = match message {
        Ok(pair) => pair,
        Err(err) => {
            warn!(target: "mempool::dispatcher", %err, "rawtx stream transport error");
            return;
        }
    };

    match decoder.decode_transaction(&raw) {
        Ok(tx) => {
            let txid = tx.id;
            if state.insert(txid, tx).is_some() {
                state.publish_count();
            }
        }
        Err(err) => {
            state.metrics().decode_errors_total.increment(1);
            debug!(target: "mempool::dispatcher", %err, "failed to decode rawtx payload");
        }
    }
}

fn handle_rawblock_message(
    state: &StateMachine,
    decoder: &impl Decoder,
    message: mempool_interfaces::notifications::NotificationResult,
) {
    let (_, raw) = match message {
        Ok(pair) => pair,
        Err(err) => {
            warn!(target: "mempool::dispatcher", %err, "rawblock stream transport error");
            return;
        }
    };

    match decoder.decode_block(&raw) {
        Ok(block) => state.apply_block(block),
        Err(err) => {
            state.metrics().decode_errors_total.increment(1);
            debug!(target: "mempool::dispatcher", %err, "failed to decode rawblock payload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq_payload(txid: [u8; 32], label: u8, seq: u64) -> Bytes {
        let mut out = Vec::with_capacity(41);
        out.extend_from_slice(&txid);
        out.push(label);
        out.extend_from_slice(&seq.to_le_bytes());
        Bytes::from(out)
    }

    #[test]
    fn parses_add_and_remove() {
        let txid = [7u8; 32];
        let add = parse_sequence_message(&seq_payload(txid, b'A', 42)).unwrap();
        assert_eq!(add, Some(SequenceEvent::Add { txid: Txid::from_bytes(txid), seq: 42 }));

        let remove = parse_sequence_message(&seq_payload(txid, b'R', 43)).unwrap();
        assert_eq!(remove, Some(SequenceEvent::Remove { txid: Txid::from_bytes(txid), seq: 43 }));
    }

    #[test]
    fn block_connect_and_disconnect_labels_are_ignored() {
        let txid = [9u8; 32];
        let mut connect = Vec::new();
        connect.extend_from_slice(&txid);
        connect.push(b'C');
        connect.extend_from_slice(&0u64.to_le_bytes());
        assert_eq!(parse_sequence_message(&connect).unwrap(), None);
    }

    #[test]
    fn rejects_short_payloads() {
        assert!(parse_sequence_message(&[0u8; 10]).is_err());
    }

    #[test]
    fn rejects_unknown_label() {
        let txid = [1u8; 32];
        let mut payload = Vec::new();
        payload.extend_from_slice(&txid);
        payload.push(b'Z');
        payload.extend_from_slice(&0u64.to_le_bytes());
        assert!(parse_sequence_message(&payload).is_err());
    }

    /// Decodes the fake rawtx/rawblock payloads used below: rawtx's payload is just the 32-byte
    /// txid, rawblock's is a concatenation of 32-byte txids.
    struct FakeDecoder;

    impl Decoder for FakeDecoder {
        fn decode_transaction(
            &self,
            raw: &[u8],
        ) -> Result<mempool_primitives::Transaction, mempool_interfaces::decode::DecodeError> {
            if raw.len() != 32 {
                return Err(mempool_interfaces::decode::DecodeError::new("expected a 32-byte txid"));
            }
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(raw);
            Ok(mempool_primitives::Transaction {
                id: Txid::from_bytes(bytes),
                inputs: vec![],
                value: 0,
                fee: 0,
                inflated: Bytes::new(),
            })
        }

        fn decode_block(
            &self,
            raw: &[u8],
        ) -> Result<mempool_primitives::BlockData, mempool_interfaces::decode::DecodeError> {
            if raw.len() % 32 != 0 {
                return Err(mempool_interfaces::decode::DecodeError::new("misaligned block payload"));
            }
            let txns = raw
                .chunks(32)
                .map(|chunk| {
                    let mut bytes = [0u8; 32];
                    bytes.copy_from_slice(chunk);
                    Txid::from_bytes(bytes)
                })
                .collect();
            Ok(mempool_primitives::BlockData { txns })
        }
    }

    /// Exercises [`EventDispatcher::spawn`] end to end through a real
    /// [`mempool_net::mock::MockNotificationStream`]: each stream kind's spawned task reads off
    /// its channel and drives a live [`StateMachine`] exactly as the three `handle_*_message`
    /// functions above do individually.
    #[tokio::test]
    async fn spawn_wires_notification_stream_to_state_machine() {
        use crate::config::TargetProfile;
        use crate::query::MempoolStatus;
        use mempool_interfaces::publish::NoopPublishSink;
        use mempool_net::mock::MockNotificationStream;

        let notifications = Arc::new(MockNotificationStream::default());
        let sequence_tx = notifications.register(StreamKind::Sequence);
        let rawtx_tx = notifications.register(StreamKind::RawTx);
        let rawblock_tx = notifications.register(StreamKind::RawBlock);

        let state = Arc::new(StateMachine::new(TargetProfile::Personal, Arc::new(NoopPublishSink)));
        let decoder = Arc::new(FakeDecoder);
        let (executor, _signal) = TaskExecutor::new();
        let dispatcher = EventDispatcher::new(state.clone(), notifications, decoder, executor);
        dispatcher.spawn().await;

        let added = Txid::from_bytes([1u8; 32]);
        let confirmed = Txid::from_bytes([2u8; 32]);

        sequence_tx.send(StreamKind::Sequence, seq_payload(*added.as_bytes(), b'A', 1)).await;
        sequence_tx.send(StreamKind::Sequence, seq_payload(*confirmed.as_bytes(), b'A', 2)).await;
        rawtx_tx.send(StreamKind::RawTx, Bytes::copy_from_slice(added.as_bytes())).await;

        // Give the spawned tasks a chance to drain the channels before asserting.
        for _ in 0..50 {
            if state.get_status(added) == MempoolStatus::Live
                && state.get_status(confirmed) == MempoolStatus::Announced
            {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(state.get_status(added), MempoolStatus::Live);
        assert_eq!(state.get_status(confirmed), MempoolStatus::Announced);
        assert_eq!(state.get_count(), 2);

        rawblock_tx.send(StreamKind::RawBlock, Bytes::copy_from_slice(confirmed.as_bytes())).await;
        for _ in 0..50 {
            if state.get_status(confirmed) == MempoolStatus::Dropped {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(state.get_status(confirmed), MempoolStatus::Dropped);
        assert_eq!(state.get_count(), 1);
    }
}
