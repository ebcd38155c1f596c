//! Initial snapshot load and batched body backfill.
//!
//! Bridges the RPC-backed authoritative view of the mempool into the state machine: the snapshot
//! anchors [`StateMachine::load_snapshot`], and the backfill pass fills in bodies for whatever the
//! snapshot named but the rawtx stream hasn't delivered yet. Everything here runs on the
//! reconciler's own task; the state machine itself never performs I/O (design notes, `§5`).

use crate::{config::MempoolConfig, state::StateMachine};
use mempool_interfaces::{decode::Decoder, rpc::RpcClient};
use mempool_primitives::Txid;
use mempool_tasks::TaskExecutor;
use serde_json::Value;
use std::{str::FromStr, sync::Arc};
use tracing::{info, warn};

/// Runs the initial snapshot-and-backfill reconciliation, retrying the snapshot RPC indefinitely
/// on failure and logging-and-skipping individual backfill batch failures.
pub struct Reconciler<R, D> {
    state: Arc<StateMachine>,
    rpc: Arc<R>,
    decoder: Arc<D>,
    config: MempoolConfig,
    executor: TaskExecutor,
}

impl<R, D> Reconciler<R, D>
where
    R: RpcClient,
    D: Decoder,
{
    /// Creates a reconciler over `rpc` and `decoder`, driven by `config`.
    pub fn new(
        state: Arc<StateMachine>,
        rpc: Arc<R>,
        decoder: Arc<D>,
        config: MempoolConfig,
        executor: TaskExecutor,
    ) -> Self {
        Self { state, rpc, decoder, config, executor }
    }

    /// Runs the full reconciliation to completion: snapshot load, queued-event replay (handled
    /// inside [`StateMachine::load_snapshot`]), then batched backfill. Returns early, leaving
    /// `done` unset, if shutdown is signaled between batches.
    pub async fn run(&self) {
        let snapshot = self.fetch_snapshot_with_retry().await;
        let Some(snapshot) = snapshot else { return };

        info!(
            target: "mempool::reconciler",
            sequence = snapshot.sequence,
            mempool_size = snapshot.txids.len(),
            "loaded mempool snapshot"
        );
        self.state.load_snapshot(snapshot.sequence, snapshot.txids.iter().copied());

        self.backfill(&snapshot.txids).await;
        self.state.mark_done();
        info!(target: "mempool::reconciler", "reconciliation complete");
    }

    /// Requests `getrawmempool` with `mempool_sequence = true`, which returns the node's
    /// authoritative txid set paired with the sequence number that anchors subsequent
    /// sequence-stream events. Retries indefinitely, sleeping
    /// [`MempoolConfig::snapshot_retry_interval`] between attempts, on any RPC failure.
    async fn fetch_snapshot_with_retry(&self) -> Option<Snapshot> {
        loop {
            match self.rpc.request("getrawmempool", Value::Array(vec![Value::Bool(true)])).await {
                Ok(value) => match parse_snapshot(&value) {
                    Ok(snapshot) => return Some(snapshot),
                    Err(err) => {
                        warn!(target: "mempool::reconciler", %err, "malformed mempool snapshot response");
                    }
                },
                Err(err) => {
                    warn!(target: "mempool::reconciler", %err, "snapshot rpc failed, retrying");
                }
            }

            tokio::select! {
                _ = self.executor.on_shutdown() => return None,
                _ = tokio::time::sleep(self.config.snapshot_retry_interval) => {}
            }
        }
    }

    /// Partitions `txids` into fixed-size batches and fetches each via `getrawtransaction`,
    /// sleeping [`MempoolConfig::backfill_batch_interval`] between batches to cap RPC pressure.
    /// Per-item failures leave the entry `Announced`, to be filled by a later resync; a whole
    /// batch's transport failure is logged and the batch skipped. Cancellable between batches.
    async fn backfill(&self, txids: &[Txid]) {
        let mut shutdown = self.executor.on_shutdown();

        for batch in txids.chunks(self.config.backfill_batch_size) {
            let params: Vec<Value> =
                batch.iter().map(|txid| Value::String(txid.to_string())).collect();

            match self.rpc.batch_request("getrawtransaction", params, true).await {
                Ok(results) => self.ingest_backfill_batch(batch, results),
                Err(err) => {
                    self.state.metrics().backfill_batch_failures_total.increment(1);
                    warn!(
                        target: "mempool::reconciler",
                        %err,
                        batch_size = batch.len(),
                        "backfill batch rpc failed, skipping"
                    );
                }
            }

            tokio::select! {
                _ = &mut shutdown => return,
                _ = tokio::time::sleep(self.config.backfill_batch_interval) => {}
            }
        }
    }

    fn ingest_backfill_batch(&self, batch: &[Txid], results: Vec<mempool_interfaces::rpc::BatchItem>) {
        for item in results {
            let Some(&txid) = batch.get(item.id as usize) else { continue };
            // Every named txid is marked `Announced` regardless of whether its body could be
            // fetched; the snapshot already counted it, so `count_it = false` here exactly as
            // it is for the `insert`-bound success path below.
            self.state.register(txid, None, false);
            match item.outcome {
                Ok(value) => self.ingest_backfill_item(txid, value),
                Err(err) => {
                    self.state.metrics().backfill_item_failures_total.increment(1);
                    warn!(target: "mempool::reconciler", %txid, %err, "backfill item failed, leaving Announced");
                }
            }
        }
    }

    fn ingest_backfill_item(&self, txid: Txid, result: Value) {
        let raw = match result.as_str().map(hex::decode) {
            Some(Ok(bytes)) => bytes,
            _ => {
                self.state.metrics().backfill_item_failures_total.increment(1);
                warn!(target: "mempool::reconciler", %txid, "backfill item was not a hex string");
                return;
            }
        };

        match self.decoder.decode_transaction(&raw) {
            Ok(tx) => {
                // `register` already ran in `ingest_backfill_batch` above; `insert` promotes the
                // now-`Announced` entry to `Live`.
                self.state.insert(tx.id, tx);
            }
            Err(err) => {
                self.state.metrics().decode_errors_total.increment(1);
                warn!(target: "mempool::reconciler", %txid, %err, "failed to decode backfilled transaction");
            }
        }
    }
}

struct Snapshot {
    sequence: u64,
    txids: Vec<Txid>,
}

fn parse_snapshot(value: &Value) -> Result<Snapshot, String> {
    let sequence = value
        .get("mempool_sequence")
        .and_then(Value::as_u64)
        .ok_or_else(|| "missing mempool_sequence".to_string())?;
    let txids = value
        .get("txids")
        .and_then(Value::as_array)
        .ok_or_else(|| "missing txids".to_string())?
        .iter()
        .map(|v| {
            v.as_str()
                .ok_or_else(|| "txid entry was not a string".to_string())
                .and_then(|s| Txid::from_str(s).map_err(|e| e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Snapshot { sequence, txids })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::TargetProfile, query::MempoolStatus};
    use mempool_interfaces::{
        decode::DecodeError,
        publish::NoopPublishSink,
        rpc::{BatchItem, RpcError},
    };
    use mempool_primitives::{BlockData, Transaction};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn parses_well_formed_snapshot() {
        let value = serde_json::json!({
            "mempool_sequence": 100,
            "txids": ["00".repeat(32)],
        });
        let snapshot = parse_snapshot(&value).unwrap();
        assert_eq!(snapshot.sequence, 100);
        assert_eq!(snapshot.txids.len(), 1);
    }

    #[test]
    fn rejects_missing_sequence() {
        let value = serde_json::json!({ "txids": [] });
        assert!(parse_snapshot(&value).is_err());
    }

    fn txid_for(index: u32) -> Txid {
        let mut bytes = [0u8; 32];
        bytes[..4].copy_from_slice(&index.to_be_bytes());
        Txid::from_bytes(bytes)
    }

    /// A canned `RpcClient` standing in for a node: serves a fixed snapshot from `request`, and
    /// from `batch_request` echoes each queried txid back as a decodable "raw transaction" (its
    /// own 32 bytes, hex-encoded), except for a configured set of `(call_index, local_index)`
    /// pairs, which fail as if the node returned a per-item error.
    struct FakeRpc {
        snapshot: Value,
        call_count: AtomicUsize,
        failing_call: usize,
        failing_local_indices: Vec<usize>,
    }

    #[async_trait::async_trait]
    impl RpcClient for FakeRpc {
        async fn request(&self, method: &str, _params: Value) -> Result<Value, RpcError> {
            assert_eq!(method, "getrawmempool");
            Ok(self.snapshot.clone())
        }

        async fn batch_request(
            &self,
            method: &str,
            params: Vec<Value>,
            _keyed: bool,
        ) -> Result<Vec<BatchItem>, RpcError> {
            assert_eq!(method, "getrawtransaction");
            let call_index = self.call_count.fetch_add(1, Ordering::SeqCst);

            let results = params
                .iter()
                .enumerate()
                .map(|(local_index, value)| {
                    if call_index == self.failing_call
                        && self.failing_local_indices.contains(&local_index)
                    {
                        return BatchItem {
                            id: local_index as u64,
                            outcome: Err(RpcError::Node { code: -1, message: "boom".into() }),
                        };
                    }
                    let txid: Txid = value.as_str().unwrap().parse().unwrap();
                    let raw = hex::encode(txid.as_bytes());
                    BatchItem { id: local_index as u64, outcome: Ok(Value::String(raw)) }
                })
                .collect();
            Ok(results)
        }
    }

    /// Decodes the fake raw payloads `FakeRpc` hands back: the raw bytes are just the txid.
    struct FakeDecoder;

    impl Decoder for FakeDecoder {
        fn decode_transaction(&self, raw: &[u8]) -> Result<Transaction, DecodeError> {
            if raw.len() != 32 {
                return Err(DecodeError::new("expected a 32-byte fake payload"));
            }
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(raw);
            Ok(Transaction {
                id: Txid::from_bytes(bytes),
                inputs: vec![],
                value: 0,
                fee: 0,
                inflated: bytes::Bytes::new(),
            })
        }

        fn decode_block(&self, _raw: &[u8]) -> Result<BlockData, DecodeError> {
            Err(DecodeError::new("not used by these tests"))
        }
    }

    fn fast_config() -> MempoolConfig {
        MempoolConfig {
            target_profile: TargetProfile::Personal,
            backfill_batch_size: 50,
            backfill_batch_interval: Duration::from_millis(1),
            snapshot_retry_interval: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn batch_backfill_partial_failure_leaves_three_announced() {
        let txids: Vec<Txid> = (0..120).map(txid_for).collect();
        let snapshot = serde_json::json!({
            "mempool_sequence": 100,
            "txids": txids.iter().map(Txid::to_string).collect::<Vec<_>>(),
        });
        // Batch 2 (txids 100..120, since batch 0 is 0..50 and batch 1 is 50..100) is unaffected;
        // the 3 failures land in batch 1 (local indices 5, 10, 20 => global txids 55, 60, 70).
        let rpc = Arc::new(FakeRpc {
            snapshot,
            call_count: AtomicUsize::new(0),
            failing_call: 1,
            failing_local_indices: vec![5, 10, 20],
        });
        let decoder = Arc::new(FakeDecoder);
        let state = Arc::new(StateMachine::new(TargetProfile::Personal, Arc::new(NoopPublishSink)));
        let (executor, _signal) = TaskExecutor::new();
        let reconciler = Reconciler::new(state.clone(), rpc, decoder, fast_config(), executor);

        reconciler.run().await;

        assert!(state.is_done());
        // The snapshot already counted all 120; the 3 unresolved backfill items stay `Announced`
        // (counted but bodyless) rather than changing `count`.
        assert_eq!(state.get_count(), 120);

        let mut live = 0;
        let mut announced = 0;
        for txid in &txids {
            match state.get_status(*txid) {
                MempoolStatus::Live => live += 1,
                MempoolStatus::Announced => announced += 1,
                other => panic!("unexpected status {other:?} for {txid}"),
            }
        }
        assert_eq!(live, 117);
        assert_eq!(announced, 3);
    }

    #[tokio::test]
    async fn run_replays_queued_events_received_before_the_snapshot() {
        let late = txid_for(9001);
        let snapshot = serde_json::json!({
            "mempool_sequence": 100,
            "txids": Vec::<String>::new(),
        });
        let rpc = Arc::new(FakeRpc {
            snapshot,
            call_count: AtomicUsize::new(0),
            failing_call: usize::MAX,
            failing_local_indices: vec![],
        });
        let decoder = Arc::new(FakeDecoder);
        let state = Arc::new(StateMachine::new(TargetProfile::Personal, Arc::new(NoopPublishSink)));

        // Simulates a sequence-stream announce arriving on the dispatcher's own task while the
        // reconciler is still awaiting the snapshot RPC.
        assert!(state.register(late, Some(5), true).is_none());

        let (executor, _signal) = TaskExecutor::new();
        let reconciler = Reconciler::new(state.clone(), rpc, decoder, fast_config(), executor);
        reconciler.run().await;

        assert!(state.is_done());
        // Sequence 5 predates the snapshot's cursor of 100, so the queued announce is discarded
        // rather than resurrected.
        assert_eq!(state.get_status(late), MempoolStatus::New);
        assert_eq!(state.get_count(), 0);
    }
}
