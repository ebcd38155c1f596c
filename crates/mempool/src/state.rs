//! The per-txid lifecycle state machine.
//!
//! This is the single writer of [`Indices`]; every other component in the crate either calls into
//! one of [`register`](StateMachine::register), [`insert`](StateMachine::insert),
//! [`drop_tx`](StateMachine::drop_tx), or [`apply_block`](StateMachine::apply_block), or reads
//! committed state through [`StateMachine::get_count`]/[`get_status`](StateMachine::get_status)/
//! [`lookup_spend`](StateMachine::lookup_spend).
//!
//! Mutating calls are serialized by a single coarse [`parking_lot::Mutex`] guarding the scalar
//! fields (`sequence_cursor`, `count`, `queue`, `done`); this is the "coarse mutex" option the
//! design notes call out as conformant (the alternative being a dedicated single-writer task
//! consuming a command channel). Holding the lock across the keyed-index mutations as well as the
//! scalars keeps every transition atomic with respect to every other transition, including the
//! block-confirmation pass, without needing a second, separately-reasoned-about lock for the
//! block-vs-drop race the design notes describe.

use crate::{config::TargetProfile, entry::MempoolEntry, indices::Indices};
use dashmap::mapref::entry::Entry;
use mempool_interfaces::publish::PublishSink;
use mempool_metrics::MempoolMetrics;
use mempool_primitives::{BlockData, OutPoint, Transaction, Txid};
use parking_lot::Mutex;
use std::sync::Arc;

/// An announce/remove event received before the initial snapshot loaded, buffered for replay.
#[derive(Debug, Clone)]
pub(crate) enum QueuedEvent {
    Announce { txid: Txid, seq: Option<u64> },
    Remove { txid: Txid },
}

#[derive(Default)]
pub(crate) struct Scalars {
    /// Last-seen sequence number from the authoritative snapshot. `None` means the snapshot has
    /// not loaded yet, replacing the source's sentinel integer with an idiomatic `Option`.
    pub(crate) sequence_cursor: Option<u64>,
    /// Number of `Live` entries. Maintained in lock-step with every transition that adds to or
    /// removes from the `Live` set.
    pub(crate) count: i64,
    /// Announce/remove events received before `sequence_cursor` is known.
    pub(crate) queue: Vec<QueuedEvent>,
    /// Whether the initial snapshot and backfill have both completed.
    pub(crate) done: bool,
}

/// The mempool tracker's core: four keyed indices plus the scalars that anchor them, mutated only
/// through the transitions below.
pub struct StateMachine {
    pub(crate) indices: Arc<Indices>,
    metrics: MempoolMetrics,
    publish: Arc<dyn PublishSink>,
    profile: TargetProfile,
    scalars: Mutex<Scalars>,
}

impl StateMachine {
    /// Creates a fresh tracker. Tests instantiate one of these directly rather than reaching for
    /// a process-wide singleton.
    pub fn new(profile: TargetProfile, publish: Arc<dyn PublishSink>) -> Self {
        Self {
            indices: Arc::new(Indices::default()),
            metrics: MempoolMetrics::default(),
            publish,
            profile,
            scalars: Mutex::new(Scalars::default()),
        }
    }

    /// A read-only handle to the indices, for components that only ever query.
    pub(crate) fn indices(&self) -> &Arc<Indices> {
        &self.indices
    }

    pub(crate) fn metrics(&self) -> &MempoolMetrics {
        &self.metrics
    }

    pub(crate) fn publish_sink(&self) -> &Arc<dyn PublishSink> {
        &self.publish
    }

    /// Whether the snapshot has loaded and the backfill has finished.
    pub fn is_done(&self) -> bool {
        self.scalars.lock().done
    }

    /// Called on sequence-stream `A`.
    ///
    /// Returns the decoded body and the post-transition count when a `Bodied` entry was just
    /// promoted to `Live`, so the caller can publish the count change; `None` otherwise.
    pub fn register(&self, txid: Txid, seq: Option<u64>, count_it: bool) -> Option<(Transaction, i64)> {
        let mut scalars = self.scalars.lock();
        self.register_locked(&mut scalars, txid, seq, count_it)
    }

    fn register_locked(
        &self,
        scalars: &mut Scalars,
        txid: Txid,
        seq: Option<u64>,
        count_it: bool,
    ) -> Option<(Transaction, i64)> {
        let Some(cursor) = scalars.sequence_cursor else {
            scalars.queue.push(QueuedEvent::Announce { txid, seq });
            return None;
        };
        if let Some(seq) = seq {
            if seq < cursor {
                // Already accounted for by the snapshot.
                return None;
            }
        }
        if self.indices.is_confirmed(&txid) {
            return None;
        }

        match self.indices.mempool.entry(txid) {
            Entry::Vacant(v) => {
                v.insert(MempoolEntry::Announced);
                self.indices.sync_set.remove(&txid);
                if count_it {
                    scalars.count += 1;
                }
                self.metrics.registered_total.increment(1);
                None
            }
            Entry::Occupied(mut o) => match o.get() {
                MempoolEntry::Bodied(tx) => {
                    let tx = tx.clone();
                    let inputs = spend_inputs(&tx);
                    if self.profile.spend_index_enabled() {
                        self.indices.cache_spends(txid, &inputs);
                    }
                    o.insert(MempoolEntry::Live {
                        inputs,
                        total_in: tx.total_in(),
                        inflated: tx.inflated.clone(),
                    });
                    self.indices.sync_set.remove(&txid);
                    if count_it {
                        scalars.count += 1;
                    }
                    self.metrics.registered_total.increment(1);
                    Some((tx, scalars.count))
                }
                // Announced, Live, Dropped: already registered, or a tombstone that must not be
                // resurrected by a duplicate announce.
                _ => None,
            },
        }
    }

    /// Called on raw-transaction decode.
    ///
    /// Returns the post-transition count when an `Announced` entry was just promoted to `Live`,
    /// so the caller can publish; `None` otherwise.
    pub fn insert(&self, txid: Txid, tx: Transaction) -> Option<i64> {
        let mut scalars = self.scalars.lock();
        self.insert_locked(&mut scalars, txid, tx)
    }

    fn insert_locked(&self, scalars: &mut Scalars, txid: Txid, tx: Transaction) -> Option<i64> {
        let confirmed = self.indices.is_confirmed(&txid);

        match self.indices.mempool.entry(txid) {
            Entry::Vacant(v) => {
                if !confirmed {
                    v.insert(MempoolEntry::Bodied(tx));
                }
                // Confirmed: discard without ever materializing an entry for it.
                None
            }
            Entry::Occupied(mut o) => match o.get() {
                MempoolEntry::Announced if confirmed => {
                    // Late rawtx for an already-confirmed transaction.
                    None
                }
                MempoolEntry::Announced => {
                    let inputs = spend_inputs(&tx);
                    if self.profile.spend_index_enabled() {
                        self.indices.cache_spends(txid, &inputs);
                    }
                    o.insert(MempoolEntry::Live {
                        inputs,
                        total_in: tx.total_in(),
                        inflated: tx.inflated.clone(),
                    });
                    self.metrics.inserted_total.increment(1);
                    Some(scalars.count)
                }
                MempoolEntry::Dropped => {
                    o.remove();
                    None
                }
                // Live, Bodied: duplicate body.
                MempoolEntry::Live { .. } | MempoolEntry::Bodied(_) => None,
            },
        }
    }

    /// Called on sequence-stream `R`.
    ///
    /// Mirrors [`register`](Self::register): before the snapshot loads, the removal is buffered
    /// on `queue` for replay in receipt order rather than acted on immediately (§4.3's invariant
    /// that "every announce/remove received before `sequence_cursor` is known is deferred"). Block
    /// confirmations go through [`apply_block`](Self::apply_block), which calls the unconditional
    /// `drop_locked` directly and must never be deferred this way.
    ///
    /// Returns whether the drop changed `count`.
    pub fn drop_tx(&self, txid: Txid) -> bool {
        let mut scalars = self.scalars.lock();
        if scalars.sequence_cursor.is_none() {
            scalars.queue.push(QueuedEvent::Remove { txid });
            return false;
        }
        self.drop_locked(&mut scalars, txid)
    }

    fn drop_locked(&self, scalars: &mut Scalars, txid: Txid) -> bool {
        let was_pending_backfill = self.indices.sync_set.remove(&txid).is_some();

        match self.indices.mempool.entry(txid) {
            Entry::Vacant(v) => {
                if was_pending_backfill {
                    v.insert(MempoolEntry::Dropped);
                    scalars.count -= 1;
                    self.metrics.dropped_total.increment(1);
                    true
                } else {
                    false
                }
            }
            Entry::Occupied(mut o) => match o.get() {
                MempoolEntry::Announced => {
                    // Decremented unconditionally, matching the source this tracker is modeled
                    // on: if `register` admitted this txid with `count_it = false` (a backfill
                    // re-announce), this can under-count. Preserved rather than silently "fixed";
                    // see the open question in the design notes.
                    o.insert(MempoolEntry::Dropped);
                    scalars.count -= 1;
                    self.metrics.dropped_total.increment(1);
                    true
                }
                MempoolEntry::Bodied(_) => {
                    o.remove();
                    false
                }
                MempoolEntry::Live { inputs, .. } => {
                    let inputs = inputs.clone();
                    o.remove();
                    self.indices.uncache_spends(&inputs);
                    scalars.count -= 1;
                    self.metrics.dropped_total.increment(1);
                    true
                }
                MempoolEntry::Dropped => false,
            },
        }
    }

    /// Drains confirmed transactions from the mempool on a new block, publishing the resulting
    /// count once the whole block has been applied.
    pub fn apply_block(&self, block: BlockData) {
        {
            let mut scalars = self.scalars.lock();
            // The block-set update must land before any confirmed txid is dropped, so a racing
            // `insert` that reads the block set after this point cannot promote a
            // just-confirmed txid back to `Live`.
            self.indices.set_block_set(block.txns.iter().copied());

            for txid in &block.txns {
                // `drop_locked`'s own Vacant-and-pending-backfill branch already implements the
                // "was this a pending backfill entry" check the design notes call out as the
                // no-count-but-still-a-removal case for block application; no separate check is
                // needed here.
                self.drop_locked(&mut scalars, *txid);
            }

            self.metrics.blocks_applied_total.increment(1);
        }
        self.publish_count();
    }

    /// Serializes `{"type": "count", "count": <count>}` and pushes it to the publish sink.
    pub fn publish_count(&self) {
        let count = self.get_count();
        self.metrics.live_count.set(count as f64);
        let payload = serde_json::json!({ "type": "count", "count": count });
        self.publish.publish(payload.to_string().into_bytes());
    }

    /// Number of `Live` entries.
    pub fn get_count(&self) -> i64 {
        self.scalars.lock().count
    }

    pub(crate) fn target_profile(&self) -> TargetProfile {
        self.profile
    }

    /// Installs the authoritative snapshot: sets `sequence_cursor`, seeds `count` and the sync
    /// set from `txids`, and replays any announce/remove events that arrived before the snapshot
    /// loaded, in receipt order, before releasing the lock. This is what guarantees a
    /// post-snapshot sequence-stream message is never processed ahead of a queued one: both paths
    /// serialize on the same mutex.
    pub fn load_snapshot(&self, sequence: u64, txids: impl IntoIterator<Item = Txid>) {
        let mut scalars = self.scalars.lock();
        scalars.sequence_cursor = Some(sequence);
        let txids: Vec<Txid> = txids.into_iter().collect();
        scalars.count = txids.len() as i64;
        for txid in &txids {
            self.indices.sync_set.insert(*txid);
        }

        let queued = std::mem::take(&mut scalars.queue);
        for event in queued {
            match event {
                QueuedEvent::Announce { txid, seq } => {
                    self.register_locked(&mut scalars, txid, seq, true);
                }
                QueuedEvent::Remove { txid } => {
                    self.drop_locked(&mut scalars, txid);
                }
            }
        }
    }

    /// Marks the snapshot-and-backfill reconciliation as finished.
    pub fn mark_done(&self) {
        self.scalars.lock().done = true;
    }
}

fn spend_inputs(tx: &Transaction) -> Vec<OutPoint> {
    tx.inputs.iter().map(|input| input.prev_out).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mempool_interfaces::publish::NoopPublishSink;
    use mempool_primitives::TxInput;

    fn txid(byte: u8) -> Txid {
        Txid::from_bytes([byte; 32])
    }

    fn machine(profile: TargetProfile) -> StateMachine {
        let sm = StateMachine::new(profile, Arc::new(NoopPublishSink));
        sm.load_snapshot(100, std::iter::empty());
        sm
    }

    fn sample_tx(id: Txid, prev: Txid, prev_vout: u32) -> Transaction {
        Transaction {
            id,
            inputs: vec![TxInput { prev_out: OutPoint::new(prev, prev_vout) }],
            value: 90,
            fee: 10,
            inflated: bytes::Bytes::new(),
        }
    }

    #[test]
    fn normal_path_register_then_body() {
        let sm = machine(TargetProfile::Public);
        let aa = txid(0xaa);

        assert!(sm.register(aa, Some(101), true).is_none());
        let prev = txid(0x01);
        let tx = sample_tx(aa, prev, 0);
        let result = sm.insert(aa, tx);
        assert_eq!(result, Some(1));
        assert_eq!(sm.get_count(), 1);
        assert!(sm.indices.spend_index.contains_key(&OutPoint::new(prev, 0)));
    }

    #[test]
    fn out_of_order_body_then_announce() {
        let sm = machine(TargetProfile::Public);
        let bb = txid(0xbb);
        let qq = txid(0x02);
        let tx = sample_tx(bb, qq, 1);

        assert!(sm.insert(bb, tx).is_none());
        assert_eq!(sm.get_count(), 0);

        let promoted = sm.register(bb, Some(102), true);
        assert!(promoted.is_some());
        assert_eq!(sm.get_count(), 1);
    }

    #[test]
    fn drop_before_body_then_late_body_is_discarded() {
        let sm = machine(TargetProfile::Public);
        let cc = txid(0xcc);

        assert!(sm.register(cc, Some(103), true).is_none());
        assert_eq!(sm.get_count(), 1);

        assert!(sm.drop_tx(cc));
        assert_eq!(sm.get_count(), 0);

        let tx = sample_tx(cc, txid(0x03), 0);
        assert!(sm.insert(cc, tx).is_none());
        assert_eq!(sm.get_count(), 0);

        // A fresh announce after the tombstone is cleared starts over rather than resurrecting.
        assert!(sm.register(cc, Some(105), true).is_none());
        assert_eq!(sm.get_count(), 1);
    }

    #[test]
    fn block_confirmation_discards_late_body() {
        let sm = machine(TargetProfile::Public);
        let dd = txid(0xdd);
        let ee = txid(0xee);

        assert!(sm.register(dd, Some(106), true).is_none());
        assert!(sm.insert(dd, sample_tx(dd, txid(0x04), 0)).is_some());
        assert_eq!(sm.get_count(), 1);

        sm.apply_block(BlockData { txns: vec![dd, ee] });
        assert_eq!(sm.get_count(), 0);

        // Late body for `ee`, which was never seen before the block confirmed it.
        assert!(sm.insert(ee, sample_tx(ee, txid(0x05), 0)).is_none());
        assert_eq!(sm.get_count(), 0);
    }

    #[test]
    fn double_announce_is_idempotent() {
        let sm = machine(TargetProfile::Personal);
        let txid = txid(0x10);
        assert!(sm.register(txid, Some(110), true).is_none());
        assert_eq!(sm.get_count(), 1);
        assert!(sm.register(txid, Some(111), true).is_none());
        assert_eq!(sm.get_count(), 1);
    }

    #[test]
    fn double_remove_is_idempotent() {
        let sm = machine(TargetProfile::Personal);
        let txid = txid(0x11);
        assert!(sm.register(txid, Some(112), true).is_none());
        assert!(sm.drop_tx(txid));
        assert_eq!(sm.get_count(), 0);
        assert!(!sm.drop_tx(txid));
        assert_eq!(sm.get_count(), 0);
    }

    #[test]
    fn startup_queuing_replays_in_receipt_order() {
        use crate::query::MempoolStatus;

        // No snapshot loaded yet: both `register` and `drop_tx` must buffer onto `queue` rather
        // than act immediately.
        let sm = StateMachine::new(TargetProfile::Personal, Arc::new(NoopPublishSink));
        let ff = txid(0xff);
        let gg = txid(0xbb);

        assert!(sm.register(ff, Some(50), true).is_none());
        assert!(!sm.drop_tx(gg));
        assert_eq!(sm.get_count(), 0);

        // Snapshot reports seq=100 and names `gg` as already in the mempool.
        sm.load_snapshot(100, vec![gg]);

        // The queued remove for `gg` is replayed and drops it (count returns to 0); the queued
        // announce for `ff` carries sequence 50, which is older than the snapshot's cursor of
        // 100, so it is discarded rather than resurrecting `ff`.
        assert_eq!(sm.get_count(), 0);
        assert_eq!(sm.get_status(gg), MempoolStatus::Dropped);
        assert_eq!(sm.get_status(ff), MempoolStatus::New);
    }

    #[test]
    fn personal_profile_never_populates_spend_index() {
        let sm = machine(TargetProfile::Personal);
        let txid = txid(0x12);
        let prev = txid(0x13);
        sm.register(txid, Some(113), true);
        sm.insert(txid, sample_tx(txid, prev, 0));
        assert!(sm.indices.spend_index.is_empty());
    }
}
