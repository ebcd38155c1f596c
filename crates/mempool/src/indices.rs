use crate::entry::MempoolEntry;
use dashmap::{DashMap, DashSet};
use mempool_primitives::{OutPoint, Txid};
use parking_lot::RwLock;
use std::collections::HashSet;

/// The four keyed containers the state machine mutates.
///
/// Every container supports atomic single-key read/write without a crate-wide lock: the mempool
/// and spend-index maps are sharded [`DashMap`]s, the sync set is a sharded [`DashSet`], and the
/// block set is a plain [`HashSet`] behind a single [`RwLock`] since it is only ever replaced
/// wholesale by `apply_block`, never mutated key-by-key under load. The state machine is the only
/// writer; every other component holds a read-only [`std::sync::Arc`] to this struct.
#[derive(Default)]
pub struct Indices {
    /// Per-txid lifecycle state.
    pub(crate) mempool: DashMap<Txid, MempoolEntry>,
    /// Txids returned by the authoritative snapshot, consulted while reconciliation is in
    /// flight. Cleared entry-by-entry as transactions transition to `Live`.
    pub(crate) sync_set: DashSet<Txid>,
    /// Txids confirmed by the most recently applied block.
    pub(crate) block_set: RwLock<HashSet<Txid>>,
    /// Reverse map from a previous output to the in-mempool transaction spending it. Populated
    /// only when an entry reaches `Live`; only ever non-empty when the target profile enables it.
    pub(crate) spend_index: DashMap<OutPoint, (Txid, u32)>,
}

impl Indices {
    /// Whether `txid` is in the block set, i.e. was confirmed by the most recently applied block.
    pub(crate) fn is_confirmed(&self, txid: &Txid) -> bool {
        self.block_set.read().contains(txid)
    }

    /// Replaces the block set wholesale with `confirmed`.
    ///
    /// `apply_block` calls this before touching any entry so the new block set is visible to any
    /// `insert` racing the confirmation pass (acquire-release across the state machine's block
    /// lock makes this ordering observable).
    pub(crate) fn set_block_set(&self, confirmed: impl IntoIterator<Item = Txid>) {
        let mut guard = self.block_set.write();
        guard.clear();
        guard.extend(confirmed);
    }

    /// Removes every `(prev_txid, prev_vout)` row owned by `inputs`.
    ///
    /// The source this tracker is modeled on recurses over `inputs` without a base case; that is
    /// a bug, not a design choice, so this plainly iterates instead.
    pub(crate) fn uncache_spends(&self, inputs: &[OutPoint]) {
        for outpoint in inputs {
            self.spend_index.remove(outpoint);
        }
    }

    /// Inserts a spend-index row for every input in `inputs`, all owned by `spender`.
    pub(crate) fn cache_spends(&self, spender: Txid, inputs: &[OutPoint]) {
        for (index, outpoint) in inputs.iter().enumerate() {
            self.spend_index.insert(*outpoint, (spender, index as u32));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncache_spends_removes_every_row() {
        let indices = Indices::default();
        let spender = Txid::from_bytes([1; 32]);
        let prev = Txid::from_bytes([2; 32]);
        let inputs = vec![OutPoint::new(prev, 0), OutPoint::new(prev, 1)];
        indices.cache_spends(spender, &inputs);
        assert_eq!(indices.spend_index.len(), 2);

        indices.uncache_spends(&inputs);
        assert!(indices.spend_index.is_empty());
    }
}
