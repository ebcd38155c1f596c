//! The read-only query surface over a [`StateMachine`]'s committed state.
//!
//! Every variant here is a coarse projection of [`MempoolEntry`]; callers that need the decoded
//! body or the cached inputs stay inside the crate and go through the indices directly (the
//! query API only ever hands callers a status tag, a count, or a spend-index hit).

use crate::{entry::MempoolEntry, state::StateMachine};
use mempool_primitives::{OutPoint, Txid};

/// The coarse lifecycle status [`StateMachine::get_status`] reports for a txid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MempoolStatus {
    /// No entry for this txid, and it has not been confirmed by the last applied block either:
    /// the tracker has never heard of it, or it was dropped and the tombstone already cleared.
    New,
    /// Seen on the sequence stream; the body has not been decoded yet.
    Announced,
    /// The body arrived before, or without, a matching announcement.
    Bodied,
    /// Both announced and bodied; counted in [`StateMachine::get_count`].
    Live,
    /// Removed before its body could be processed, or explicitly dropped; a tombstone.
    Dropped,
    /// Confirmed by the most recently applied block.
    Block,
}

/// A spend-index hit: which transaction and input index spends a given previous output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendLookup {
    /// The txid spending the queried outpoint.
    pub spender: Txid,
    /// The index, within the spender's inputs, of the input that spends it.
    pub input_index: u32,
}

impl StateMachine {
    /// Reports the coarse lifecycle status of `txid`.
    ///
    /// The block set is checked first: a txid can remain in the mempool index with a stale
    /// variant for a reader racing `apply_block`, but once the block set contains it, `Block` is
    /// always the right answer regardless of what (if anything) is still sitting in the mempool
    /// index.
    pub fn get_status(&self, txid: Txid) -> MempoolStatus {
        if self.indices().is_confirmed(&txid) {
            return MempoolStatus::Block;
        }
        match self.indices().mempool.get(&txid) {
            None => MempoolStatus::New,
            Some(entry) => match entry.value() {
                MempoolEntry::Announced => MempoolStatus::Announced,
                MempoolEntry::Bodied(_) => MempoolStatus::Bodied,
                MempoolEntry::Live { .. } => MempoolStatus::Live,
                MempoolEntry::Dropped => MempoolStatus::Dropped,
            },
        }
    }

    /// Looks up which live transaction, if any, spends `(prev_txid, prev_vout)`.
    ///
    /// Always returns `None` under [`TargetProfile::Personal`](crate::config::TargetProfile),
    /// since the spend index is never populated in that profile.
    pub fn lookup_spend(&self, prev_txid: Txid, prev_vout: u32) -> Option<SpendLookup> {
        if !self.target_profile().spend_index_enabled() {
            return None;
        }
        self.indices()
            .spend_index
            .get(&OutPoint::new(prev_txid, prev_vout))
            .map(|entry| {
                let (spender, input_index) = *entry;
                SpendLookup { spender, input_index }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetProfile;
    use mempool_interfaces::publish::NoopPublishSink;
    use mempool_primitives::{Transaction, TxInput};
    use std::sync::Arc;

    fn txid(byte: u8) -> Txid {
        Txid::from_bytes([byte; 32])
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
    fn status_reflects_every_lifecycle_stage() {
        let sm = StateMachine::new(TargetProfile::Public, Arc::new(NoopPublishSink));
        sm.load_snapshot(100, std::iter::empty());

        let never_seen = txid(1);
        assert_eq!(sm.get_status(never_seen), MempoolStatus::New);

        let announced = txid(2);
        sm.register(announced, Some(101), true);
        assert_eq!(sm.get_status(announced), MempoolStatus::Announced);

        let bodied = txid(3);
        sm.insert(bodied, sample_tx(bodied, txid(30), 0));
        assert_eq!(sm.get_status(bodied), MempoolStatus::Bodied);

        let live = txid(4);
        sm.register(live, Some(102), true);
        sm.insert(live, sample_tx(live, txid(40), 0));
        assert_eq!(sm.get_status(live), MempoolStatus::Live);

        let dropped = txid(5);
        sm.register(dropped, Some(103), true);
        sm.drop_tx(dropped);
        assert_eq!(sm.get_status(dropped), MempoolStatus::Dropped);

        sm.apply_block(mempool_primitives::BlockData { txns: vec![live] });
        assert_eq!(sm.get_status(live), MempoolStatus::Block);
    }

    #[test]
    fn lookup_spend_finds_live_spender_in_public_profile() {
        let sm = StateMachine::new(TargetProfile::Public, Arc::new(NoopPublishSink));
        sm.load_snapshot(100, std::iter::empty());
        let spender = txid(6);
        let prev = txid(60);
        sm.register(spender, Some(104), true);
        sm.insert(spender, sample_tx(spender, prev, 2));

        let hit = sm.lookup_spend(prev, 2).expect("spend should be indexed");
        assert_eq!(hit.spender, spender);
        assert_eq!(hit.input_index, 0);
    }

    #[test]
    fn lookup_spend_always_none_in_personal_profile() {
        let sm = StateMachine::new(TargetProfile::Personal, Arc::new(NoopPublishSink));
        sm.load_snapshot(100, std::iter::empty());
        let spender = txid(7);
        let prev = txid(70);
        sm.register(spender, Some(105), true);
        sm.insert(spender, sample_tx(spender, prev, 0));

        assert!(sm.lookup_spend(prev, 0).is_none());
    }
}
