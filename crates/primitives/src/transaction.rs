use crate::Txid;
use bytes::Bytes;

/// A previous output referenced by a transaction input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    /// The txid of the transaction that created the referenced output.
    pub txid: Txid,
    /// The index of the referenced output within that transaction.
    pub vout: u32,
}

impl OutPoint {
    /// Creates a new outpoint.
    pub const fn new(txid: Txid, vout: u32) -> Self {
        Self { txid, vout }
    }
}

/// An input of a [`Transaction`], spending a previous output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// The output this input spends.
    pub prev_out: OutPoint,
}

/// A canonical transaction record, as produced by decoding a raw transaction payload.
///
/// `value + fee` accounts for the sum of outputs plus the miner fee; `inflated` is retained
/// verbatim so it can be forwarded to downstream publishers without the core needing to know its
/// shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// The transaction's id.
    pub id: Txid,
    /// The inputs this transaction spends.
    pub inputs: Vec<TxInput>,
    /// Sum of this transaction's output values, in the node's native unit.
    pub value: u64,
    /// The miner fee paid by this transaction.
    pub fee: u64,
    /// Opaque payload retained for publication to downstream subscribers.
    pub inflated: Bytes,
}

impl Transaction {
    /// Total input value implied by outputs plus fee.
    pub fn total_in(&self) -> u64 {
        self.value.saturating_add(self.fee)
    }
}
