use crate::Txid;

/// A decoded raw-block payload: just enough to drive block confirmation.
///
/// The tracker does not need the block header, merkle root, or any consensus fields; it only
/// needs the set of transactions the block confirms so it can drain them from the mempool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockData {
    /// Txids confirmed by this block, in block order.
    pub txns: Vec<Txid>,
}
