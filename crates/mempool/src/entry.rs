use mempool_primitives::{OutPoint, Transaction};

/// The lifecycle state of a single txid inside the mempool index.
///
/// ```text
/// (nothing) --announce--> Announced --body--> Live
/// (nothing) --body-----> Bodied    --announce--> Live
/// Announced --remove--> Dropped   --body--> (discarded)
/// Bodied    --remove--> (deleted immediately; not counted)
/// Live      --remove | block-confirm--> (deleted; count decremented; spends uncached)
/// ```
#[derive(Debug, Clone)]
pub enum MempoolEntry {
    /// Seen on the sequence stream; the body has not been decoded yet.
    Announced,
    /// The body arrived before, or without, a matching announcement.
    Bodied(Transaction),
    /// Both announced and bodied: counted in the tracked total.
    Live {
        /// The outpoints this transaction spends, cached here so `apply_block`/`drop_tx` can
        /// remove the corresponding spend-index rows without re-decoding the body.
        inputs: Vec<OutPoint>,
        /// Sum of inputs implied by `value + fee`.
        total_in: u64,
        /// Opaque payload forwarded to publication.
        inflated: bytes::Bytes,
    },
    /// A removal arrived before the body could be processed; a tombstone that suppresses late
    /// admission of a body for this txid.
    Dropped,
}

impl MempoolEntry {
    /// Whether this entry is counted in the tracked `count` scalar.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }
}
