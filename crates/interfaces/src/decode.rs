//! The transaction and block decoders the dispatcher invokes on raw payloads.

use mempool_primitives::{BlockData, Transaction};
use thiserror::Error;

/// An error returned by a [`Decoder`].
#[derive(Debug, Clone, Error)]
#[error("failed to decode payload: {0}")]
pub struct DecodeError(pub String);

impl DecodeError {
    /// Wraps any displayable decode failure.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Converts raw, wire-format payloads into the structured records the mempool core operates on.
///
/// Implementations are expected to be cheap to clone (or to be used behind a reference) since the
/// dispatcher calls into them on every raw-transaction and raw-block message.
#[auto_impl::auto_impl(&, Arc)]
pub trait Decoder: Send + Sync + 'static {
    /// Decodes a raw transaction payload into a [`Transaction`].
    fn decode_transaction(&self, raw: &[u8]) -> Result<Transaction, DecodeError>;

    /// Decodes a raw block payload into a [`BlockData`].
    fn decode_block(&self, raw: &[u8]) -> Result<BlockData, DecodeError>;
}
