//! The RPC client the reconciler uses to fetch the authoritative mempool snapshot and to
//! backfill transaction bodies.

use serde_json::Value;
use thiserror::Error;

/// An error returned by an [`RpcClient`] call.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// The transport itself failed (connection refused, timed out, reset, ...).
    #[error("rpc transport error: {0}")]
    Transport(String),
    /// The node returned a well-formed error response.
    #[error("rpc error {code}: {message}")]
    Node {
        /// The node's numeric error code.
        code: i64,
        /// The node's error message.
        message: String,
    },
}

/// The outcome of a single request within a [`RpcClient::batch_request`] call.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// An identifier correlating this result back to the request that produced it, when the
    /// caller asked for a keyed batch.
    pub id: u64,
    /// The decoded result, or the node-reported error for this particular item.
    pub outcome: Result<Value, RpcError>,
}

/// Single and batched JSON-RPC calls against the node.
///
/// Implementations own connection pooling and retry-on-transport-error policy; the mempool core
/// only distinguishes between a transport failure (retry the whole call) and a per-item node
/// error (skip that item and continue).
#[async_trait::async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait RpcClient: Send + Sync + 'static {
    /// Performs a single JSON-RPC call, returning the decoded result.
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError>;

    /// Performs a batched JSON-RPC call.
    ///
    /// When `keyed` is `true` the implementation must preserve a stable correspondence between
    /// `params` entries and the returned [`BatchItem::id`] values (their shared index), so the
    /// caller can still resolve results if the node reorders the batch response.
    async fn batch_request(
        &self,
        method: &str,
        params: Vec<Value>,
        keyed: bool,
    ) -> Result<Vec<BatchItem>, RpcError>;
}
