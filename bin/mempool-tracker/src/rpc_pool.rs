//! Round-robins RPC calls across a small pool of [`BitcoinRpcClient`]s.
//!
//! spec.md §6 enumerates `rpc_pool_count` as a configuration option; the core itself is generic
//! over a single [`RpcClient`], so the binary is what actually spreads load across however many
//! independent HTTP clients the operator configured.

use async_trait::async_trait;
use mempool_interfaces::rpc::{BatchItem, RpcClient, RpcError};
use mempool_rpc_client::BitcoinRpcClient;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A fixed pool of [`BitcoinRpcClient`]s, picked round-robin per call.
#[derive(Debug)]
pub struct RoundRobinRpcClient {
    clients: Vec<BitcoinRpcClient>,
    next: AtomicUsize,
}

impl RoundRobinRpcClient {
    /// Builds a pool from `clients`. Panics if empty; callers are expected to have validated
    /// `rpc_pool_count >= 1` already (see [`crate::config::AppConfig`]).
    pub fn new(clients: Vec<BitcoinRpcClient>) -> Self {
        assert!(!clients.is_empty(), "rpc client pool must not be empty");
        Self { clients, next: AtomicUsize::new(0) }
    }

    fn pick(&self) -> &BitcoinRpcClient {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        &self.clients[index]
    }
}

#[async_trait]
impl RpcClient for RoundRobinRpcClient {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.pick().request(method, params).await
    }

    async fn batch_request(
        &self,
        method: &str,
        params: Vec<Value>,
        keyed: bool,
    ) -> Result<Vec<BatchItem>, RpcError> {
        self.pick().batch_request(method, params, keyed).await
    }
}
