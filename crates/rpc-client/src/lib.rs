#![warn(missing_docs)]
#![deny(unused_must_use, rust_2018_idioms)]

//! A [`mempool_interfaces::RpcClient`] backed by the node's JSON-RPC HTTP endpoint.

mod auth;

use async_trait::async_trait;
use jsonrpsee::{
    core::client::ClientT,
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
    types::ErrorObject,
};
use mempool_interfaces::rpc::{BatchItem, RpcClient, RpcError};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub use auth::Credentials;

/// Connects to a Bitcoin Core-compatible `http(s)://host:port` RPC endpoint.
#[derive(Debug, Clone)]
pub struct BitcoinRpcClient {
    client: HttpClient,
}

impl BitcoinRpcClient {
    /// Builds a client against `endpoint`, authenticating with `credentials`.
    pub fn new(endpoint: &str, credentials: &Credentials) -> Result<Self, RpcError> {
        let headers = credentials
            .to_headers()
            .map_err(|e| RpcError::Transport(format!("failed to load rpc credentials: {e}")))?;

        let client = HttpClientBuilder::default()
            .set_headers(headers)
            .request_timeout(Duration::from_secs(30))
            .build(endpoint)
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(Self { client })
    }
}

fn map_call_error(err: jsonrpsee::core::ClientError) -> RpcError {
    match err {
        jsonrpsee::core::ClientError::Call(obj) => node_error(&obj),
        other => RpcError::Transport(other.to_string()),
    }
}

fn node_error(obj: &ErrorObject<'_>) -> RpcError {
    RpcError::Node { code: obj.code() as i64, message: obj.message().to_string() }
}

#[async_trait]
impl RpcClient for BitcoinRpcClient {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let params = match params {
            Value::Array(items) => rpc_params_from(items),
            Value::Null => rpc_params![],
            other => rpc_params![other],
        };
        self.client.request(method, params).await.map_err(map_call_error)
    }

    async fn batch_request(
        &self,
        method: &str,
        params: Vec<Value>,
        keyed: bool,
    ) -> Result<Vec<BatchItem>, RpcError> {
        let mut builder = jsonrpsee::core::client::BatchRequestBuilder::new();
        for p in &params {
            let call_params = match p.clone() {
                Value::Array(items) => rpc_params_from(items),
                Value::Null => rpc_params![],
                other => rpc_params![other],
            };
            builder
                .insert(method, call_params)
                .map_err(|e| RpcError::Transport(e.to_string()))?;
        }

        let response = self.client.batch_request::<Value>(builder).await.map_err(|e| {
            RpcError::Transport(e.to_string())
        })?;

        let mut out = Vec::with_capacity(params.len());
        for (id, result) in response.into_iter().enumerate() {
            let outcome = match result {
                Ok(value) => Ok(value),
                Err(obj) => Err(node_error(&obj)),
            };
            if keyed {
                debug!(target: "mempool::rpc", id, "resolved batch item");
            }
            out.push(BatchItem { id: id as u64, outcome });
        }
        Ok(out)
    }
}

fn rpc_params_from(items: Vec<Value>) -> jsonrpsee::core::params::ArrayParams {
    let mut builder = jsonrpsee::core::params::ArrayParams::new();
    for item in items {
        let _ = builder.insert(item);
    }
    builder
}
