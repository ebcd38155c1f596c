#![warn(missing_docs)]
#![deny(unused_must_use, rust_2018_idioms)]

//! Wires the mempool tracker's core to its concrete collaborators: a ZMQ notification
//! transport, a JSON-RPC client, a consensus-decoding `Decoder`, and a broadcast-backed
//! HTTP/WebSocket fan-out server — then runs until interrupted.

mod config;
mod fanout;
mod rpc_pool;

use crate::config::{AppConfig, RpcAuth};
use crate::fanout::BroadcastPublishSink;
use mempool_codec::BitcoinDecoder;
use mempool_core::Tracker;
use mempool_interfaces::notifications::StreamKind;
use mempool_net::{
    zmq::{ZmqConnector, ZmqEndpoints},
    ReconnectingNotificationStream,
};
use mempool_rpc_client::{BitcoinRpcClient, Credentials};
use mempool_tasks::TaskExecutor;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let config = AppConfig::load()?;
    mempool_tracing::init(config.log_level)?;
    info!(
        target: "mempool::bin",
        rpc_endpoint = %config.rpc_endpoint,
        profile = ?config.target_profile,
        listen = %config.listen_address,
        "starting mempool tracker"
    );

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| eyre::eyre!("failed to install metrics recorder: {e}"))?;

    let (executor, shutdown_signal) = TaskExecutor::new();

    let credentials = match &config.rpc_auth {
        RpcAuth::UserPass { user, password } => {
            Credentials::UserPass { user: user.clone(), password: password.clone() }
        }
        RpcAuth::CookieFile(path) => Credentials::CookieFile(path.clone()),
    };
    let clients = (0..config.rpc_pool_count)
        .map(|_| BitcoinRpcClient::new(&config.rpc_endpoint, &credentials))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| eyre::eyre!("failed to build rpc client: {e}"))?;
    let rpc = Arc::new(rpc_pool::RoundRobinRpcClient::new(clients));

    let decoder = Arc::new(BitcoinDecoder);

    let zmq_endpoints = ZmqEndpoints::new()
        .with_endpoint(StreamKind::Sequence, config.zmq_sequence_endpoint.clone())
        .with_endpoint(StreamKind::RawTx, config.zmq_rawtx_endpoint.clone())
        .with_endpoint(StreamKind::RawBlock, config.zmq_rawblock_endpoint.clone());
    let notifications = Arc::new(ReconnectingNotificationStream::new(
        ZmqConnector::new(zmq_endpoints),
        executor.clone(),
    ));

    let fanout = Arc::new(BroadcastPublishSink::new(1024));

    let tracker = Arc::new(
        Tracker::spawn(
            config.mempool.clone(),
            notifications,
            decoder,
            rpc,
            fanout.clone(),
            executor.clone(),
        )
        .await,
    );

    let app = fanout::router(tracker, fanout, metrics_handle);
    let listener = tokio::net::TcpListener::bind(config.listen_address)
        .await
        .map_err(|e| eyre::eyre!("failed to bind {}: {e}", config.listen_address))?;

    info!(target: "mempool::bin", listen = %config.listen_address, "serving query/fan-out http api");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.map_err(|e| eyre::eyre!("http server error: {e}"))?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!(target: "mempool::bin", "shutdown signal received");
        }
    }

    shutdown_signal.shutdown();
    Ok(())
}
