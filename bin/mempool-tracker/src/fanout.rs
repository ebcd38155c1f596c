//! The downstream fan-out registry spec.md §1 calls "not specified here": one concrete
//! [`PublishSink`] (a broadcast channel) and the HTTP/WebSocket server external subscribers poll
//! or stream from.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use mempool_core::{MempoolStatus, Tracker};
use mempool_interfaces::publish::PublishSink;
use mempool_primitives::Txid;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::{str::FromStr, sync::Arc};
use tokio::sync::broadcast;
use tracing::debug;

/// A [`PublishSink`] that feeds every payload into a [`broadcast::Sender`], so any number of
/// WebSocket clients can subscribe independently without the state machine knowing they exist.
#[derive(Debug, Clone)]
pub struct BroadcastPublishSink {
    sender: broadcast::Sender<Bytes>,
}

impl BroadcastPublishSink {
    /// Creates a sink (and its paired receiver factory) with room for `capacity` payloads of
    /// lag-tolerance per subscriber before a slow WebSocket client starts missing updates.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.sender.subscribe()
    }
}

impl PublishSink for BroadcastPublishSink {
    fn publish(&self, payload: Vec<u8>) {
        // No subscribers is not an error: the sink exists whether or not anyone is listening.
        let _ = self.sender.send(payload.into());
    }
}

#[derive(Clone)]
struct AppState {
    tracker: Arc<Tracker>,
    fanout: Arc<BroadcastPublishSink>,
    metrics: PrometheusHandle,
}

/// Builds the query/fan-out HTTP router described in SPEC_FULL.md §12.
pub fn router(tracker: Arc<Tracker>, fanout: Arc<BroadcastPublishSink>, metrics: PrometheusHandle) -> Router {
    let state = AppState { tracker, fanout, metrics };
    Router::new()
        .route("/count", get(get_count))
        .route("/status/:txid", get(get_status))
        .route("/spend/:txid/:vout", get(get_spend))
        .route("/ws", get(ws_upgrade))
        .route("/metrics", get(get_metrics))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[derive(Serialize)]
struct CountResponse {
    count: i64,
}

async fn get_count(State(state): State<AppState>) -> Json<CountResponse> {
    Json(CountResponse { count: state.tracker.get_count() })
}

fn status_label(status: MempoolStatus) -> &'static str {
    match status {
        MempoolStatus::New => "new",
        MempoolStatus::Announced => "announced",
        MempoolStatus::Bodied => "bodied",
        MempoolStatus::Live => "live",
        MempoolStatus::Dropped => "dropped",
        MempoolStatus::Block => "block",
    }
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}

async fn get_status(State(state): State<AppState>, Path(txid): Path<String>) -> impl IntoResponse {
    match Txid::from_str(&txid) {
        Ok(txid) => {
            let status = state.tracker.get_status(txid);
            Json(StatusResponse { status: status_label(status) }).into_response()
        }
        Err(err) => (axum::http::StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    }
}

#[derive(Serialize)]
struct SpendResponse {
    spender: String,
    input_index: u32,
}

async fn get_spend(State(state): State<AppState>, Path((txid, vout)): Path<(String, u32)>) -> impl IntoResponse {
    let txid = match Txid::from_str(&txid) {
        Ok(txid) => txid,
        Err(err) => return (axum::http::StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };
    let hit = state
        .tracker
        .lookup_spend(txid, vout)
        .map(|hit| SpendResponse { spender: hit.spender.to_string(), input_index: hit.input_index });
    Json(hit).into_response()
}

async fn get_metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: AppState) {
    let initial = serde_json::json!({ "type": "count", "count": state.tracker.get_count() });
    if socket.send(Message::Text(initial.to_string())).await.is_err() {
        return;
    }

    let mut updates = state.fanout.subscribe();
    loop {
        tokio::select! {
            message = socket.recv() => match message {
                Some(Ok(_)) => continue,
                _ => return,
            },
            update = updates.recv() => match update {
                Ok(payload) => {
                    let text = String::from_utf8_lossy(&payload).into_owned();
                    if socket.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(target: "mempool::fanout", skipped, "ws subscriber lagged, resuming");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}
