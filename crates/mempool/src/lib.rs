#![warn(missing_docs)]
#![deny(unused_must_use, rust_2018_idioms)]

//! The mempool tracker's core: a live, consistent view of a Bitcoin node's unconfirmed-transaction
//! pool, fused from three independently-ordered notification streams and an authoritative RPC
//! snapshot.
//!
//! ```text
//! notifications ─────▶ dispatcher ─────▶ state machine ─────▶ indices
//! new-block notif ────▶ block applier ──▶ state machine
//! startup/resync ─────▶ reconciler ─────▶ rpc ─────▶ state machine
//! ```
//!
//! [`StateMachine`] is the single writer of [`Indices`](indices::Indices); [`dispatcher`] and
//! [`reconciler`] are its only two feeders, and both are the only components in the crate that
//! perform I/O. [`Tracker`] wires the three together behind the query surface in [`query`].

pub mod config;
pub mod dispatcher;
pub mod entry;
pub mod indices;
pub mod query;
pub mod reconciler;
pub mod state;

pub use config::{MempoolConfig, TargetProfile};
pub use dispatcher::EventDispatcher;
pub use query::{MempoolStatus, SpendLookup};
pub use reconciler::Reconciler;
pub use state::StateMachine;

use mempool_interfaces::{decode::Decoder, notifications::NotificationStream, publish::PublishSink, rpc::RpcClient};
use mempool_primitives::Txid;
use mempool_tasks::TaskExecutor;
use std::sync::Arc;

/// Wires a [`StateMachine`] to its [`EventDispatcher`] and [`Reconciler`], and exposes the
/// read-only query surface a downstream binary or publisher needs.
///
/// Construction spawns the dispatcher's three per-stream tasks and the reconciler's
/// snapshot-and-backfill task on `executor`; the returned `Tracker` is a cheap handle to the
/// shared [`StateMachine`] those tasks feed.
#[derive(Clone)]
pub struct Tracker {
    state: Arc<StateMachine>,
}

impl Tracker {
    /// Spawns the dispatcher and reconciler tasks and returns a handle to the resulting tracker.
    pub async fn spawn<N, D, R>(
        config: MempoolConfig,
        notifications: Arc<N>,
        decoder: Arc<D>,
        rpc: Arc<R>,
        publish: Arc<dyn PublishSink>,
        executor: TaskExecutor,
    ) -> Self
    where
        N: NotificationStream,
        D: Decoder,
        R: RpcClient,
    {
        let state = Arc::new(StateMachine::new(config.target_profile, publish));

        let dispatcher =
            EventDispatcher::new(state.clone(), notifications, decoder.clone(), executor.clone());
        dispatcher.spawn().await;

        let reconciler = Reconciler::new(state.clone(), rpc, decoder, config, executor.clone());
        executor.spawn_critical("reconciler", async move {
            reconciler.run().await;
        });

        Self { state }
    }

    /// Number of `Live` entries currently tracked.
    pub fn get_count(&self) -> i64 {
        self.state.get_count()
    }

    /// The coarse lifecycle status of `txid`.
    pub fn get_status(&self, txid: Txid) -> MempoolStatus {
        self.state.get_status(txid)
    }

    /// Which live transaction, if any, spends `(prev_txid, prev_vout)`.
    pub fn lookup_spend(&self, prev_txid: Txid, prev_vout: u32) -> Option<SpendLookup> {
        self.state.lookup_spend(prev_txid, prev_vout)
    }

    /// Whether the initial snapshot and backfill have both completed.
    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }
}
