#![warn(missing_docs)]
#![deny(unused_must_use, rust_2018_idioms)]

//! Metrics for the mempool tracker core.
//!
//! Built directly on the `metrics` facade crate, the same way the rest of the ambient stack
//! avoids hand-rolled counters: every gauge/counter here is a named, described handle that any
//! installed recorder (Prometheus, statsd, ...) can pick up. Installing a recorder is a process
//! concern and is left to the binary.

use metrics::{describe_counter, describe_gauge, Counter, Gauge, Unit};

/// Metrics for the state machine and reconciler.
#[derive(Debug, Clone)]
pub struct MempoolMetrics {
    /// Current number of `Live` entries, mirrored from the state machine's `count` scalar.
    pub live_count: Gauge,
    /// Transactions admitted to `Live` via `register`.
    pub registered_total: Counter,
    /// Transactions admitted to `Live` via `insert`.
    pub inserted_total: Counter,
    /// Transactions removed via `drop` (sequence-stream `R` or block confirmation).
    pub dropped_total: Counter,
    /// Blocks applied via `apply_block`.
    pub blocks_applied_total: Counter,
    /// Decode failures on the raw-transaction or raw-block streams.
    pub decode_errors_total: Counter,
    /// Backfill batches that failed outright and were skipped.
    pub backfill_batch_failures_total: Counter,
    /// Transactions skipped in a backfill batch because the node returned a per-item error.
    pub backfill_item_failures_total: Counter,
}

impl Default for MempoolMetrics {
    fn default() -> Self {
        describe_gauge!(
            "mempool_live_count",
            Unit::Count,
            "number of Live entries currently tracked"
        );
        describe_counter!(
            "mempool_registered_total",
            Unit::Count,
            "transactions admitted to Live via register()"
        );
        describe_counter!(
            "mempool_inserted_total",
            Unit::Count,
            "transactions admitted to Live via insert()"
        );
        describe_counter!(
            "mempool_dropped_total",
            Unit::Count,
            "transactions removed via drop() or block confirmation"
        );
        describe_counter!(
            "mempool_blocks_applied_total",
            Unit::Count,
            "blocks applied via apply_block()"
        );
        describe_counter!(
            "mempool_decode_errors_total",
            Unit::Count,
            "raw-transaction/raw-block payloads that failed to decode"
        );
        describe_counter!(
            "mempool_backfill_batch_failures_total",
            Unit::Count,
            "backfill batches skipped after an RPC failure"
        );
        describe_counter!(
            "mempool_backfill_item_failures_total",
            Unit::Count,
            "backfill items left Announced after a per-item RPC error"
        );

        Self {
            live_count: metrics::gauge!("mempool_live_count"),
            registered_total: metrics::counter!("mempool_registered_total"),
            inserted_total: metrics::counter!("mempool_inserted_total"),
            dropped_total: metrics::counter!("mempool_dropped_total"),
            blocks_applied_total: metrics::counter!("mempool_blocks_applied_total"),
            decode_errors_total: metrics::counter!("mempool_decode_errors_total"),
            backfill_batch_failures_total: metrics::counter!(
                "mempool_backfill_batch_failures_total"
            ),
            backfill_item_failures_total: metrics::counter!(
                "mempool_backfill_item_failures_total"
            ),
        }
    }
}
