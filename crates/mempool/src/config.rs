use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which capabilities the tracker advertises.
///
/// Only [`TargetProfile::Public`] enables the spend index: in [`TargetProfile::Personal`] mode
/// `lookup_spend` always returns `None` and the spend cache is never populated, so the tracker
/// carries no memory cost for a capability nobody downstream of a personal deployment needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetProfile {
    /// A personal/private deployment: no spend index.
    Personal,
    /// A public-facing deployment: spend index enabled.
    Public,
}

impl TargetProfile {
    /// Whether this profile enables the spend index.
    pub fn spend_index_enabled(self) -> bool {
        matches!(self, Self::Public)
    }
}

/// Configuration for the mempool core: batching, retry, and capability knobs.
///
/// The remaining configuration surface named in the design notes (`rpc_endpoint`,
/// `rpc_credentials_or_cookie_path`, `notification_endpoints_per_kind`, `rpc_pool_count`,
/// `rpc_pool_size`, `log_level`, `listen_port`) belongs to the collaborators the core is generic
/// over (the RPC client, the notification transport, the logging init) and to the binary that
/// wires them together, not to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolConfig {
    /// Which capabilities are enabled.
    pub target_profile: TargetProfile,
    /// How many txids are requested per `getrawtransaction` batch during backfill.
    #[serde(default = "MempoolConfig::default_backfill_batch_size")]
    pub backfill_batch_size: usize,
    /// How long to sleep between backfill batches, to cap RPC pressure on the node.
    #[serde(with = "humantime_serde", default = "MempoolConfig::default_backfill_batch_interval")]
    pub backfill_batch_interval: Duration,
    /// How long to wait before retrying the initial snapshot RPC after a failure.
    #[serde(with = "humantime_serde", default = "MempoolConfig::default_snapshot_retry_interval")]
    pub snapshot_retry_interval: Duration,
}

impl MempoolConfig {
    const fn default_backfill_batch_size() -> usize {
        50
    }

    const fn default_backfill_batch_interval() -> Duration {
        Duration::from_millis(250)
    }

    const fn default_snapshot_retry_interval() -> Duration {
        Duration::from_secs(10)
    }
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            target_profile: TargetProfile::Personal,
            backfill_batch_size: Self::default_backfill_batch_size(),
            backfill_batch_interval: Self::default_backfill_batch_interval(),
            snapshot_retry_interval: Self::default_snapshot_retry_interval(),
        }
    }
}
