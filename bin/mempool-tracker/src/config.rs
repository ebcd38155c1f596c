//! CLI flags layered over an optional TOML config file.
//!
//! Mirrors every option enumerated in spec.md §6 (`rpc_endpoint`,
//! `rpc_credentials_or_cookie_path`, `notification_endpoints_per_kind`, `rpc_pool_count`,
//! `rpc_pool_size`, `target_profile`, `log_level`, `listen_port`), plus the reconciliation knobs
//! [`mempool_core::MempoolConfig`] already exposes. CLI flags win over the config file, matching
//! the teacher's own flag-over-file precedence; the file only supplies defaults for whatever the
//! command line omits.

use clap::Parser;
use mempool_core::{MempoolConfig, TargetProfile};
use mempool_tracing::LogLevel;
use serde::Deserialize;
use std::{net::SocketAddr, path::PathBuf};

/// `target_profile` as a CLI-friendly enum; converts into [`TargetProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileArg {
    /// A personal/private deployment: no spend index.
    Personal,
    /// A public-facing deployment: spend index enabled.
    Public,
}

impl From<ProfileArg> for TargetProfile {
    fn from(value: ProfileArg) -> Self {
        match value {
            ProfileArg::Personal => TargetProfile::Personal,
            ProfileArg::Public => TargetProfile::Public,
        }
    }
}

/// Command-line flags. Every field is optional so a config file can fill in what's missing; see
/// [`AppConfig::load`] for the merge.
#[derive(Debug, Parser)]
#[command(name = "mempool-tracker", about = "Live Bitcoin mempool tracker")]
pub struct Cli {
    /// Path to a TOML file supplying defaults for any flag not passed on the command line.
    #[arg(long, env = "MEMPOOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// The node's JSON-RPC endpoint, e.g. `http://127.0.0.1:8332`.
    #[arg(long, env = "MEMPOOL_RPC_ENDPOINT")]
    pub rpc_endpoint: Option<String>,

    /// Path to the node's `.cookie` file, re-read on every client construction.
    #[arg(long, env = "MEMPOOL_RPC_COOKIE_PATH")]
    pub rpc_cookie_path: Option<PathBuf>,

    /// RPC username, used together with `--rpc-password` instead of a cookie file.
    #[arg(long, env = "MEMPOOL_RPC_USER")]
    pub rpc_user: Option<String>,

    /// RPC password, used together with `--rpc-user` instead of a cookie file.
    #[arg(long, env = "MEMPOOL_RPC_PASSWORD")]
    pub rpc_password: Option<String>,

    /// ZMQ endpoint publishing the sequence-of-events stream, e.g. `tcp://127.0.0.1:28332`.
    #[arg(long, env = "MEMPOOL_ZMQ_SEQUENCE_ENDPOINT")]
    pub zmq_sequence_endpoint: Option<String>,

    /// ZMQ endpoint publishing raw transactions.
    #[arg(long, env = "MEMPOOL_ZMQ_RAWTX_ENDPOINT")]
    pub zmq_rawtx_endpoint: Option<String>,

    /// ZMQ endpoint publishing raw blocks.
    #[arg(long, env = "MEMPOOL_ZMQ_RAWBLOCK_ENDPOINT")]
    pub zmq_rawblock_endpoint: Option<String>,

    /// Number of independent RPC clients to round-robin backfill batches across.
    #[arg(long, env = "MEMPOOL_RPC_POOL_COUNT")]
    pub rpc_pool_count: Option<usize>,

    /// Reserved: per-client connection-pool size. `jsonrpsee`'s HTTP client manages its own
    /// keep-alive pool internally and exposes no tunable size, so this is carried through
    /// configuration and logged, not yet wired to a client setting.
    #[arg(long, env = "MEMPOOL_RPC_POOL_SIZE")]
    pub rpc_pool_size: Option<usize>,

    /// Which capability profile to run: `personal` (no spend index) or `public`.
    #[arg(long, value_enum, env = "MEMPOOL_TARGET_PROFILE")]
    pub target_profile: Option<ProfileArg>,

    /// Log verbosity.
    #[arg(long, value_enum, env = "MEMPOOL_LOG_LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Port the query/fan-out HTTP server listens on.
    #[arg(long, env = "MEMPOOL_LISTEN_PORT")]
    pub listen_port: Option<u16>,

    /// How many txids are requested per `getrawtransaction` batch during backfill.
    #[arg(long, env = "MEMPOOL_BACKFILL_BATCH_SIZE")]
    pub backfill_batch_size: Option<usize>,
}

/// The subset of [`Cli`] that may also arrive from a TOML file; all-optional by construction so a
/// partial file is valid.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
struct FileConfig {
    rpc_endpoint: Option<String>,
    rpc_cookie_path: Option<PathBuf>,
    rpc_user: Option<String>,
    rpc_password: Option<String>,
    zmq_sequence_endpoint: Option<String>,
    zmq_rawtx_endpoint: Option<String>,
    zmq_rawblock_endpoint: Option<String>,
    rpc_pool_count: Option<usize>,
    rpc_pool_size: Option<usize>,
    target_profile: Option<ProfileArg>,
    log_level: Option<LogLevel>,
    listen_port: Option<u16>,
    backfill_batch_size: Option<usize>,
}

/// How the RPC client authenticates, resolved from the merged configuration.
#[derive(Debug, Clone)]
pub enum RpcAuth {
    /// `user:password`, as configured directly.
    UserPass { user: String, password: String },
    /// Path to the node's `.cookie` file.
    CookieFile(PathBuf),
}

/// Fully resolved configuration: CLI flags layered over an optional file, with defaults filled
/// in for whatever neither provided.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// The node's JSON-RPC endpoint.
    pub rpc_endpoint: String,
    /// How the RPC client authenticates.
    pub rpc_auth: RpcAuth,
    /// ZMQ endpoint for the sequence stream.
    pub zmq_sequence_endpoint: String,
    /// ZMQ endpoint for the raw-transaction stream.
    pub zmq_rawtx_endpoint: String,
    /// ZMQ endpoint for the raw-block stream.
    pub zmq_rawblock_endpoint: String,
    /// How many independent RPC clients to round-robin across.
    pub rpc_pool_count: usize,
    /// Reserved per-client connection-pool size; see [`Cli::rpc_pool_size`].
    pub rpc_pool_size: usize,
    /// Which capabilities are enabled.
    pub target_profile: TargetProfile,
    /// Log verbosity.
    pub log_level: LogLevel,
    /// Port the query/fan-out HTTP server listens on.
    pub listen_address: SocketAddr,
    /// Reconciliation batching/retry knobs, passed straight through to the core.
    pub mempool: MempoolConfig,
}

impl AppConfig {
    /// Parses CLI flags, loads the optional config file, and merges the two (CLI wins).
    pub fn load() -> eyre::Result<Self> {
        let cli = Cli::parse();
        Self::from_cli(cli)
    }

    fn from_cli(cli: Cli) -> eyre::Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|e| eyre::eyre!("failed to read config file {}: {e}", path.display()))?;
                toml::from_str::<FileConfig>(&contents)
                    .map_err(|e| eyre::eyre!("failed to parse config file {}: {e}", path.display()))?
            }
            None => FileConfig::default(),
        };

        let rpc_endpoint = cli
            .rpc_endpoint
            .or(file.rpc_endpoint)
            .ok_or_else(|| eyre::eyre!("--rpc-endpoint is required (flag, env, or config file)"))?;

        let rpc_user = cli.rpc_user.or(file.rpc_user);
        let rpc_password = cli.rpc_password.or(file.rpc_password);
        let rpc_cookie_path = cli.rpc_cookie_path.or(file.rpc_cookie_path);
        let rpc_auth = match (rpc_user, rpc_password, rpc_cookie_path) {
            (Some(user), Some(password), _) => RpcAuth::UserPass { user, password },
            (_, _, Some(path)) => RpcAuth::CookieFile(path),
            _ => {
                return Err(eyre::eyre!(
                    "either --rpc-user/--rpc-password or --rpc-cookie-path must be set"
                ))
            }
        };

        let zmq_sequence_endpoint = cli
            .zmq_sequence_endpoint
            .or(file.zmq_sequence_endpoint)
            .ok_or_else(|| eyre::eyre!("--zmq-sequence-endpoint is required"))?;
        let zmq_rawtx_endpoint = cli
            .zmq_rawtx_endpoint
            .or(file.zmq_rawtx_endpoint)
            .ok_or_else(|| eyre::eyre!("--zmq-rawtx-endpoint is required"))?;
        let zmq_rawblock_endpoint = cli
            .zmq_rawblock_endpoint
            .or(file.zmq_rawblock_endpoint)
            .ok_or_else(|| eyre::eyre!("--zmq-rawblock-endpoint is required"))?;

        let target_profile: TargetProfile = cli
            .target_profile
            .or(file.target_profile)
            .unwrap_or(ProfileArg::Personal)
            .into();
        let log_level = cli.log_level.or(file.log_level).unwrap_or_default();
        let listen_port = cli.listen_port.or(file.listen_port).unwrap_or(8080);
        let rpc_pool_count = cli.rpc_pool_count.or(file.rpc_pool_count).unwrap_or(1).max(1);
        let rpc_pool_size = cli.rpc_pool_size.or(file.rpc_pool_size).unwrap_or(1).max(1);

        let mut mempool = MempoolConfig { target_profile, ..MempoolConfig::default() };
        if let Some(batch_size) = cli.backfill_batch_size.or(file.backfill_batch_size) {
            mempool.backfill_batch_size = batch_size;
        }
        Ok(Self {
            rpc_endpoint,
            rpc_auth,
            zmq_sequence_endpoint,
            zmq_rawtx_endpoint,
            zmq_rawblock_endpoint,
            rpc_pool_count,
            rpc_pool_size,
            target_profile,
            log_level,
            listen_address: SocketAddr::from(([0, 0, 0, 0], listen_port)),
            mempool,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            config: None,
            rpc_endpoint: Some("http://127.0.0.1:8332".into()),
            rpc_cookie_path: None,
            rpc_user: Some("user".into()),
            rpc_password: Some("pass".into()),
            zmq_sequence_endpoint: Some("tcp://127.0.0.1:28332".into()),
            zmq_rawtx_endpoint: Some("tcp://127.0.0.1:28333".into()),
            zmq_rawblock_endpoint: Some("tcp://127.0.0.1:28334".into()),
            rpc_pool_count: None,
            rpc_pool_size: None,
            target_profile: None,
            log_level: None,
            listen_port: None,
            backfill_batch_size: None,
        }
    }

    #[test]
    fn defaults_to_personal_profile_and_8080() {
        let config = AppConfig::from_cli(base_cli()).unwrap();
        assert_eq!(config.target_profile, TargetProfile::Personal);
        assert_eq!(config.listen_address.port(), 8080);
        assert_eq!(config.rpc_pool_count, 1);
    }

    #[test]
    fn requires_rpc_auth() {
        let mut cli = base_cli();
        cli.rpc_user = None;
        cli.rpc_password = None;
        assert!(AppConfig::from_cli(cli).is_err());
    }

    #[test]
    fn requires_all_three_zmq_endpoints() {
        let mut cli = base_cli();
        cli.zmq_rawblock_endpoint = None;
        assert!(AppConfig::from_cli(cli).is_err());
    }
}
