//! Node configuration, resolved from CLI flags.
//!
//! Provides [`NodeConfig`] plus the `data_dir`-relative path helpers
//! (`wallets_dir`/`chain_dir`/`unspent_dir`) every persistence call builds
//! paths from.

use std::path::PathBuf;

use chaindht_net::NetworkConfig;

/// A pending send requested via the `-S amount:dest` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendSpec {
    pub amount: u64,
    pub destination: String,
}

impl SendSpec {
    /// Parse the `amount:dest` CLI argument.
    pub fn parse(raw: &str) -> Option<Self> {
        let (amount_str, dest) = raw.split_once(':')?;
        let amount: u64 = amount_str.parse().ok()?;
        Some(Self { amount, destination: dest.to_string() })
    }
}

/// Configuration for a node instance, resolved from CLI flags.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Root directory for all persistent data (`-f`).
    pub data_dir: PathBuf,
    /// DHT transport configuration (`-c` bootstrap, `-l` listen).
    pub network: NetworkConfig,
    /// Run the miner (`-m`).
    pub mine: bool,
    /// Print known wallet addresses and exit (`-w`).
    pub print_wallets: bool,
    /// Print stats periodically instead of running a GUI (`-s`).
    pub stats_mode: bool,
    /// Disable the GUI even if compiled in (`-g`).
    pub no_gui: bool,
    /// A one-shot send to perform at startup (`-S`).
    pub send: Option<SendSpec>,
    /// Local test-cluster size (`-n`), 1 for a normal node.
    pub cluster_size: u32,
    /// Verbosity level 0..5 (`-v`), mapped to a tracing filter.
    pub verbosity: u8,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("chaindht");

        Self {
            data_dir,
            network: NetworkConfig::default(),
            mine: false,
            print_wallets: false,
            stats_mode: false,
            no_gui: false,
            send: None,
            cluster_size: 1,
            verbosity: 0,
        }
    }
}

impl NodeConfig {
    pub fn wallets_dir(&self) -> PathBuf {
        self.data_dir.join("wallets")
    }

    pub fn chain_dir(&self) -> PathBuf {
        self.data_dir.join("chain")
    }

    pub fn unspent_dir(&self) -> PathBuf {
        self.data_dir.join("unspent")
    }

    /// Tracing filter directive implied by `-v 0..5`, generalizing the
    /// teacher's `log_level` string config to a numeric verbosity scale.
    pub fn log_level(&self) -> &'static str {
        match self.verbosity {
            0 => "error",
            1 => "warn",
            2 => "info",
            3 => "debug",
            _ => "trace",
        }
    }
}
