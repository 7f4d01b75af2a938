//! Network configuration for the DHT transport layer.

use std::time::Duration;

/// Default listen address, matching the `-l` flag's default.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0";
pub const DEFAULT_LISTEN_PORT: u16 = 3000;

/// Configuration for the DHT transport node.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// IP address to listen on.
    pub listen_addr: String,
    /// TCP port to listen on.
    pub listen_port: u16,
    /// Bootstrap peer multiaddress to connect on startup (the `-c` flag).
    pub bootstrap_peer: Option<String>,
    /// Enable mDNS peer discovery (useful for local clusters).
    pub enable_mdns: bool,
    /// Gossipsub heartbeat interval.
    pub gossipsub_heartbeat: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            listen_port: DEFAULT_LISTEN_PORT,
            bootstrap_peer: None,
            enable_mdns: true,
            gossipsub_heartbeat: Duration::from_secs(1),
        }
    }
}

impl NetworkConfig {
    /// Build the libp2p multiaddr string for the configured listen address and port.
    pub fn listen_multiaddr(&self) -> String {
        format!("/ip4/{}/tcp/{}", self.listen_addr, self.listen_port)
    }
}
