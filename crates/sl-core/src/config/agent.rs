//! Agent configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Configuration for the screenlink agent
///
/// Persisted as a JSON object; every key has a default, so a file carrying
/// any subset of keys loads cleanly with the rest filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Coordinator base URL (e.g. `https://coordinator.example.com`)
    pub server_url: String,

    /// Shared token presented at registration
    pub register_token: String,

    /// Machine name reported to the coordinator (defaults to the hostname)
    pub machine_name: String,

    /// Local screen-share (VNC) port
    pub vnc_port: u16,

    /// Number of attached monitors; overwritten by the probe at startup
    pub monitors: u32,

    /// Whether to report direct SSH access to the coordinator
    pub ssh_enabled: bool,

    /// Local SSH port for direct access
    pub ssh_port: u16,

    /// Username for direct SSH access
    pub ssh_username: String,

    /// Password for direct SSH access (empty when a key is used)
    pub ssh_password: String,

    /// Path to the private key reported for direct SSH access
    pub ssh_private_key_path: String,

    /// Whether to open the outbound reverse tunnel
    pub reverse_tunnel_enabled: bool,

    /// Tunnel endpoint host; empty means derive from `server_url`
    pub server_ssh_host: String,

    /// Tunnel endpoint port
    pub server_ssh_port: u16,

    /// Username for the tunnel endpoint
    pub server_ssh_username: String,

    /// Password for the tunnel endpoint (key auth is used when empty and
    /// `ssh_private_key_path` is set)
    pub server_ssh_password: String,

    /// Interval between heartbeats, stored as integer seconds
    #[serde(with = "duration_secs")]
    pub heartbeat_interval: Duration,

    /// Whether to start the local screen-share server at startup
    pub auto_start_vnc: bool,

    /// Password for the local screen-share server (empty disables auth)
    pub vnc_password: String,

    /// X11 display the share server attaches to
    pub display: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "https://your-screenlink-server.example".to_string(),
            register_token: "screenlink-register-token".to_string(),
            machine_name: gethostname::gethostname().to_string_lossy().into_owned(),
            vnc_port: 5900,
            monitors: 1,
            ssh_enabled: true,
            ssh_port: 22,
            ssh_username: String::new(),
            ssh_password: String::new(),
            ssh_private_key_path: String::new(),
            reverse_tunnel_enabled: true,
            server_ssh_host: String::new(),
            server_ssh_port: 22,
            server_ssh_username: "screenlink".to_string(),
            server_ssh_password: String::new(),
            heartbeat_interval: Duration::from_secs(30),
            auto_start_vnc: true,
            vnc_password: String::new(),
            display: ":0".to_string(),
        }
    }
}
