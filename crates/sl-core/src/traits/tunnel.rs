//! Secure tunnel traits
//!
//! The supervisor drives the tunnel through these traits so its recovery
//! logic can be exercised against scripted in-memory transports.

use async_trait::async_trait;

use crate::error::TunnelError;

/// Where and how the outbound tunnel connects
#[derive(Debug, Clone)]
pub struct TunnelEndpoint {
    /// Endpoint hostname or IP
    pub host: String,
    /// Endpoint port
    pub port: u16,
    /// Username for authentication
    pub username: String,
    /// Authentication material
    pub auth: TunnelAuth,
    /// Local port forwarded connections are bridged to
    pub local_port: u16,
}

impl TunnelEndpoint {
    /// The `host:port` address string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Authentication material for the tunnel endpoint
#[derive(Debug, Clone)]
pub enum TunnelAuth {
    /// Password authentication
    Password(String),
    /// Private key authentication
    PrivateKey(std::path::PathBuf),
}

/// An established outbound secure session
#[async_trait]
pub trait SecureTunnel: Send {
    /// Request a reverse port-forward of `remote_port` on the far end to
    /// the local port this tunnel was dialed for. Returns the confirmed
    /// remote port.
    async fn open_reverse_forward(&mut self, remote_port: u16) -> Result<u16, TunnelError>;

    /// Whether the underlying transport still reports active
    fn is_alive(&self) -> bool;

    /// Close the transport. Must be safe to call once per session even
    /// after the transport has already died.
    async fn close(&mut self) -> Result<(), TunnelError>;
}

/// Opens outbound secure sessions
#[async_trait]
pub trait TunnelDialer: Send + Sync {
    /// Connect and authenticate to the endpoint
    async fn dial(&self, endpoint: &TunnelEndpoint) -> Result<Box<dyn SecureTunnel>, TunnelError>;
}
