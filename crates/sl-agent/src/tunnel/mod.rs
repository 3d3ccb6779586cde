//! Reverse tunnel supervision
//!
//! The supervisor exclusively owns the current tunnel session. It
//! establishes the outbound secure session, allocates the reverse
//! port-forward, polls transport liveness, and replaces dead sessions.
//! Reconnection never gives up while the agent runs; it is paced by the
//! liveness poll interval.

pub mod ssh;

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use sl_core::config::AgentConfig;
use sl_core::error::TunnelError;
use sl_core::traits::{SecureTunnel, TunnelAuth, TunnelDialer, TunnelEndpoint};
use sl_core::types::TunnelState;

/// How often the keep-alive loop polls transport liveness
pub const LIVENESS_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Ephemeral range remote forward ports are drawn from
const REMOTE_PORT_RANGE: Range<u16> = 49152..65535;

/// Remote ports tried per establish before giving up
const REMOTE_PORT_ATTEMPTS: u32 = 8;

/// The current reverse-tunnel session
///
/// The transport slot is emptied exactly once, either when the session is
/// lost or when the supervisor closes it.
struct TunnelSession {
    transport: Option<Box<dyn SecureTunnel>>,
    remote_port: u16,
    local_port: u16,
    state: TunnelState,
}

/// Owns and supervises the reverse tunnel
pub struct TunnelSupervisor {
    dialer: Arc<dyn TunnelDialer>,
    endpoint: TunnelEndpoint,
    session: Mutex<Option<TunnelSession>>,
}

impl TunnelSupervisor {
    /// Build a supervisor from the agent configuration
    pub fn from_config(
        config: &AgentConfig,
        dialer: Arc<dyn TunnelDialer>,
    ) -> Result<Self, TunnelError> {
        let endpoint = resolve_endpoint(config)?;
        Ok(Self {
            dialer,
            endpoint,
            session: Mutex::new(None),
        })
    }

    /// Establish a fresh session, replacing any existing one
    ///
    /// Returns the confirmed remote port of the reverse forward. The
    /// previous session's transport, if any, is released first so two live
    /// sessions never coexist.
    pub async fn establish(&self) -> Result<u16, TunnelError> {
        let mut slot = self.session.lock().await;

        if let Some(mut old) = slot.take() {
            release_transport(&mut old).await;
        }

        tracing::debug!("Dialing tunnel endpoint {}", self.endpoint.address());
        let mut transport = self.dialer.dial(&self.endpoint).await?;

        let remote_port = match allocate_remote_forward(transport.as_mut()).await {
            Ok(port) => port,
            Err(e) => {
                if let Err(close_err) = transport.close().await {
                    tracing::debug!("Closing transport after failed forward: {}", close_err);
                }
                return Err(e);
            }
        };

        tracing::info!(
            "Reverse tunnel up: remote port {} -> local port {}",
            remote_port,
            self.endpoint.local_port
        );

        *slot = Some(TunnelSession {
            transport: Some(transport),
            remote_port,
            local_port: self.endpoint.local_port,
            state: TunnelState::Active,
        });

        Ok(remote_port)
    }

    /// One liveness poll step
    ///
    /// If the transport reports inactive the session is marked lost, its
    /// transport released, and exactly one re-establish is attempted. A
    /// failed attempt leaves the session lost; the next poll retries.
    pub async fn check_and_recover(&self) -> TunnelState {
        {
            let mut slot = self.session.lock().await;
            match slot.as_mut() {
                Some(session) if session.state == TunnelState::Active => {
                    let alive = session
                        .transport
                        .as_ref()
                        .map(|t| t.is_alive())
                        .unwrap_or(false);
                    if alive {
                        return TunnelState::Active;
                    }
                    tracing::warn!("Tunnel transport inactive, marking session lost");
                    session.state = TunnelState::Lost;
                    release_transport(session).await;
                }
                Some(_) => {
                    // Lost from an earlier poll; fall through to retry
                }
                None => {
                    // Nothing established yet; nothing to recover
                    return TunnelState::Closed;
                }
            }
        }

        match self.establish().await {
            Ok(port) => {
                tracing::info!("Tunnel re-established on remote port {}", port);
                TunnelState::Active
            }
            Err(e) => {
                tracing::warn!("Tunnel re-establish failed, will retry: {}", e);
                let mut slot = self.session.lock().await;
                if slot.is_none() {
                    // Keep a lost placeholder so the next poll retries
                    *slot = Some(TunnelSession {
                        transport: None,
                        remote_port: 0,
                        local_port: self.endpoint.local_port,
                        state: TunnelState::Lost,
                    });
                }
                TunnelState::Lost
            }
        }
    }

    /// Close the current session
    ///
    /// The underlying transport is released at most once per session, even
    /// when the session was already lost. Safe to call repeatedly.
    pub async fn close(&self) {
        let mut slot = self.session.lock().await;
        if let Some(mut session) = slot.take() {
            session.state = TunnelState::Closed;
            release_transport(&mut session).await;
            tracing::info!(
                "Tunnel session closed (remote {} -> local {})",
                session.remote_port,
                session.local_port
            );
        }
    }

    /// The confirmed remote port of the current session, if active
    pub async fn remote_port(&self) -> Option<u16> {
        let slot = self.session.lock().await;
        slot.as_ref()
            .filter(|s| s.state == TunnelState::Active)
            .map(|s| s.remote_port)
    }

    /// Liveness state of the current session, if any
    pub async fn session_state(&self) -> Option<TunnelState> {
        let slot = self.session.lock().await;
        slot.as_ref().map(|s| s.state)
    }
}

/// Release a session's transport, if it still holds one
async fn release_transport(session: &mut TunnelSession) {
    if let Some(mut transport) = session.transport.take() {
        if let Err(e) = transport.close().await {
            tracing::debug!("Tunnel transport close: {}", e);
        }
    }
}

/// Request a reverse forward, retrying refused ports with fresh candidates
async fn allocate_remote_forward(transport: &mut dyn SecureTunnel) -> Result<u16, TunnelError> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let candidate = rand::thread_rng().gen_range(REMOTE_PORT_RANGE);
        match transport.open_reverse_forward(candidate).await {
            Ok(port) => return Ok(port),
            Err(TunnelError::ForwardRejected { port }) if attempts < REMOTE_PORT_ATTEMPTS => {
                tracing::debug!("Remote port {} refused, trying another", port);
            }
            Err(TunnelError::ForwardRejected { .. }) => {
                return Err(TunnelError::ForwardExhausted { attempts });
            }
            Err(e) => return Err(e),
        }
    }
}

/// Resolve the tunnel endpoint from the configuration
///
/// An explicit `server_ssh_host` wins; otherwise the hostname of
/// `server_url` is used.
fn resolve_endpoint(config: &AgentConfig) -> Result<TunnelEndpoint, TunnelError> {
    let host = if !config.server_ssh_host.is_empty() {
        config.server_ssh_host.clone()
    } else {
        reqwest::Url::parse(&config.server_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_owned))
            .ok_or(TunnelError::NoEndpoint)?
    };

    let auth = if !config.server_ssh_password.is_empty() {
        TunnelAuth::Password(config.server_ssh_password.clone())
    } else if !config.ssh_private_key_path.is_empty() {
        TunnelAuth::PrivateKey(config.ssh_private_key_path.clone().into())
    } else {
        TunnelAuth::Password(String::new())
    };

    Ok(TunnelEndpoint {
        host,
        port: config.server_ssh_port,
        username: config.server_ssh_username.clone(),
        auth,
        local_port: config.vnc_port,
    })
}

/// Keep-alive loop: polls liveness until cancelled
pub async fn run_keepalive_loop(
    supervisor: Arc<TunnelSupervisor>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Tunnel keep-alive loop stopping");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        let state = supervisor.check_and_recover().await;
        tracing::trace!("Tunnel liveness poll: {}", state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Transport whose liveness is scripted: reports alive for
    /// `alive_polls` checks, then inactive.
    struct ScriptedTunnel {
        alive_remaining: AtomicI64,
        reject_forwards: AtomicI64,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SecureTunnel for ScriptedTunnel {
        async fn open_reverse_forward(&mut self, remote_port: u16) -> Result<u16, TunnelError> {
            if self.reject_forwards.fetch_sub(1, Ordering::SeqCst) > 0 {
                return Err(TunnelError::ForwardRejected { port: remote_port });
            }
            Ok(remote_port)
        }

        fn is_alive(&self) -> bool {
            self.alive_remaining.fetch_sub(1, Ordering::SeqCst) > 0
        }

        async fn close(&mut self) -> Result<(), TunnelError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Scripted outcome for one dial
    enum Dial {
        /// Transport alive for N polls, rejecting the first M forwards
        Up { alive_polls: i64, reject_forwards: i64 },
        /// Dial fails
        Fail,
    }

    struct ScriptedDialer {
        script: StdMutex<VecDeque<Dial>>,
        dials: AtomicUsize,
        closes: Arc<AtomicUsize>,
    }

    impl ScriptedDialer {
        fn new(script: Vec<Dial>) -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(script.into()),
                dials: AtomicUsize::new(0),
                closes: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn dial_count(&self) -> usize {
            self.dials.load(Ordering::SeqCst)
        }

        fn close_count(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TunnelDialer for ScriptedDialer {
        async fn dial(
            &self,
            _endpoint: &TunnelEndpoint,
        ) -> Result<Box<dyn SecureTunnel>, TunnelError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            let outcome = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Dial::Up {
                    alive_polls: i64::MAX,
                    reject_forwards: 0,
                });
            match outcome {
                Dial::Up {
                    alive_polls,
                    reject_forwards,
                } => Ok(Box::new(ScriptedTunnel {
                    alive_remaining: AtomicI64::new(alive_polls),
                    reject_forwards: AtomicI64::new(reject_forwards),
                    closes: Arc::clone(&self.closes),
                })),
                Dial::Fail => Err(TunnelError::Transport("connection refused".into())),
            }
        }
    }

    fn tunnel_config() -> AgentConfig {
        let mut config = AgentConfig::default();
        config.server_ssh_host = "tunnel.example.net".to_string();
        config.server_ssh_password = "secret".to_string();
        config.vnc_port = 5900;
        config
    }

    fn supervisor(dialer: Arc<ScriptedDialer>) -> TunnelSupervisor {
        TunnelSupervisor::from_config(&tunnel_config(), dialer).unwrap()
    }

    #[tokio::test]
    async fn test_establish_reports_remote_port() {
        let dialer = ScriptedDialer::new(vec![]);
        let supervisor = supervisor(Arc::clone(&dialer));

        let port = supervisor.establish().await.unwrap();
        assert!(REMOTE_PORT_RANGE.contains(&port));
        assert_eq!(supervisor.remote_port().await, Some(port));
        assert_eq!(supervisor.session_state().await, Some(TunnelState::Active));
        assert_eq!(dialer.dial_count(), 1);
    }

    #[tokio::test]
    async fn test_loss_triggers_single_redial_per_poll() {
        // First transport dies after one poll, replacement stays up
        let dialer = ScriptedDialer::new(vec![
            Dial::Up {
                alive_polls: 1,
                reject_forwards: 0,
            },
            Dial::Up {
                alive_polls: i64::MAX,
                reject_forwards: 0,
            },
        ]);
        let supervisor = supervisor(Arc::clone(&dialer));

        supervisor.establish().await.unwrap();
        assert_eq!(supervisor.check_and_recover().await, TunnelState::Active);
        assert_eq!(dialer.dial_count(), 1);

        // Transport now reports inactive: one loss, one redial
        assert_eq!(supervisor.check_and_recover().await, TunnelState::Active);
        assert_eq!(dialer.dial_count(), 2);
        // The dead transport was released before its replacement came up
        assert_eq!(dialer.close_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_recovery_retries_forever() {
        let dialer = ScriptedDialer::new(vec![
            Dial::Up {
                alive_polls: 0,
                reject_forwards: 0,
            },
            Dial::Fail,
            Dial::Fail,
            Dial::Up {
                alive_polls: i64::MAX,
                reject_forwards: 0,
            },
        ]);
        let supervisor = supervisor(Arc::clone(&dialer));

        supervisor.establish().await.unwrap();

        // Loss detected, both redial attempts fail; state stays lost
        assert_eq!(supervisor.check_and_recover().await, TunnelState::Lost);
        assert_eq!(supervisor.check_and_recover().await, TunnelState::Lost);
        assert_eq!(supervisor.session_state().await, Some(TunnelState::Lost));

        // The next poll succeeds
        assert_eq!(supervisor.check_and_recover().await, TunnelState::Active);
        assert_eq!(dialer.dial_count(), 4);
    }

    #[tokio::test]
    async fn test_close_releases_transport_exactly_once() {
        let dialer = ScriptedDialer::new(vec![]);
        let supervisor = supervisor(Arc::clone(&dialer));

        supervisor.establish().await.unwrap();
        supervisor.close().await;
        supervisor.close().await;
        assert_eq!(dialer.close_count(), 1);
        assert_eq!(supervisor.session_state().await, None);
    }

    #[tokio::test]
    async fn test_close_after_loss_releases_once() {
        let dialer = ScriptedDialer::new(vec![
            Dial::Up {
                alive_polls: 0,
                reject_forwards: 0,
            },
            Dial::Fail,
        ]);
        let supervisor = supervisor(Arc::clone(&dialer));

        supervisor.establish().await.unwrap();
        // Loss releases the transport; recovery fails
        assert_eq!(supervisor.check_and_recover().await, TunnelState::Lost);
        assert_eq!(dialer.close_count(), 1);

        // Closing the lost session must not release it again
        supervisor.close().await;
        assert_eq!(dialer.close_count(), 1);
    }

    #[tokio::test]
    async fn test_forward_refusals_retry_other_ports() {
        let dialer = ScriptedDialer::new(vec![Dial::Up {
            alive_polls: i64::MAX,
            reject_forwards: 3,
        }]);
        let supervisor = supervisor(Arc::clone(&dialer));

        let port = supervisor.establish().await.unwrap();
        assert!(REMOTE_PORT_RANGE.contains(&port));
    }

    #[tokio::test]
    async fn test_forward_exhaustion_fails_and_closes() {
        let dialer = ScriptedDialer::new(vec![Dial::Up {
            alive_polls: i64::MAX,
            reject_forwards: i64::MAX,
        }]);
        let supervisor = supervisor(Arc::clone(&dialer));

        let result = supervisor.establish().await;
        assert!(matches!(result, Err(TunnelError::ForwardExhausted { .. })));
        // The transport never became a session and was released
        assert_eq!(dialer.close_count(), 1);
        assert_eq!(supervisor.session_state().await, None);
    }

    #[test]
    fn test_endpoint_explicit_host_wins() {
        let mut config = tunnel_config();
        config.server_url = "https://coordinator.example.com".to_string();
        let endpoint = resolve_endpoint(&config).unwrap();
        assert_eq!(endpoint.host, "tunnel.example.net");
        assert_eq!(endpoint.port, 22);
        assert_eq!(endpoint.local_port, 5900);
    }

    #[test]
    fn test_endpoint_derived_from_server_url() {
        let mut config = tunnel_config();
        config.server_ssh_host = String::new();
        config.server_url = "https://coordinator.example.com:8443/base".to_string();
        let endpoint = resolve_endpoint(&config).unwrap();
        assert_eq!(endpoint.host, "coordinator.example.com");
    }

    #[test]
    fn test_endpoint_unresolvable() {
        let mut config = tunnel_config();
        config.server_ssh_host = String::new();
        config.server_url = "not a url".to_string();
        assert!(matches!(
            resolve_endpoint(&config),
            Err(TunnelError::NoEndpoint)
        ));
    }

    #[test]
    fn test_endpoint_key_auth_when_no_password() {
        let mut config = tunnel_config();
        config.server_ssh_password = String::new();
        config.ssh_private_key_path = "/home/op/.ssh/id_ed25519".to_string();
        let endpoint = resolve_endpoint(&config).unwrap();
        assert!(matches!(endpoint.auth, TunnelAuth::PrivateKey(_)));
    }
}
