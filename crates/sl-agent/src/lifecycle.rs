//! Agent lifecycle orchestration
//!
//! Drives startup in dependency order (probe, screen-share server,
//! reverse tunnel, registration), runs the concurrent heartbeat and
//! tunnel keep-alive loops, and performs bounded, idempotent shutdown.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sl_core::config::AgentConfig;
use sl_core::error::AgentError;
use sl_core::traits::{ScreenShareProvider, SystemProbe, TunnelDialer};
use sl_core::types::{ConnectionId, ConnectionRecord};

use crate::registration::RegistrationClient;
use crate::tunnel::{self, TunnelSupervisor};

/// Bounded wait per worker loop during shutdown
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Grace period for the share server to come up before tunneling
const SHARE_STARTUP_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle phases from process start to stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Init,
    Probing,
    StartingShare,
    EstablishingTunnel,
    Registering,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecyclePhase::Init => write!(f, "init"),
            LifecyclePhase::Probing => write!(f, "probing"),
            LifecyclePhase::StartingShare => write!(f, "starting-share"),
            LifecyclePhase::EstablishingTunnel => write!(f, "establishing-tunnel"),
            LifecyclePhase::Registering => write!(f, "registering"),
            LifecyclePhase::Running => write!(f, "running"),
            LifecyclePhase::Stopping => write!(f, "stopping"),
            LifecyclePhase::Stopped => write!(f, "stopped"),
        }
    }
}

/// Orchestrates the agent from startup through shutdown
pub struct AgentLifecycle {
    config: AgentConfig,
    probe: Arc<dyn SystemProbe>,
    share: Arc<dyn ScreenShareProvider>,
    client: Arc<RegistrationClient>,
    dialer: Arc<dyn TunnelDialer>,
    record: Arc<RwLock<ConnectionRecord>>,
    supervisor: Option<Arc<TunnelSupervisor>>,
    phase_tx: watch::Sender<LifecyclePhase>,
    cancel: CancellationToken,
    workers: Vec<(&'static str, JoinHandle<()>)>,
}

impl AgentLifecycle {
    pub fn new(
        config: AgentConfig,
        probe: Arc<dyn SystemProbe>,
        share: Arc<dyn ScreenShareProvider>,
        client: Arc<RegistrationClient>,
        dialer: Arc<dyn TunnelDialer>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(LifecyclePhase::Init);
        Self {
            config,
            probe,
            share,
            client,
            dialer,
            record: Arc::new(RwLock::new(ConnectionRecord::new())),
            supervisor: None,
            phase_tx,
            cancel: CancellationToken::new(),
            workers: Vec::new(),
        }
    }

    /// Run the startup sequence and enter `Running`
    ///
    /// Returns an error — without entering `Running` — when the share
    /// server cannot start, when the tunnel cannot be established while
    /// enabled, or when registration is rejected.
    pub async fn start(&mut self) -> Result<(), AgentError> {
        self.set_phase(LifecyclePhase::Probing);
        let mut share_server = None;
        match self.probe.detect().await {
            Ok(facts) => {
                if facts.monitors > 0 {
                    self.config.monitors = facts.monitors;
                }
                share_server = facts.share_server;
                tracing::info!("Detected {} monitor(s)", self.config.monitors);
            }
            Err(e) => {
                tracing::warn!("System probe failed, keeping configured facts: {}", e);
            }
        }

        self.set_phase(LifecyclePhase::StartingShare);
        if self.config.auto_start_vnc {
            match &share_server {
                Some(path) => tracing::debug!("Screen-share server binary: {:?}", path),
                None => tracing::warn!("Probe found no screen-share server binary"),
            }
            self.share.start(&self.config).await?;
            tracing::info!(
                "Screen-share server ({}) listening on port {}",
                self.share.name(),
                self.config.vnc_port
            );
            tokio::time::sleep(SHARE_STARTUP_GRACE).await;
        } else {
            tracing::info!("Screen-share auto-start disabled");
        }

        let mut tunnel_port = None;
        if self.config.reverse_tunnel_enabled {
            self.set_phase(LifecyclePhase::EstablishingTunnel);
            let supervisor = Arc::new(TunnelSupervisor::from_config(
                &self.config,
                Arc::clone(&self.dialer),
            )?);
            let port = supervisor.establish().await?;
            tunnel_port = Some(port);
            self.supervisor = Some(supervisor);
        }

        self.set_phase(LifecyclePhase::Registering);
        let id = self.client.register(&self.config, tunnel_port).await?;
        tracing::info!("Registered with coordinator, connection ID {}", id);
        self.record.write().await.mark_registered(id);

        self.set_phase(LifecyclePhase::Running);
        self.spawn_workers();
        Ok(())
    }

    /// Start, then block until the shutdown token fires, then stop
    pub async fn run_until(&mut self, shutdown: CancellationToken) -> Result<(), AgentError> {
        self.start().await?;
        shutdown.cancelled().await;
        self.stop().await;
        Ok(())
    }

    /// Shut down the agent
    ///
    /// Cancels the worker loops, joins each within a bounded timeout
    /// (proceeding with a warning on overrun), and closes the tunnel
    /// session. Safe to call any number of times.
    pub async fn stop(&mut self) {
        self.set_phase(LifecyclePhase::Stopping);
        self.cancel.cancel();

        for (name, handle) in self.workers.drain(..) {
            match tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, handle).await {
                Ok(_) => tracing::debug!("{} loop exited", name),
                Err(_) => tracing::warn!(
                    "{} loop did not exit within {:?}, proceeding",
                    name,
                    SHUTDOWN_JOIN_TIMEOUT
                ),
            }
        }

        if let Some(supervisor) = &self.supervisor {
            supervisor.close().await;
        }

        self.set_phase(LifecyclePhase::Stopped);
        tracing::info!("Agent stopped");
    }

    fn spawn_workers(&mut self) {
        let heartbeat = tokio::spawn(run_heartbeat_loop(
            Arc::clone(&self.client),
            Arc::clone(&self.record),
            self.config.heartbeat_interval,
            self.cancel.clone(),
        ));
        self.workers.push(("heartbeat", heartbeat));

        if let Some(supervisor) = &self.supervisor {
            let keepalive = tokio::spawn(tunnel::run_keepalive_loop(
                Arc::clone(supervisor),
                tunnel::LIVENESS_POLL_INTERVAL,
                self.cancel.clone(),
            ));
            self.workers.push(("tunnel-keepalive", keepalive));
        }
    }

    fn set_phase(&self, phase: LifecyclePhase) {
        tracing::debug!("Lifecycle phase: {}", phase);
        self.phase_tx.send_replace(phase);
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> LifecyclePhase {
        *self.phase_tx.borrow()
    }

    /// Watch phase transitions
    pub fn subscribe_phase(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase_tx.subscribe()
    }

    /// The coordinator-issued connection ID, once registered
    pub async fn connection_id(&self) -> Option<ConnectionId> {
        self.record.read().await.connection_id().cloned()
    }
}

/// Heartbeat loop: one bounded call per interval while registered
///
/// While no connection ID is set the tick is skipped entirely; failures
/// are logged and the loop continues on its next tick.
pub async fn run_heartbeat_loop(
    client: Arc<RegistrationClient>,
    record: Arc<RwLock<ConnectionRecord>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Heartbeat loop stopping");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        let maybe_id = record.read().await.connection_id().cloned();
        match maybe_id {
            Some(id) => {
                if let Err(e) = client.heartbeat(&id).await {
                    tracing::warn!("Heartbeat failed: {}", e);
                }
            }
            None => {
                tracing::trace!("Not registered yet, skipping heartbeat");
            }
        }
    }
}
