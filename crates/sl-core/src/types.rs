//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

/// Opaque connection identifier issued by the coordinator on registration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a new connection ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Registration status with the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationStatus {
    /// Not yet registered; heartbeats must not be sent
    Unregistered,
    /// Registered; heartbeats are keyed by the connection ID
    Registered,
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationStatus::Unregistered => write!(f, "unregistered"),
            RegistrationStatus::Registered => write!(f, "registered"),
        }
    }
}

/// The agent's registration with the coordinator
///
/// The connection ID is absent until registration succeeds. Heartbeats and
/// tunnel-port reporting are only valid while `Registered`.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRecord {
    connection_id: Option<ConnectionId>,
}

impl ConnectionRecord {
    /// Create an unregistered record
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful registration
    pub fn mark_registered(&mut self, id: ConnectionId) {
        self.connection_id = Some(id);
    }

    /// Drop the registration
    pub fn clear(&mut self) {
        self.connection_id = None;
    }

    /// The coordinator-issued connection ID, if registered
    pub fn connection_id(&self) -> Option<&ConnectionId> {
        self.connection_id.as_ref()
    }

    /// Current registration status
    pub fn status(&self) -> RegistrationStatus {
        if self.connection_id.is_some() {
            RegistrationStatus::Registered
        } else {
            RegistrationStatus::Unregistered
        }
    }
}

/// Liveness state of the reverse tunnel session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    /// Establishment in progress
    Connecting,
    /// Transport is up and the reverse forward is in place
    Active,
    /// Transport went inactive; a re-establish will be attempted
    Lost,
    /// Session was closed by the supervisor
    Closed,
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelState::Connecting => write!(f, "connecting"),
            TunnelState::Active => write!(f, "active"),
            TunnelState::Lost => write!(f, "lost"),
            TunnelState::Closed => write!(f, "closed"),
        }
    }
}

/// Ephemeral liveness tick produced by the heartbeat loop; not persisted
#[derive(Debug, Clone)]
pub struct HeartbeatTick {
    /// Status label sent to the coordinator
    pub status: &'static str,
    /// When the tick was produced
    pub sent_at: SystemTime,
}

impl HeartbeatTick {
    /// A "connected" tick stamped with the current time
    pub fn connected() -> Self {
        Self {
            status: "connected",
            sent_at: SystemTime::now(),
        }
    }
}

/// Facts about the local machine reported by the system probe
#[derive(Debug, Clone, Default)]
pub struct MachineFacts {
    /// Number of attached monitors
    pub monitors: u32,
    /// Located screen-share server binary, if any
    pub share_server: Option<PathBuf>,
}
