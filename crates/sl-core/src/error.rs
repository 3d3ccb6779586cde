//! Core error types for the screenlink agent
//!
//! The taxonomy separates fatal startup errors (share server, required
//! tunnel, registration) from transient operational errors (heartbeat,
//! liveness checks) so callers can decide between abort and retry.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the agent
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// System probe error
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Screen-share provider error
    #[error("Screen share error: {0}")]
    Share(#[from] ShareError),

    /// Tunnel error
    #[error("Tunnel error: {0}")]
    Tunnel(#[from] TunnelError),

    /// Registration error
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// JSON parse error
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Failed to read or write the config file
    #[error("Config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// System probe errors
///
/// Probe failures are always recoverable; the caller falls back to
/// configured values.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Probe command could not be run
    #[error("Probe command failed: {0}")]
    CommandFailed(String),

    /// No probe strategy for this platform
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

/// Screen-share provider errors
#[derive(Error, Debug)]
pub enum ShareError {
    /// The screen-share server binary is not installed
    #[error("Screen-share server not found: {0}")]
    ServerNotFound(String),

    /// The server process could not be started
    #[error("Failed to start screen-share server: {0}")]
    StartFailed(String),

    /// The server process could not be stopped
    #[error("Failed to stop screen-share server: {0}")]
    StopFailed(String),

    /// No provider for this platform
    #[error("Screen sharing not supported on {0}")]
    UnsupportedPlatform(String),
}

/// Tunnel-related errors
#[derive(Error, Debug)]
pub enum TunnelError {
    /// No tunnel endpoint could be resolved from the configuration
    #[error("No tunnel endpoint configured and none derivable from the coordinator URL")]
    NoEndpoint,

    /// Private key file not found or unreadable
    #[error("Private key not found at {path}")]
    KeyNotFound { path: String },

    /// The outbound connection timed out
    #[error("Connection to {address} timed out")]
    ConnectTimeout { address: String },

    /// Authentication was rejected by the coordinator
    #[error("Authentication rejected by tunnel endpoint")]
    AuthRejected,

    /// The far end refused the reverse port-forward request
    #[error("Reverse forward for remote port {port} rejected")]
    ForwardRejected { port: u16 },

    /// All candidate remote ports were refused
    #[error("No remote port could be allocated after {attempts} attempts")]
    ForwardExhausted { attempts: u32 },

    /// Underlying transport failure
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Registration errors — a failed registration aborts startup
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// The request could not be sent or timed out
    #[error("Registration request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The coordinator answered with a non-success status
    #[error("Registration rejected: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The coordinator's response could not be parsed
    #[error("Invalid registration response: {0}")]
    InvalidResponse(String),
}

/// Heartbeat errors — logged by the heartbeat loop, never fatal
#[derive(Error, Debug)]
pub enum HeartbeatError {
    /// The request could not be sent or timed out
    #[error("Heartbeat request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The coordinator answered with a non-success status
    #[error("Heartbeat rejected: HTTP {status}")]
    Rejected { status: u16 },
}
