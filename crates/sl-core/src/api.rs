//! Coordinator HTTP API payloads
//!
//! Wire types for `POST /api/vnc/register` and
//! `PUT /api/vnc/heartbeat/{connectionId}`. Field names follow the
//! coordinator's camelCase convention; optional blocks are omitted
//! entirely when the corresponding feature is disabled.

use serde::{Deserialize, Serialize};

/// Registration request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Machine name shown in the coordinator UI
    pub name: String,
    /// Public (or local-network fallback) address of this machine
    pub host: String,
    /// Local screen-share port
    pub vnc_port: u16,
    /// Number of attached monitors
    pub monitors: u32,
    /// Shared registration token
    pub auth_token: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_private_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse_tunnel_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel_type: Option<String>,
    #[serde(rename = "localVNCPort", skip_serializing_if = "Option::is_none")]
    pub local_vnc_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tunnel_port: Option<u16>,
}

/// Registration response body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    /// Coordinator-issued connection identifier
    pub connection_id: String,
}

/// Heartbeat request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    /// Status label, always "connected" while the agent runs
    pub status: String,
}

/// Tunnel type label reported for reverse SSH tunnels
pub const TUNNEL_TYPE_SSH_REVERSE: &str = "ssh_reverse";
