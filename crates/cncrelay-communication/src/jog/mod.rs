//! Continuous jog with a dead-man switch
//!
//! A jog session moves the machine until the owning client stops it, stops
//! sending heartbeats, disconnects, or the session hits its maximum duration.

mod manager;
mod session;

pub use manager::{JogSessionManager, JogStarted};
pub use session::{
    ConnectionId, JogClient, JogClientHandle, JogSession, JogSessionInfo, SessionState,
    StopReason,
};

use serde::{Deserialize, Serialize};

use crate::transport::JOG_CANCEL;

/// Jog session tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JogConfig {
    /// Session is finalized this long after the last heartbeat (milliseconds)
    pub heartbeat_timeout_ms: u64,
    /// Hard cap on session length, never extended (milliseconds)
    pub max_duration_ms: u64,
    /// Realtime byte that cancels jog motion
    pub jog_cancel: u8,
}

impl Default for JogConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: 750,
            max_duration_ms: 15_000,
            jog_cancel: JOG_CANCEL,
        }
    }
}
