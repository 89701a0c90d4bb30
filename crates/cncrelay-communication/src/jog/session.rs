//! Continuous-jog session records

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Identifies the client connection that owns sessions
pub type ConnectionId = String;

/// Session lifecycle: `Starting -> Active -> Stopping -> Closed`
///
/// A closed session has already been removed from the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Start command in flight
    Starting,
    /// Motion running, timers armed
    Active,
    /// Finalize in progress
    Stopping,
    /// Finalized
    Closed,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Superseded by a new session with the same id
    Restarted,
    /// No heartbeat within the heartbeat timeout
    HeartbeatTimeout,
    /// Ran for the maximum allowed duration
    MaxDuration,
    /// Owning connection went away
    Disconnected,
    /// Explicit stop from the owner, with its stated reason
    Client(String),
}

impl StopReason {
    /// Wire name of the reason
    pub fn as_str(&self) -> &str {
        match self {
            Self::Restarted => "restarted",
            Self::HeartbeatTimeout => "heartbeat-timeout",
            Self::MaxDuration => "max-duration",
            Self::Disconnected => "disconnected",
            Self::Client(reason) => reason,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives stop notifications for the sessions a connection owns
pub trait JogClient: Send + Sync {
    /// Connection identity used for ownership checks
    fn connection_id(&self) -> &str;

    /// A session owned by this connection was finalized
    fn on_jog_stopped(&self, id: &str, reason: &StopReason);
}

/// Arc-wrapped client handle
pub type JogClientHandle = Arc<dyn JogClient>;

/// A live continuous-motion session
pub struct JogSession {
    pub(crate) id: String,
    pub(crate) owner: ConnectionId,
    pub(crate) client: JogClientHandle,
    pub(crate) command: String,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) last_heartbeat_at: Mutex<Instant>,
    pub(crate) state: Mutex<SessionState>,
    pub(crate) stopping: AtomicBool,
    pub(crate) heartbeat_timer: Mutex<Option<JoinHandle<()>>>,
    pub(crate) max_duration_timer: Mutex<Option<JoinHandle<()>>>,
}

impl JogSession {
    pub(crate) fn new(id: &str, command: &str, client: JogClientHandle) -> Self {
        Self {
            id: id.to_string(),
            owner: client.connection_id().to_string(),
            client,
            command: command.to_string(),
            started_at: Utc::now(),
            last_heartbeat_at: Mutex::new(Instant::now()),
            state: Mutex::new(SessionState::Starting),
            stopping: AtomicBool::new(false),
            heartbeat_timer: Mutex::new(None),
            max_duration_timer: Mutex::new(None),
        }
    }

    /// Claim the right to finalize; only the first caller gets `true`
    pub(crate) fn begin_stopping(&self) -> bool {
        !self.stopping.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    pub(crate) fn clear_timers(&self) {
        for timer in [&self.heartbeat_timer, &self.max_duration_timer] {
            if let Some(handle) = timer.lock().take() {
                handle.abort();
            }
        }
    }

    /// Point-in-time view of the session
    pub fn info(&self) -> JogSessionInfo {
        JogSessionInfo {
            id: self.id.clone(),
            owner: self.owner.clone(),
            command: self.command.clone(),
            started_at: self.started_at,
            state: *self.state.lock(),
        }
    }
}

impl fmt::Debug for JogSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JogSession")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("command", &self.command)
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// Snapshot of a session for callers outside the manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JogSessionInfo {
    /// Session id
    pub id: String,
    /// Owning connection
    pub owner: ConnectionId,
    /// Motion command that started the session
    pub command: String,
    /// When the start command was acknowledged
    pub started_at: DateTime<Utc>,
    /// Lifecycle state
    pub state: SessionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_reason_names() {
        assert_eq!(StopReason::HeartbeatTimeout.as_str(), "heartbeat-timeout");
        assert_eq!(StopReason::MaxDuration.to_string(), "max-duration");
        assert_eq!(StopReason::Client("user".to_string()).as_str(), "user");
    }
}
