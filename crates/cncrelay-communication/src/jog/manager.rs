//! Jog session manager
//!
//! Owns every continuous-jog session, indexed by id and by owning
//! connection. Each session is guarded by two timers: a heartbeat timeout
//! reset by every heartbeat, and a fixed max-duration timeout. Whichever of
//! timer expiry, explicit stop, restart, or disconnect comes first finalizes
//! the session; the rest are no-ops.

use chrono::{DateTime, Utc};
use cncrelay_core::{
    generate_command_id, AppEvent, EventBus, JogError, JogEvent, Meta, META_COMPLETES_ID,
    META_STOP_REASON,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use super::session::{
    ConnectionId, JogClientHandle, JogSession, JogSessionInfo, SessionState, StopReason,
};
use super::JogConfig;
use crate::transport::{realtime_command, SendOptions, TransportHandle};

/// Reply to a successful start
#[derive(Debug, Clone, PartialEq)]
pub struct JogStarted {
    /// Session id
    pub id: String,
    /// When the session became active
    pub started_at: DateTime<Utc>,
}

#[derive(Default)]
struct Indexes {
    by_id: HashMap<String, Arc<JogSession>>,
    by_connection: HashMap<ConnectionId, HashSet<String>>,
}

impl Indexes {
    fn insert(&mut self, session: Arc<JogSession>) -> Option<Arc<JogSession>> {
        self.by_connection
            .entry(session.owner.clone())
            .or_default()
            .insert(session.id.clone());
        self.by_id.insert(session.id.clone(), session)
    }

    /// Remove `session` if it is still the one registered under its id
    fn remove(&mut self, session: &Arc<JogSession>) {
        if self
            .by_id
            .get(&session.id)
            .is_some_and(|current| Arc::ptr_eq(current, session))
        {
            self.by_id.remove(&session.id);
            if let Some(ids) = self.by_connection.get_mut(&session.owner) {
                ids.remove(&session.id);
                if ids.is_empty() {
                    self.by_connection.remove(&session.owner);
                }
            }
        }
    }
}

struct ManagerInner {
    transport: TransportHandle,
    config: JogConfig,
    bus: Option<Arc<EventBus>>,
    sessions: Mutex<Indexes>,
}

/// Per-connection continuous-motion sessions with a dead-man switch
///
/// Cloning yields another handle to the same manager.
#[derive(Clone)]
pub struct JogSessionManager {
    inner: Arc<ManagerInner>,
}

impl JogSessionManager {
    /// Create a manager sending through `transport`
    pub fn new(transport: TransportHandle, config: JogConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                transport,
                config,
                bus: None,
                sessions: Mutex::new(Indexes::default()),
            }),
        }
    }

    /// Create a manager that also broadcasts session lifecycle events
    pub fn with_event_bus(
        transport: TransportHandle,
        config: JogConfig,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                transport,
                config,
                bus: Some(bus),
                sessions: Mutex::new(Indexes::default()),
            }),
        }
    }

    /// Manager configuration
    pub fn config(&self) -> &JogConfig {
        &self.inner.config
    }

    /// Start continuous motion for `client`
    ///
    /// An existing session with the same id is taken over: it is finalized
    /// with [`StopReason::Restarted`] and its owner is not notified. If the
    /// start command cannot be delivered no session is created.
    pub async fn start(
        &self,
        client: JogClientHandle,
        id: &str,
        command: &str,
        meta: Meta,
    ) -> Result<JogStarted, JogError> {
        let id = id.trim();
        let command = command.trim();
        if id.is_empty() || command.is_empty() {
            return Err(JogError::InvalidRequest {
                reason: "id and command are required".to_string(),
            });
        }

        let existing = self.inner.sessions.lock().by_id.get(id).cloned();
        if let Some(existing) = existing {
            tracing::debug!("Jog {} restarted", id);
            self.inner
                .finalize(&existing, StopReason::Restarted, false)
                .await;
        }

        let session = Arc::new(JogSession::new(id, command, client));
        let options = SendOptions::new()
            .with_command_id(id)
            .with_meta_map(meta)
            .continuous();
        if let Err(e) = self.inner.transport.send_command(command, options).await {
            tracing::warn!("Jog {} failed to start: {}", id, e);
            return Err(JogError::StartFailed {
                reason: e.to_string(),
            });
        }

        session.set_state(SessionState::Active);
        *session.last_heartbeat_at.lock() = Instant::now();
        let superseded = self.inner.sessions.lock().insert(Arc::clone(&session));
        if let Some(superseded) = superseded {
            // Another start for this id won the race while ours was in flight.
            self.inner
                .finalize(&superseded, StopReason::Restarted, false)
                .await;
        }
        self.arm_heartbeat_timer(&session);
        self.arm_max_duration_timer(&session);

        tracing::info!("Jog {} started by {}: {}", id, session.owner, command);
        self.inner.emit(JogEvent::Started {
            id: id.to_string(),
            owner: session.owner.clone(),
            started_at: session.started_at,
        });
        Ok(JogStarted {
            id: id.to_string(),
            started_at: session.started_at,
        })
    }

    /// Keep the session alive; ignored unless `connection` owns it
    ///
    /// Also nudges the transport's own continuous-motion watchdog. That nudge
    /// is fire-and-forget.
    pub fn heartbeat(&self, connection: &str, id: &str) -> bool {
        let Some(session) = self.owned_session(connection, id) else {
            return false;
        };
        if session.is_stopping() {
            return false;
        }

        *session.last_heartbeat_at.lock() = Instant::now();
        self.arm_heartbeat_timer(&session);

        let transport = Arc::clone(&self.inner.transport);
        tokio::spawn(async move {
            if let Err(e) = transport.send_command("", SendOptions::heartbeat()).await {
                tracing::debug!("Transport heartbeat failed: {}", e);
            }
        });
        true
    }

    /// Stop a session; only its owning connection may do so
    pub async fn stop(&self, connection: &str, id: &str, reason: &str) -> bool {
        let Some(session) = self.owned_session(connection, id) else {
            return false;
        };
        let reason = if reason.trim().is_empty() {
            "stopped"
        } else {
            reason.trim()
        };
        self.inner
            .finalize(&session, StopReason::Client(reason.to_string()), true)
            .await
    }

    /// Finalize a session
    ///
    /// Concurrent calls for the same session collapse into one: exactly one
    /// jog-cancel is sent and the owner is notified at most once. Returns
    /// whether this call performed the finalize.
    pub async fn finalize(&self, id: &str, reason: StopReason, notify: bool) -> bool {
        let session = self.inner.sessions.lock().by_id.get(id).cloned();
        match session {
            Some(session) => self.inner.finalize(&session, reason, notify).await,
            None => false,
        }
    }

    /// Finalize every session owned by a departed connection, without notifying it
    pub async fn disconnect(&self, connection: &str) -> usize {
        let sessions: Vec<Arc<JogSession>> = {
            let indexes = self.inner.sessions.lock();
            indexes
                .by_connection
                .get(connection)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| indexes.by_id.get(id).cloned())
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut finalized = 0;
        for session in sessions {
            if self
                .inner
                .finalize(&session, StopReason::Disconnected, false)
                .await
            {
                finalized += 1;
            }
        }
        if finalized > 0 {
            tracing::info!("Connection {} gone, stopped {} jog(s)", connection, finalized);
        }
        finalized
    }

    /// One-shot untracked move
    ///
    /// Returns the command id the move was sent with. Send failures are only
    /// logged; callers detect them by the missing acknowledgment.
    pub fn step(
        &self,
        command: &str,
        command_id: Option<String>,
        meta: Meta,
    ) -> Result<String, JogError> {
        let command = command.trim().to_string();
        if command.is_empty() {
            return Err(JogError::InvalidRequest {
                reason: "command is required".to_string(),
            });
        }
        let command_id = command_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(generate_command_id);

        let transport = Arc::clone(&self.inner.transport);
        let options = SendOptions::new()
            .with_command_id(command_id.clone())
            .with_meta_map(meta);
        tokio::spawn(async move {
            if let Err(e) = transport.send_command(&command, options).await {
                tracing::warn!("Jog step '{}' failed: {}", command, e);
            }
        });
        Ok(command_id)
    }

    /// Snapshot of a session
    pub fn session(&self, id: &str) -> Option<JogSessionInfo> {
        self.inner.sessions.lock().by_id.get(id).map(|s| s.info())
    }

    /// Number of live sessions
    pub fn active_count(&self) -> usize {
        self.inner.sessions.lock().by_id.len()
    }

    /// Ids of the sessions a connection owns
    pub fn sessions_for(&self, connection: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .sessions
            .lock()
            .by_connection
            .get(connection)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    fn owned_session(&self, connection: &str, id: &str) -> Option<Arc<JogSession>> {
        self.inner
            .sessions
            .lock()
            .by_id
            .get(id)
            .filter(|s| s.owner == connection)
            .cloned()
    }

    fn arm_heartbeat_timer(&self, session: &Arc<JogSession>) {
        let delay = Duration::from_millis(self.inner.config.heartbeat_timeout_ms);
        let handle = self.spawn_timer(session, delay, StopReason::HeartbeatTimeout);
        if let Some(previous) = session.heartbeat_timer.lock().replace(handle) {
            previous.abort();
        }
    }

    fn arm_max_duration_timer(&self, session: &Arc<JogSession>) {
        let delay = Duration::from_millis(self.inner.config.max_duration_ms);
        let handle = self.spawn_timer(session, delay, StopReason::MaxDuration);
        if let Some(previous) = session.max_duration_timer.lock().replace(handle) {
            previous.abort();
        }
    }

    fn spawn_timer(
        &self,
        session: &Arc<JogSession>,
        delay: Duration,
        reason: StopReason,
    ) -> JoinHandle<()> {
        let manager: Weak<ManagerInner> = Arc::downgrade(&self.inner);
        let session = Arc::downgrade(session);
        tokio::spawn(async move {
            sleep(delay).await;
            let (Some(manager), Some(session)) = (manager.upgrade(), session.upgrade()) else {
                return;
            };
            // Finalize aborts this timer, so it must run as its own task.
            tokio::spawn(async move {
                manager.finalize(&session, reason, true).await;
            });
        })
    }
}

impl ManagerInner {
    async fn finalize(&self, session: &Arc<JogSession>, reason: StopReason, notify: bool) -> bool {
        if !session.begin_stopping() {
            return false;
        }
        session.set_state(SessionState::Stopping);
        session.clear_timers();
        self.sessions.lock().remove(session);

        let options = SendOptions::new()
            .with_meta(META_COMPLETES_ID, session.id.clone())
            .with_meta(META_STOP_REASON, reason.as_str());
        let cancel = realtime_command(self.config.jog_cancel);
        if let Err(e) = self.transport.send_command(&cancel, options).await {
            tracing::warn!("Jog cancel for {} failed: {}", session.id, e);
        }

        session.set_state(SessionState::Closed);
        tracing::info!("Jog {} stopped: {}", session.id, reason);
        self.emit(JogEvent::Stopped {
            id: session.id.clone(),
            reason: reason.to_string(),
        });
        if notify {
            session.client.on_jog_stopped(&session.id, &reason);
        }
        true
    }

    fn emit(&self, event: JogEvent) {
        if let Some(bus) = &self.bus {
            bus.emit(AppEvent::Jog(event));
        }
    }
}
