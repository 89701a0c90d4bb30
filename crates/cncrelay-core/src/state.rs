//! Shared server state
//!
//! One explicitly constructed handle replaces the ambient globals a sender
//! usually accumulates: the latest machine status report, the last tool the
//! controller was known to hold, the tool-changing flag, the plugin message,
//! overrides, and the job cursor.
//!
//! Writers are the dispatch pipeline (tool-changing flag, plugin message) and
//! the job runner / status poller (status, cursor, overrides). Everyone else
//! reads. Every setter broadcasts the delta right after the write.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::event_bus::{AppEvent, EventBus, JobEvent, MachineEvent};

/// Shared handle to the server state
pub type SharedState = Arc<ServerState>;

/// Cartesian position in millimetres
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
}

impl Position {
    /// Create a new position
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Latest status report from the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineStatus {
    /// Controller state string (`Idle`, `Run`, `Jog`, ...)
    pub state: String,
    /// Tool currently in the spindle, if the controller reports it
    pub tool: Option<u32>,
    /// Work position
    pub position: Position,
    /// Feed override percent
    pub feed_override: f64,
    /// Rapid override percent
    pub rapid_override: f64,
    /// Spindle override percent
    pub spindle_override: f64,
}

impl MachineStatus {
    /// Create an idle status with no tool information
    pub fn new() -> Self {
        Self {
            state: "Idle".to_string(),
            tool: None,
            position: Position::default(),
            feed_override: 100.0,
            rapid_override: 100.0,
            spindle_override: 100.0,
        }
    }

    /// Builder method to set the controller state
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    /// Builder method to set the reported tool
    pub fn with_tool(mut self, tool: u32) -> Self {
        self.tool = Some(tool);
        self
    }

    /// Builder method to set the work position
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Builder method to set feed and rapid overrides
    pub fn with_overrides(mut self, feed: f64, rapid: f64) -> Self {
        self.feed_override = feed;
        self.rapid_override = rapid;
        self
    }

    /// Feed, rapid, and spindle override percentages
    pub fn overrides(&self) -> (f64, f64, f64) {
        (self.feed_override, self.rapid_override, self.spindle_override)
    }
}

impl Default for MachineStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Job runner status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobStatus {
    /// No job running
    #[default]
    Idle,
    /// Streaming lines
    Running,
    /// Feed hold
    Paused,
    /// Ran to the end
    Completed,
    /// Stopped by the operator or an error
    Stopped,
}

/// Job cursor snapshot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobProgress {
    /// Name of the loaded program
    pub filename: Option<String>,
    /// Last acknowledged line (1-based, 0 before the first line)
    pub current_line: usize,
    /// Runner status
    pub status: JobStatus,
}

#[derive(Debug, Default)]
struct StateInner {
    status: Option<MachineStatus>,
    last_known_tool: Option<u32>,
    tool_changing: bool,
    plugin_message: Option<String>,
    job: JobProgress,
}

/// Server-wide mutable state with explicit broadcast on every write
#[derive(Debug)]
pub struct ServerState {
    inner: RwLock<StateInner>,
    bus: Arc<EventBus>,
}

impl ServerState {
    /// Create a shared state handle publishing to the given bus
    pub fn new(bus: Arc<EventBus>) -> SharedState {
        Arc::new(Self {
            inner: RwLock::new(StateInner::default()),
            bus,
        })
    }

    /// The bus deltas are published on
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Latest status report, if one has arrived
    pub fn machine_status(&self) -> Option<MachineStatus> {
        self.inner.read().status.clone()
    }

    /// Cache a status report; a reported tool also becomes the last known tool
    ///
    /// Besides `StatusUpdated`, broadcasts `LastKnownToolChanged` and
    /// `OverridesChanged` when the report moves either of them.
    pub fn update_machine_status(&self, status: MachineStatus) {
        let (tool_changed, overrides_changed) = {
            let mut inner = self.inner.write();
            let tool_changed = status.tool.is_some() && inner.last_known_tool != status.tool;
            if tool_changed {
                inner.last_known_tool = status.tool;
            }
            let overrides_changed = inner
                .status
                .as_ref()
                .is_none_or(|previous| previous.overrides() != status.overrides());
            inner.status = Some(status.clone());
            (tool_changed, overrides_changed)
        };

        if tool_changed {
            let tool = status.tool;
            self.bus
                .emit(AppEvent::Machine(MachineEvent::LastKnownToolChanged { tool }));
        }
        if overrides_changed {
            let (feed, rapid, spindle) = status.overrides();
            self.bus.emit(AppEvent::Machine(MachineEvent::OverridesChanged {
                feed,
                rapid,
                spindle,
            }));
        }
        self.bus
            .emit(AppEvent::Machine(MachineEvent::StatusUpdated { status }));
    }

    /// Forget the live status (e.g. on disconnect); the last known tool survives
    pub fn clear_machine_status(&self) {
        self.inner.write().status = None;
        self.bus
            .emit(AppEvent::Machine(MachineEvent::StatusCleared));
    }

    /// Last tool seen in any status report
    pub fn last_known_tool(&self) -> Option<u32> {
        self.inner.read().last_known_tool
    }

    /// Record the tool without a full status report (e.g. after a completed M6)
    pub fn set_last_known_tool(&self, tool: Option<u32>) {
        self.inner.write().last_known_tool = tool;
        self.bus
            .emit(AppEvent::Machine(MachineEvent::LastKnownToolChanged { tool }));
    }

    /// Whether a tool change sequence is in flight
    pub fn is_tool_changing(&self) -> bool {
        self.inner.read().tool_changing
    }

    /// Set the tool-changing flag and broadcast the change
    pub fn set_tool_changing(&self, changing: bool) {
        self.inner.write().tool_changing = changing;
        tracing::debug!("Tool changing set to {}", changing);
        self.bus
            .emit(AppEvent::Machine(MachineEvent::ToolChangingChanged { changing }));
    }

    /// Current plugin message
    pub fn plugin_message(&self) -> Option<String> {
        self.inner.read().plugin_message.clone()
    }

    /// Set or clear the plugin message and broadcast the change
    pub fn set_plugin_message(&self, message: Option<String>) {
        self.inner.write().plugin_message = message.clone();
        self.bus
            .emit(AppEvent::Machine(MachineEvent::PluginMessageChanged { message }));
    }

    /// Feed and rapid override percentages from the latest status
    pub fn overrides(&self) -> Option<(f64, f64)> {
        self.inner
            .read()
            .status
            .as_ref()
            .map(|s| (s.feed_override, s.rapid_override))
    }

    /// Job cursor snapshot
    pub fn job(&self) -> JobProgress {
        self.inner.read().job.clone()
    }

    /// Start tracking a freshly loaded program
    pub fn load_job(&self, filename: impl Into<String>) {
        {
            let mut inner = self.inner.write();
            inner.job = JobProgress {
                filename: Some(filename.into()),
                current_line: 0,
                status: JobStatus::Idle,
            };
        }
        self.bus
            .emit(AppEvent::Job(JobEvent::CursorChanged { line: 0 }));
    }

    /// Move the job cursor and broadcast it
    pub fn set_job_line(&self, line: usize) {
        self.inner.write().job.current_line = line;
        self.bus.emit(AppEvent::Job(JobEvent::CursorChanged { line }));
    }

    /// Change the job status and broadcast it
    pub fn set_job_status(&self, status: JobStatus) {
        self.inner.write().job.status = status;
        self.bus
            .emit(AppEvent::Job(JobEvent::StatusChanged { status }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::EventFilter;
    use parking_lot::Mutex;

    fn recording_state() -> (SharedState, Arc<Mutex<Vec<AppEvent>>>) {
        let bus = Arc::new(EventBus::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        bus.subscribe(EventFilter::All, move |e| sink.lock().push(e));
        (ServerState::new(bus), events)
    }

    #[test]
    fn test_tool_changing_broadcasts() {
        let (state, events) = recording_state();
        assert!(!state.is_tool_changing());

        state.set_tool_changing(true);
        assert!(state.is_tool_changing());
        assert_eq!(
            events.lock().last(),
            Some(&AppEvent::Machine(MachineEvent::ToolChangingChanged {
                changing: true
            }))
        );
    }

    #[test]
    fn test_status_updates_last_known_tool() {
        let (state, _) = recording_state();
        state.update_machine_status(MachineStatus::new().with_tool(4));
        assert_eq!(state.last_known_tool(), Some(4));

        // A report without tool information keeps the cached value
        state.update_machine_status(MachineStatus::new());
        assert_eq!(state.last_known_tool(), Some(4));
        assert_eq!(state.machine_status().and_then(|s| s.tool), None);

        state.clear_machine_status();
        assert!(state.machine_status().is_none());
        assert_eq!(state.last_known_tool(), Some(4));
    }

    #[test]
    fn test_tool_cache_and_clear_broadcast() {
        let (state, events) = recording_state();
        state.set_last_known_tool(Some(7));
        state.update_machine_status(MachineStatus::new().with_tool(7));
        state.clear_machine_status();

        let events = events.lock();
        let machine: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Machine(m) => Some(m.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            machine.first(),
            Some(&MachineEvent::LastKnownToolChanged { tool: Some(7) })
        );
        // Same tool reported again: no second tool event
        assert_eq!(
            machine
                .iter()
                .filter(|m| matches!(m, MachineEvent::LastKnownToolChanged { .. }))
                .count(),
            1
        );
        assert_eq!(machine.last(), Some(&MachineEvent::StatusCleared));
    }

    #[test]
    fn test_overrides_broadcast_only_on_change() {
        let (state, events) = recording_state();
        state.update_machine_status(MachineStatus::new());
        state.update_machine_status(MachineStatus::new().with_state("Run"));
        state.update_machine_status(MachineStatus::new().with_overrides(50.0, 25.0));

        let overrides: Vec<_> = events
            .lock()
            .iter()
            .filter_map(|e| match e {
                AppEvent::Machine(MachineEvent::OverridesChanged { feed, rapid, .. }) => {
                    Some((*feed, *rapid))
                }
                _ => None,
            })
            .collect();
        assert_eq!(overrides, vec![(100.0, 100.0), (50.0, 25.0)]);
    }

    #[test]
    fn test_job_cursor() {
        let (state, events) = recording_state();
        state.load_job("part.nc");
        state.set_job_line(12);
        state.set_job_status(JobStatus::Running);

        let job = state.job();
        assert_eq!(job.filename.as_deref(), Some("part.nc"));
        assert_eq!(job.current_line, 12);
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(events.lock().len(), 3);
    }

    #[test]
    fn test_overrides_follow_status() {
        let (state, _) = recording_state();
        assert_eq!(state.overrides(), None);
        state.update_machine_status(MachineStatus::new().with_overrides(50.0, 25.0));
        assert_eq!(state.overrides(), Some((50.0, 25.0)));
    }
}
