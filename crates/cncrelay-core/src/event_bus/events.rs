//! Event type definitions for the event bus.
//!
//! Events are cloneable and serializable so the outer layers can forward them
//! to observers as `(name, payload)` pairs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{JobStatus, MachineStatus};

/// Root event enum for all engine events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "event")]
pub enum AppEvent {
    /// Command lifecycle results
    Command(CommandEvent),
    /// Machine and server state deltas
    Machine(MachineEvent),
    /// Continuous jog sessions
    Jog(JogEvent),
    /// Binary file transfers
    Transfer(TransferEvent),
    /// Job runner cursor and status
    Job(JobEvent),
}

impl AppEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            AppEvent::Command(_) => EventCategory::Command,
            AppEvent::Machine(_) => EventCategory::Machine,
            AppEvent::Jog(_) => EventCategory::Jog,
            AppEvent::Transfer(_) => EventCategory::Transfer,
            AppEvent::Job(_) => EventCategory::Job,
        }
    }

    /// Wire name used when the event is forwarded to observers
    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::Command(_) => "cnc-command-result",
            AppEvent::Machine(_) | AppEvent::Job(_) => "server-state-updated",
            AppEvent::Jog(_) => "jog-session",
            AppEvent::Transfer(_) => "file-transfer",
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            AppEvent::Command(e) => e.description(),
            AppEvent::Machine(e) => e.description(),
            AppEvent::Jog(e) => e.description(),
            AppEvent::Transfer(e) => e.description(),
            AppEvent::Job(e) => e.description(),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Command lifecycle events.
    Command,
    /// Machine state events.
    Machine,
    /// Jog session events.
    Jog,
    /// File transfer events.
    Transfer,
    /// Job runner events.
    Job,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Command => write!(f, "Command"),
            EventCategory::Machine => write!(f, "Machine"),
            EventCategory::Jog => write!(f, "Jog"),
            EventCategory::Transfer => write!(f, "Transfer"),
            EventCategory::Job => write!(f, "Job"),
        }
    }
}

/// Command lifecycle events
///
/// Each carries the command and source ids so observers can reattach the
/// result to their own request regardless of arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all_fields = "camelCase")]
pub enum CommandEvent {
    /// Command accepted for processing
    Pending {
        /// Command identifier.
        command_id: String,
        /// Originating source.
        source_id: String,
        /// Operator-facing text.
        display_text: String,
    },
    /// Command finished successfully
    Completed {
        /// Command identifier.
        command_id: String,
        /// Originating source.
        source_id: String,
        /// Operator-facing text.
        display_text: String,
    },
    /// Command failed
    Failed {
        /// Command identifier.
        command_id: String,
        /// Originating source.
        source_id: String,
        /// Error message.
        error: String,
    },
}

impl CommandEvent {
    fn description(&self) -> String {
        match self {
            CommandEvent::Pending {
                command_id,
                display_text,
                ..
            } => format!("Command {} pending: {}", command_id, display_text),
            CommandEvent::Completed {
                command_id,
                display_text,
                ..
            } => format!("Command {} completed: {}", command_id, display_text),
            CommandEvent::Failed {
                command_id, error, ..
            } => format!("Command {} failed: {}", command_id, error),
        }
    }
}

/// Machine and server state events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MachineEvent {
    /// Tool change sequence started or finished
    ToolChangingChanged {
        /// Whether a tool change is in progress.
        changing: bool,
    },
    /// A fresh status report was cached
    StatusUpdated {
        /// The new status snapshot.
        status: MachineStatus,
    },
    /// The live status was dropped (e.g. on disconnect)
    StatusCleared,
    /// The cached tool changed
    LastKnownToolChanged {
        /// The tool now assumed in the spindle.
        tool: Option<u32>,
    },
    /// The plugin message was set or cleared
    PluginMessageChanged {
        /// The new message, `None` when cleared.
        message: Option<String>,
    },
    /// Feed, rapid, or spindle override changed
    OverridesChanged {
        /// Feed override percent.
        feed: f64,
        /// Rapid override percent.
        rapid: f64,
        /// Spindle override percent.
        spindle: f64,
    },
}

impl MachineEvent {
    fn description(&self) -> String {
        match self {
            MachineEvent::ToolChangingChanged { changing } => {
                format!("Tool changing: {}", changing)
            }
            MachineEvent::StatusUpdated { status } => {
                format!("Status: {} (tool {:?})", status.state, status.tool)
            }
            MachineEvent::StatusCleared => "Status cleared".to_string(),
            MachineEvent::LastKnownToolChanged { tool } => match tool {
                Some(t) => format!("Last known tool: T{}", t),
                None => "Last known tool cleared".to_string(),
            },
            MachineEvent::PluginMessageChanged { message } => match message {
                Some(m) => format!("Plugin message: {}", m),
                None => "Plugin message cleared".to_string(),
            },
            MachineEvent::OverridesChanged {
                feed,
                rapid,
                spindle,
            } => format!("Overrides F{}% R{}% S{}%", feed, rapid, spindle),
        }
    }
}

/// Jog session events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JogEvent {
    /// A continuous jog session started
    Started {
        /// Session identifier.
        id: String,
        /// Owning connection.
        owner: String,
        /// Start timestamp.
        started_at: DateTime<Utc>,
    },
    /// A session was finalized
    Stopped {
        /// Session identifier.
        id: String,
        /// Why it stopped.
        reason: String,
    },
}

impl JogEvent {
    fn description(&self) -> String {
        match self {
            JogEvent::Started { id, owner, .. } => format!("Jog {} started by {}", id, owner),
            JogEvent::Stopped { id, reason } => format!("Jog {} stopped: {}", id, reason),
        }
    }
}

/// File transfer events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransferEvent {
    /// Transfer began
    Started {
        /// Target filename.
        filename: String,
        /// Payload size in bytes.
        total_bytes: usize,
    },
    /// A data block was accepted
    Progress {
        /// Target filename.
        filename: String,
        /// Bytes accepted so far.
        bytes_sent: usize,
        /// Payload size in bytes.
        total_bytes: usize,
        /// Rounded completion percentage.
        percent: u8,
    },
    /// Transfer finished
    Completed {
        /// Target filename.
        filename: String,
    },
    /// Transfer aborted
    Failed {
        /// Target filename.
        filename: String,
        /// Error message.
        error: String,
    },
}

impl TransferEvent {
    fn description(&self) -> String {
        match self {
            TransferEvent::Started {
                filename,
                total_bytes,
            } => format!("Uploading {} ({} bytes)", filename, total_bytes),
            TransferEvent::Progress {
                filename, percent, ..
            } => format!("Uploading {}: {}%", filename, percent),
            TransferEvent::Completed { filename } => format!("Uploaded {}", filename),
            TransferEvent::Failed { filename, error } => {
                format!("Upload of {} failed: {}", filename, error)
            }
        }
    }
}

/// Job runner events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobEvent {
    /// The job cursor moved
    CursorChanged {
        /// Last acknowledged line (1-based, 0 before the first line).
        line: usize,
    },
    /// The job status changed
    StatusChanged {
        /// New status.
        status: JobStatus,
    },
}

impl JobEvent {
    fn description(&self) -> String {
        match self {
            JobEvent::CursorChanged { line } => format!("Job at line {}", line),
            JobEvent::StatusChanged { status } => format!("Job {:?}", status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let e = AppEvent::Machine(MachineEvent::ToolChangingChanged { changing: true });
        assert_eq!(e.name(), "server-state-updated");
        assert_eq!(e.category(), EventCategory::Machine);

        let e = AppEvent::Command(CommandEvent::Failed {
            command_id: "1".to_string(),
            source_id: "ui".to_string(),
            error: "boom".to_string(),
        });
        assert_eq!(e.name(), "cnc-command-result");
        assert_eq!(e.description(), "Command 1 failed: boom");
    }

    #[test]
    fn test_machine_event_descriptions() {
        let e = AppEvent::Machine(MachineEvent::LastKnownToolChanged { tool: Some(3) });
        assert_eq!(e.description(), "Last known tool: T3");
        let e = AppEvent::Machine(MachineEvent::StatusCleared);
        assert_eq!(e.description(), "Status cleared");
        assert_eq!(e.name(), "server-state-updated");
    }

    #[test]
    fn test_command_event_serializes_camel_case() {
        let e = AppEvent::Command(CommandEvent::Pending {
            command_id: "42".to_string(),
            source_id: "ui".to_string(),
            display_text: "G0 X0".to_string(),
        });
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["category"], "Command");
        assert_eq!(json["event"]["Pending"]["commandId"], "42");
    }
}
