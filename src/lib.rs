//! # CNCRelay
//!
//! Command and job execution engine for GRBL/grblHAL-class CNC controllers.
//!
//! ## Architecture
//!
//! CNCRelay is organized as a workspace with multiple crates:
//!
//! 1. **cncrelay-core** - Errors, command context, event bus, shared state
//! 2. **cncrelay-gcode** - Tool-change matcher, modal analysis, resume planning, motion-time estimation
//! 3. **cncrelay-communication** - Transport contract, GRBL line transport, file transfer, jog sessions, dispatch
//! 4. **cncrelay-settings** - Configuration loading, validation, and persistence
//! 5. **cncrelay** - This facade and the `cncrelay` command line tool
//!
//! ## Features
//!
//! - **Dispatch Pipeline**: same-tool M6 suppression, tool-changing flag, ordered expansion hooks
//! - **Continuous Jog**: per-connection sessions with heartbeat and max-duration dead-man switch
//! - **File Transfer**: YMODEM-style block protocol with CRC-16 and per-block retries
//! - **Job Resume**: modal-state reconstruction and safe re-entry sequence
//! - **Progress/ETA**: kinematic motion-time plan with live override scaling

pub use cncrelay_communication::{dispatch, jog, transfer, transport};
pub use cncrelay_gcode::{estimator, modal, progress, resume};

pub use cncrelay_core::{
    generate_command_id, AppEvent, CommandContext, CommandEvent, DispatchError, Error, EventBus,
    EventFilter, GcodeError, JobEvent, JobProgress, JobStatus, JogError, JogEvent, MachineEvent,
    MachineStatus, Meta, Position, Result, ServerState, SharedState, TransferError,
    TransferEvent, TransportError,
};

pub use cncrelay_communication::{
    CommandDispatcher, CommandExpander, CommandResult, DispatchConfig, DispatchOutcome,
    ExpanderHandle, FileTransfer, JogClient, JogClientHandle, JogConfig, JogSessionManager,
    LineTransport, LineTransportConfig, SendOptions, StopReason, TransferConfig,
    TransferProgress, Transport, TransportHandle,
};

pub use cncrelay_gcode::{
    analyze_to_line, parse_tool_change, plan_resume, Estimate, EstimatorConfig, ModalState,
    MotionEstimator, MotionPlan, MoveType, Overrides, ProgressTracker, ResumeOptions,
    ResumePlan, ToolChange,
};

pub use cncrelay_settings::{Config, ConnectionSettings, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - RUST_LOG environment variable support, INFO by default
/// - Pretty console output on stderr, or one JSON object per line when `json` is set
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing::Level::INFO.to_string()));

    // Logs go to stderr so command output on stdout stays machine-readable.
    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_current_span(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}
