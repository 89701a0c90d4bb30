//! # CNCRelay Core
//!
//! Core types shared by every CNCRelay crate: the error taxonomy, the
//! command context, the event bus used as the broadcast sink, and the shared
//! server state handle.

pub mod context;
pub mod error;
pub mod event_bus;
pub mod state;

pub use context::{
    generate_command_id, CommandContext, Meta, META_COMPLETES_ID, META_CONTINUOUS,
    META_HEARTBEAT, META_PROCESSED_BY, META_STOP_REASON,
};

pub use error::{
    DispatchError, Error, GcodeError, JogError, Result, TransferError, TransportError,
};

pub use event_bus::{
    AppEvent, CommandEvent, EventBus, EventBusConfig, EventBusError, EventCategory,
    EventFilter, JobEvent, JogEvent, MachineEvent, SubscriptionId, TransferEvent,
};

pub use state::{JobProgress, JobStatus, MachineStatus, Position, ServerState, SharedState};
