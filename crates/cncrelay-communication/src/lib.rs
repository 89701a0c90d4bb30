//! # CNCRelay Communication
//!
//! Everything between a command request and the controller's byte stream:
//! the transport contract and a GRBL line-protocol transport, binary file
//! transfer to controller storage, continuous-jog sessions, and the command
//! dispatch pipeline.

pub mod dispatch;
pub mod jog;
pub mod transfer;
pub mod transport;

pub use dispatch::{
    CommandDispatcher, CommandExpander, CommandResult, DispatchConfig, DispatchOutcome,
    ExpanderHandle, CLEAR_MESSAGE_COMMAND, TOOL_CHANGE_COMPLETE_MARKER,
};

pub use jog::{
    JogClient, JogClientHandle, JogConfig, JogSessionInfo, JogSessionManager, JogStarted,
    SessionState, StopReason,
};

pub use transfer::{FileTransfer, TransferConfig, TransferProgress};

pub use transport::{
    realtime_byte, realtime_command, CommandAck, LineTransport, LineTransportConfig,
    SendOptions, Transport, TransportHandle, JOG_CANCEL,
};
