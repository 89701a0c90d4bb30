//! Error handling for CNCRelay
//!
//! Provides the error types for every layer of the execution engine:
//! - Transport errors (sending commands, raw byte mode)
//! - Transfer errors (binary file push to controller storage)
//! - Jog errors (continuous-motion sessions)
//! - Dispatch errors (command expansion hooks)
//! - G-Code errors (program analysis)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Transport error type
///
/// Raised by anything that moves bytes to or from the controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// No controller connection is available
    #[error("Transport not connected")]
    NotConnected,

    /// Writing the command to the controller failed
    #[error("Send failed: {reason}")]
    SendFailed {
        /// The reason the send failed.
        reason: String,
    },

    /// The controller did not acknowledge in time
    #[error("Acknowledgment timed out after {timeout_ms}ms")]
    AckTimeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The controller answered with `error:N`
    #[error("Command rejected by controller: error:{code}")]
    Rejected {
        /// The controller error code.
        code: u32,
    },

    /// Raw mode requested while another raw session is open
    #[error("Raw mode already active")]
    RawModeActive,

    /// Raw operation attempted outside raw mode
    #[error("Raw mode not active")]
    RawModeInactive,

    /// Underlying stream failure
    #[error("I/O error: {reason}")]
    Io {
        /// The reason for the I/O error.
        reason: String,
    },
}

/// Binary file transfer error type
///
/// Every variant aborts the whole transfer; nothing is left half-written
/// pretending to be complete.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    /// The request was rejected before anything was sent
    #[error("Invalid transfer request: {reason}")]
    InvalidRequest {
        /// Why the request was rejected.
        reason: String,
    },

    /// The receiver stayed silent past the byte timeout
    #[error("Timed out after {timeout_ms}ms waiting for {stage}")]
    Timeout {
        /// What the sender was waiting for.
        stage: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The receiver sent a byte that is not valid at this point
    #[error("Protocol error: expected {expected}, got 0x{got:02X}")]
    UnexpectedByte {
        /// Description of the acceptable bytes.
        expected: String,
        /// The byte that was received.
        got: u8,
    },

    /// A block was refused too many times
    #[error("Max retries exceeded for block {sequence} after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Sequence number of the block.
        sequence: u8,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The receiver aborted the transfer
    #[error("Transfer cancelled by receiver")]
    Cancelled,

    /// The transport failed underneath the protocol
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Jog session error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JogError {
    /// Missing id or command
    #[error("Invalid jog request: {reason}")]
    InvalidRequest {
        /// Why the request was rejected.
        reason: String,
    },

    /// The start command could not be delivered; no session exists
    #[error("Jog start failed: {reason}")]
    StartFailed {
        /// The transport failure.
        reason: String,
    },
}

/// Command dispatch error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// Empty command submitted
    #[error("Empty command")]
    EmptyCommand,

    /// An expansion hook failed
    #[error("Expansion hook '{hook}' failed: {message}")]
    Expansion {
        /// Name of the failing hook.
        hook: String,
        /// Error message reported by the hook.
        message: String,
    },
}

/// G-Code error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GcodeError {
    /// Line numbers are 1-based
    #[error("Invalid target line {line}: line numbers start at 1")]
    InvalidLine {
        /// The rejected line number.
        line: usize,
    },
}

/// Main error type for CNCRelay
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Transfer error
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Jog error
    #[error(transparent)]
    Jog(#[from] JogError),

    /// Dispatch error
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// G-Code error
    #[error(transparent)]
    Gcode(#[from] GcodeError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError::AckTimeout { .. })
                | Error::Transfer(TransferError::Timeout { .. })
        )
    }

    /// Check if this is a transport error, including one wrapped by a transfer
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Transfer(TransferError::Transport(_))
        )
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
