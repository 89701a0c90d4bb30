//! Transport contract
//!
//! How commands and raw bytes reach the controller. The execution engine
//! only depends on the [`Transport`] trait; [`LineTransport`] is the GRBL
//! line-protocol implementation over any async byte stream.

mod line;

pub use line::{LineTransport, LineTransportConfig};

use async_trait::async_trait;
use cncrelay_core::{Meta, TransportError, META_CONTINUOUS, META_HEARTBEAT};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// GRBL realtime jog-cancel command
pub const JOG_CANCEL: u8 = 0x85;

/// Options attached to a command send
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendOptions {
    /// Correlation id; the transport generates one when absent
    pub command_id: Option<String>,
    /// Text shown to observers in place of the raw command
    pub display_text: Option<String>,
    /// Provenance and correlation metadata
    pub meta: Meta,
}

impl SendOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a zero-length watchdog nudge
    pub fn heartbeat() -> Self {
        Self::new().with_meta(META_HEARTBEAT, true)
    }

    /// Builder method to set the command id
    pub fn with_command_id(mut self, command_id: impl Into<String>) -> Self {
        self.command_id = Some(command_id.into());
        self
    }

    /// Builder method to set the display text
    pub fn with_display_text(mut self, display_text: impl Into<String>) -> Self {
        self.display_text = Some(display_text.into());
        self
    }

    /// Builder method to add one metadata entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Builder method to merge a metadata map
    pub fn with_meta_map(mut self, meta: Meta) -> Self {
        self.meta.extend(meta);
        self
    }

    /// Mark the command as starting continuous motion
    pub fn continuous(self) -> Self {
        self.with_meta(META_CONTINUOUS, true)
    }

    /// Whether the command starts continuous motion
    pub fn is_continuous(&self) -> bool {
        flag(&self.meta, META_CONTINUOUS)
    }

    /// Whether this is a watchdog nudge rather than a real command
    pub fn is_heartbeat(&self) -> bool {
        flag(&self.meta, META_HEARTBEAT)
    }
}

fn flag(meta: &Meta, key: &str) -> bool {
    meta.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Controller acknowledgment of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandAck {
    /// Id the command was sent with
    pub command_id: String,
    /// Acknowledgment line (`ok`), empty for realtime commands and heartbeats
    pub response: String,
}

/// Byte channel to the controller
///
/// Commands are acknowledged strictly in submission order. Raw mode gives a
/// single caller exclusive use of the channel; no command may be sent until
/// it is exited.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one command and wait for its acknowledgment
    async fn send_command(
        &self,
        command: &str,
        options: SendOptions,
    ) -> Result<CommandAck, TransportError>;

    /// Switch to raw byte mode; received bytes arrive on the returned channel
    async fn enter_raw_mode(&self) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, TransportError>;

    /// Leave raw byte mode
    async fn exit_raw_mode(&self) -> Result<(), TransportError>;

    /// Write bytes verbatim; only valid in raw mode
    async fn write_raw(&self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// Arc-wrapped transport for sharing between components
pub type TransportHandle = Arc<dyn Transport>;

/// The realtime byte a command stands for, if it is a single-byte realtime command
///
/// GRBL realtime commands are `?`, `!`, `~`, soft reset (0x18), and the
/// extended set at 0x80 and above. They bypass the line buffer and are not
/// acknowledged with `ok`.
pub fn realtime_byte(command: &str) -> Option<u8> {
    let mut chars = command.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let code = u32::from(c);
    match code {
        0x3F | 0x21 | 0x7E | 0x18 | 0x80..=0xFF => Some(code as u8),
        _ => None,
    }
}

/// Text form of a realtime byte, suitable for [`Transport::send_command`]
pub fn realtime_command(byte: u8) -> String {
    char::from(byte).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realtime_detection() {
        assert_eq!(realtime_byte("?"), Some(b'?'));
        assert_eq!(realtime_byte(&realtime_command(JOG_CANCEL)), Some(JOG_CANCEL));
        assert_eq!(realtime_byte("G0"), None);
        assert_eq!(realtime_byte(""), None);
        assert_eq!(realtime_byte("x"), None);
    }

    #[test]
    fn test_send_option_flags() {
        assert!(SendOptions::heartbeat().is_heartbeat());
        assert!(!SendOptions::heartbeat().is_continuous());
        let options = SendOptions::new().with_command_id("jog-1").continuous();
        assert!(options.is_continuous());
        assert_eq!(options.command_id.as_deref(), Some("jog-1"));
    }
}
