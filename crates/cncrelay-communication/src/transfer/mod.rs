//! Binary file transfer to controller storage
//!
//! Pushes a program onto the controller's SD card with a lockstep,
//! block-acknowledged protocol over the transport's raw mode:
//!
//! 1. header block 0 (`filename\0size\0`) -> ACK, then `C`
//! 2. data blocks 1.. (mod 256) -> ACK each; NAK resends the same block
//! 3. EOT -> ACK, then `C`
//! 4. empty header block -> ACK
//!
//! Every wait for a control byte has a deadline and any failure aborts the
//! whole transfer. Raw mode is exited on every exit path.

pub mod protocol;

use cncrelay_core::{AppEvent, EventBus, TransferError, TransferEvent};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::transport::TransportHandle;
use protocol::{
    byte_name, encode_block, final_block, header_block, ACK, CAN, CRC_READY, DATA_BLOCK_SIZE,
    DATA_PAD, EOT, NAK,
};

/// Transfer tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Deadline for each control byte from the receiver (milliseconds)
    pub byte_timeout_ms: u64,
    /// Send attempts per block before giving up
    pub max_attempts: u32,
    /// How long to wait for the trailing byte after a CAN (milliseconds)
    pub cancel_drain_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            byte_timeout_ms: 5000,
            max_attempts: 10,
            cancel_drain_ms: 500,
        }
    }
}

/// Progress after a data block was acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    /// Payload bytes acknowledged so far
    pub bytes_sent: usize,
    /// File size
    pub total_bytes: usize,
    /// Rounded percentage
    pub percent: u8,
}

impl TransferProgress {
    fn new(bytes_sent: usize, total_bytes: usize) -> Self {
        let percent = if total_bytes == 0 {
            100
        } else {
            ((bytes_sent as f64 / total_bytes as f64) * 100.0).round() as u8
        };
        Self {
            bytes_sent,
            total_bytes,
            percent,
        }
    }
}

/// Sender side of the file transfer protocol
pub struct FileTransfer {
    transport: TransportHandle,
    config: TransferConfig,
    bus: Option<Arc<EventBus>>,
}

impl FileTransfer {
    /// Create a sender over `transport`
    pub fn new(transport: TransportHandle, config: TransferConfig) -> Self {
        Self {
            transport,
            config,
            bus: None,
        }
    }

    /// Builder method to broadcast transfer events
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Push `content` to controller storage as `filename`
    ///
    /// `on_progress` runs after every acknowledged data block.
    pub async fn send<F>(
        &self,
        filename: &str,
        content: &[u8],
        mut on_progress: F,
    ) -> Result<(), TransferError>
    where
        F: FnMut(TransferProgress) + Send,
    {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(TransferError::InvalidRequest {
                reason: "filename is required".to_string(),
            });
        }
        let header = header_block(filename, content.len()).ok_or_else(|| {
            TransferError::InvalidRequest {
                reason: format!("filename '{}' is too long", filename),
            }
        })?;

        let rx = self.transport.enter_raw_mode().await?;
        let guard = RawModeGuard::new(self.transport.clone());
        self.emit(TransferEvent::Started {
            filename: filename.to_string(),
            total_bytes: content.len(),
        });
        tracing::info!("Uploading {} ({} bytes)", filename, content.len());

        let mut session = Session {
            transport: &self.transport,
            config: &self.config,
            rx,
            buffer: VecDeque::new(),
        };
        let result = session
            .run(header, content, |progress| {
                self.emit(TransferEvent::Progress {
                    filename: filename.to_string(),
                    bytes_sent: progress.bytes_sent,
                    total_bytes: progress.total_bytes,
                    percent: progress.percent,
                });
                on_progress(progress);
            })
            .await;
        guard.release().await;

        match &result {
            Ok(()) => {
                tracing::info!("Upload of {} complete", filename);
                self.emit(TransferEvent::Completed {
                    filename: filename.to_string(),
                });
            }
            Err(e) => {
                tracing::error!("Upload of {} failed: {}", filename, e);
                self.emit(TransferEvent::Failed {
                    filename: filename.to_string(),
                    error: e.to_string(),
                });
            }
        }
        result
    }

    fn emit(&self, event: TransferEvent) {
        if let Some(bus) = &self.bus {
            bus.emit(AppEvent::Transfer(event));
        }
    }
}

/// Exits raw mode when released, or in the background if dropped unreleased
struct RawModeGuard {
    transport: Option<TransportHandle>,
}

impl RawModeGuard {
    fn new(transport: TransportHandle) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    async fn release(mut self) {
        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.exit_raw_mode().await {
                tracing::warn!("Failed to exit raw mode: {}", e);
            }
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Reached only when the transfer future is cancelled mid-flight.
        if let Some(transport) = self.transport.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = transport.exit_raw_mode().await {
                        tracing::warn!("Failed to exit raw mode: {}", e);
                    }
                });
            }
        }
    }
}

/// Per-transfer protocol state, discarded when the transfer ends
struct Session<'a> {
    transport: &'a TransportHandle,
    config: &'a TransferConfig,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    buffer: VecDeque<u8>,
}

impl Session<'_> {
    async fn run(
        &mut self,
        header: Vec<u8>,
        content: &[u8],
        mut on_progress: impl FnMut(TransferProgress) + Send,
    ) -> Result<(), TransferError> {
        self.send_block(&header, 0).await?;
        self.expect(CRC_READY, "receiver ready").await?;

        let mut sequence: u8 = 1;
        let mut bytes_sent = 0;
        for chunk in content.chunks(DATA_BLOCK_SIZE) {
            let block = encode_block(sequence, chunk, DATA_BLOCK_SIZE, DATA_PAD);
            self.send_block(&block, sequence).await?;
            bytes_sent += chunk.len();
            on_progress(TransferProgress::new(bytes_sent, content.len()));
            sequence = sequence.wrapping_add(1);
        }

        self.transport.write_raw(&[EOT]).await?;
        self.expect(ACK, "EOT acknowledgment").await?;
        self.expect(CRC_READY, "receiver ready after EOT").await?;

        self.transport.write_raw(&final_block()).await?;
        self.expect(ACK, "final block acknowledgment").await
    }

    /// Write a block until it is acknowledged, resending on NAK
    async fn send_block(&mut self, block: &[u8], sequence: u8) -> Result<(), TransferError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            self.transport.write_raw(block).await?;
            match self.next_byte("block acknowledgment").await? {
                ACK => return Ok(()),
                NAK if attempts >= self.config.max_attempts => {
                    return Err(TransferError::MaxRetriesExceeded { sequence, attempts });
                }
                NAK => {
                    tracing::debug!("Block {} refused (attempt {}), resending", sequence, attempts);
                }
                CAN => return Err(self.cancelled().await),
                other => {
                    return Err(TransferError::UnexpectedByte {
                        expected: "ACK or NAK".to_string(),
                        got: other,
                    })
                }
            }
        }
    }

    async fn expect(&mut self, expected: u8, stage: &str) -> Result<(), TransferError> {
        match self.next_byte(stage).await? {
            byte if byte == expected => Ok(()),
            CAN => Err(self.cancelled().await),
            other => Err(TransferError::UnexpectedByte {
                expected: byte_name(expected),
                got: other,
            }),
        }
    }

    /// Receivers send CAN twice; consume the second one if it arrives
    async fn cancelled(&mut self) -> TransferError {
        let drain = Duration::from_millis(self.config.cancel_drain_ms);
        if self.buffer.pop_front().is_none() {
            let _ = timeout(drain, self.rx.recv()).await;
        }
        tracing::warn!("Transfer cancelled by receiver");
        TransferError::Cancelled
    }

    async fn next_byte(&mut self, stage: &str) -> Result<u8, TransferError> {
        loop {
            if let Some(byte) = self.buffer.pop_front() {
                return Ok(byte);
            }
            let wait = Duration::from_millis(self.config.byte_timeout_ms);
            match timeout(wait, self.rx.recv()).await {
                Ok(Some(chunk)) => self.buffer.extend(chunk),
                Ok(None) => return Err(cncrelay_core::TransportError::NotConnected.into()),
                Err(_) => {
                    return Err(TransferError::Timeout {
                        stage: stage.to_string(),
                        timeout_ms: self.config.byte_timeout_ms,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent() {
        assert_eq!(TransferProgress::new(512, 1024).percent, 50);
        assert_eq!(TransferProgress::new(1024, 1024).percent, 100);
        assert_eq!(TransferProgress::new(0, 0).percent, 100);
        assert_eq!(TransferProgress::new(1, 3).percent, 33);
    }
}
