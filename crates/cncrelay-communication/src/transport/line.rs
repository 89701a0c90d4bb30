//! GRBL line-protocol transport
//!
//! A single I/O task owns the byte stream. Commands are written as lines and
//! resolved first-in first-out by `ok` / `error:N`; realtime single-byte
//! commands are written immediately and never wait for `ok`. In raw mode the
//! task forwards every received byte verbatim to the raw-mode owner.
//!
//! Acknowledgment deadlines are also kept by the task. When the oldest command
//! outlives its deadline the order of any later `ok` is unknowable, so every
//! pending command fails with `AckTimeout` and the queue starts over empty.
//!
//! The task also runs the continuous-motion watchdog: a command sent with
//! `continuous` arms it, a heartbeat re-arms it, and expiry writes the
//! jog-cancel byte so motion never outlives its operator.

use super::{realtime_byte, CommandAck, SendOptions, Transport, JOG_CANCEL};
use async_trait::async_trait;
use cncrelay_core::{generate_command_id, TransportError, META_COMPLETES_ID};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Line transport tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineTransportConfig {
    /// How long to wait for `ok` / `error:N` (milliseconds)
    pub ack_timeout_ms: u64,
    /// Continuous motion is cancelled this long after the last heartbeat (milliseconds)
    pub continuous_watchdog_ms: u64,
}

impl Default for LineTransportConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 10_000,
            continuous_watchdog_ms: 1_000,
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, TransportError>>;

struct PendingAck {
    reply: Reply<String>,
    deadline: Instant,
}

enum Request {
    Line {
        line: String,
        continuous: bool,
        reply: Reply<String>,
    },
    Realtime {
        byte: u8,
        reply: Reply<String>,
    },
    Heartbeat {
        reply: Reply<String>,
    },
    EnterRaw {
        reply: Reply<mpsc::UnboundedReceiver<Vec<u8>>>,
    },
    ExitRaw {
        reply: Reply<()>,
    },
    WriteRaw {
        bytes: Vec<u8>,
        reply: Reply<()>,
    },
}

/// GRBL transport over any async byte stream
pub struct LineTransport {
    requests: mpsc::UnboundedSender<Request>,
    config: LineTransportConfig,
    io_task: JoinHandle<()>,
}

impl LineTransport {
    /// Start the I/O task on an already connected stream
    pub fn new<S>(stream: S, config: LineTransportConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (requests, request_rx) = mpsc::unbounded_channel();
        let io = IoState {
            writer,
            pending: VecDeque::new(),
            raw: None,
            line_buffer: Vec::new(),
            watchdog: None,
            watchdog_period: Duration::from_millis(config.continuous_watchdog_ms),
            ack_timeout_ms: config.ack_timeout_ms,
        };
        let io_task = tokio::spawn(run_io_loop(reader, request_rx, io));
        Self {
            requests,
            config,
            io_task,
        }
    }

    /// Connect to a networked controller
    pub async fn connect(
        addr: impl ToSocketAddrs,
        config: LineTransportConfig,
    ) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await.map_err(|e| TransportError::Io {
            reason: e.to_string(),
        })?;
        if let Ok(peer) = stream.peer_addr() {
            tracing::info!("Connected to controller at {}", peer);
        }
        Ok(Self::new(stream, config))
    }

    /// Whether the I/O task is still running
    pub fn is_connected(&self) -> bool {
        !self.requests.is_closed()
    }

    /// Transport configuration
    pub fn config(&self) -> &LineTransportConfig {
        &self.config
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Request,
    ) -> Result<T, TransportError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(make(reply))
            .map_err(|_| TransportError::NotConnected)?;
        response.await.map_err(|_| TransportError::NotConnected)?
    }
}

impl Drop for LineTransport {
    fn drop(&mut self) {
        self.io_task.abort();
    }
}

#[async_trait]
impl Transport for LineTransport {
    async fn send_command(
        &self,
        command: &str,
        options: SendOptions,
    ) -> Result<CommandAck, TransportError> {
        let command_id = options
            .command_id
            .clone()
            .unwrap_or_else(generate_command_id);

        let response = if options.is_heartbeat() {
            self.request(|reply| Request::Heartbeat { reply }).await?
        } else if let Some(byte) = realtime_byte(command) {
            if let Some(completes) = options.meta.get(META_COMPLETES_ID) {
                tracing::debug!("Realtime 0x{:02X} completes {}", byte, completes);
            }
            self.request(|reply| Request::Realtime { byte, reply }).await?
        } else {
            let line = command.trim().to_string();
            if line.is_empty() {
                return Err(TransportError::SendFailed {
                    reason: "empty command".to_string(),
                });
            }
            let continuous = options.is_continuous();
            self.request(|reply| Request::Line {
                line,
                continuous,
                reply,
            })
            .await?
        };

        Ok(CommandAck {
            command_id,
            response,
        })
    }

    async fn enter_raw_mode(&self) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, TransportError> {
        self.request(|reply| Request::EnterRaw { reply }).await
    }

    async fn exit_raw_mode(&self) -> Result<(), TransportError> {
        self.request(|reply| Request::ExitRaw { reply }).await
    }

    async fn write_raw(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let bytes = bytes.to_vec();
        self.request(|reply| Request::WriteRaw { bytes, reply }).await
    }
}

struct IoState<S> {
    writer: WriteHalf<S>,
    pending: VecDeque<PendingAck>,
    raw: Option<mpsc::UnboundedSender<Vec<u8>>>,
    line_buffer: Vec<u8>,
    watchdog: Option<Instant>,
    watchdog_period: Duration,
    ack_timeout_ms: u64,
}

async fn run_io_loop<S>(
    mut reader: ReadHalf<S>,
    mut requests: mpsc::UnboundedReceiver<Request>,
    mut io: IoState<S>,
) where
    S: AsyncRead + AsyncWrite,
{
    let mut buf = [0u8; 1024];
    loop {
        let watchdog = io.watchdog;
        let ack_due = io.pending.front().map(|ack| ack.deadline);
        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    tracing::info!("Controller closed the connection");
                    io.fail_pending(TransportError::NotConnected);
                    break;
                }
                Ok(n) => io.on_bytes(&buf[..n]),
                Err(e) => {
                    tracing::error!("Controller read failed: {}", e);
                    io.fail_pending(TransportError::Io { reason: e.to_string() });
                    break;
                }
            },
            request = requests.recv() => match request {
                Some(request) => {
                    if let Err(e) = io.on_request(request).await {
                        tracing::error!("Controller write failed: {}", e);
                        io.fail_pending(e);
                        break;
                    }
                }
                None => break,
            },
            _ = sleep_until(ack_due.unwrap_or_else(Instant::now)), if ack_due.is_some() => {
                tracing::warn!(
                    "No acknowledgment within {} ms, failing {} pending command(s)",
                    io.ack_timeout_ms,
                    io.pending.len()
                );
                io.fail_pending(TransportError::AckTimeout {
                    timeout_ms: io.ack_timeout_ms,
                });
            }
            _ = sleep_until(watchdog.unwrap_or_else(Instant::now)), if watchdog.is_some() => {
                tracing::warn!("Continuous motion watchdog expired, cancelling jog");
                io.watchdog = None;
                if let Err(e) = io.write(&[JOG_CANCEL]).await {
                    tracing::error!("Watchdog jog cancel failed: {}", e);
                    io.fail_pending(e);
                    break;
                }
            }
        }
    }
}

impl<S: AsyncWrite> IoState<S> {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.writer
            .write_all(bytes)
            .await
            .map_err(|e| TransportError::Io {
                reason: e.to_string(),
            })?;
        self.writer.flush().await.map_err(|e| TransportError::Io {
            reason: e.to_string(),
        })
    }

    fn arm_watchdog(&mut self) {
        self.watchdog = Some(Instant::now() + self.watchdog_period);
    }

    /// Handle one request; an `Err` means the stream is unusable
    async fn on_request(&mut self, request: Request) -> Result<(), TransportError> {
        match request {
            Request::Line {
                line,
                continuous,
                reply,
            } => {
                if self.raw.is_some() {
                    let _ = reply.send(Err(TransportError::RawModeActive));
                    return Ok(());
                }
                tracing::debug!("> {}", line);
                if let Err(e) = self.write(format!("{}\n", line).as_bytes()).await {
                    let _ = reply.send(Err(e.clone()));
                    return Err(e);
                }
                self.pending.push_back(PendingAck {
                    reply,
                    deadline: Instant::now() + Duration::from_millis(self.ack_timeout_ms),
                });
                if continuous {
                    self.arm_watchdog();
                }
            }
            Request::Realtime { byte, reply } => {
                if self.raw.is_some() {
                    let _ = reply.send(Err(TransportError::RawModeActive));
                    return Ok(());
                }
                tracing::debug!("> realtime 0x{:02X}", byte);
                if let Err(e) = self.write(&[byte]).await {
                    let _ = reply.send(Err(e.clone()));
                    return Err(e);
                }
                if byte == JOG_CANCEL {
                    self.watchdog = None;
                }
                let _ = reply.send(Ok(String::new()));
            }
            Request::Heartbeat { reply } => {
                if self.watchdog.is_some() {
                    self.arm_watchdog();
                }
                let _ = reply.send(Ok(String::new()));
            }
            Request::EnterRaw { reply } => {
                if self.raw.is_some() {
                    let _ = reply.send(Err(TransportError::RawModeActive));
                    return Ok(());
                }
                let (tx, rx) = mpsc::unbounded_channel();
                self.raw = Some(tx);
                self.line_buffer.clear();
                tracing::debug!("Raw mode entered");
                let _ = reply.send(Ok(rx));
            }
            Request::ExitRaw { reply } => {
                let result = match self.raw.take() {
                    Some(_) => {
                        tracing::debug!("Raw mode exited");
                        Ok(())
                    }
                    None => Err(TransportError::RawModeInactive),
                };
                let _ = reply.send(result);
            }
            Request::WriteRaw { bytes, reply } => {
                if self.raw.is_none() {
                    let _ = reply.send(Err(TransportError::RawModeInactive));
                    return Ok(());
                }
                if let Err(e) = self.write(&bytes).await {
                    let _ = reply.send(Err(e.clone()));
                    return Err(e);
                }
                let _ = reply.send(Ok(()));
            }
        }
        Ok(())
    }
}

impl<S> IoState<S> {
    fn on_bytes(&mut self, bytes: &[u8]) {
        if let Some(raw) = &self.raw {
            let _ = raw.send(bytes.to_vec());
            return;
        }

        self.line_buffer.extend_from_slice(bytes);
        while let Some(pos) = self.line_buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.line_buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line).trim().to_string();
            if !line.is_empty() {
                self.on_line(line);
            }
        }
    }

    fn on_line(&mut self, line: String) {
        if line == "ok" {
            match self.pending.pop_front() {
                Some(ack) => {
                    let _ = ack.reply.send(Ok(line));
                }
                None => tracing::warn!("Unexpected ok with no command pending"),
            }
        } else if let Some(code) = line.strip_prefix("error:") {
            tracing::warn!("Controller rejected command: {}", line);
            let code = code.trim().parse::<u32>().unwrap_or(0);
            match self.pending.pop_front() {
                Some(ack) => {
                    let _ = ack.reply.send(Err(TransportError::Rejected { code }));
                }
                None => tracing::warn!("Unexpected {} with no command pending", line),
            }
        } else {
            tracing::debug!("< {}", line);
        }
    }

    fn fail_pending(&mut self, error: TransportError) {
        for ack in self.pending.drain(..) {
            let _ = ack.reply.send(Err(error.clone()));
        }
    }
}
