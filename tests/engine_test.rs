//! End-to-end runs over the GRBL line transport with a scripted controller

use cncrelay::{
    CommandContext, CommandDispatcher, DispatchConfig, EventBus, JogClient, JogConfig,
    JogSessionManager, LineTransport, LineTransportConfig, MachineStatus, Meta, SendOptions,
    ServerState, StopReason, Transport,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

#[derive(Default)]
struct Received {
    lines: Vec<String>,
    realtime: Vec<u8>,
}

// Minimal GRBL: `ok` for every line, realtime bytes recorded and never answered
fn spawn_controller(mut stream: DuplexStream) -> Arc<Mutex<Received>> {
    let received = Arc::new(Mutex::new(Received::default()));
    let log = received.clone();
    tokio::spawn(async move {
        let mut buf = [0u8; 256];
        let mut line = Vec::new();
        loop {
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            for &byte in &buf[..n] {
                match byte {
                    b'\n' => {
                        let text = String::from_utf8_lossy(&line).into_owned();
                        line.clear();
                        log.lock().unwrap().lines.push(text);
                        if stream.write_all(b"ok\r\n").await.is_err() {
                            return;
                        }
                    }
                    b'?' | b'!' | b'~' | 0x18 | 0x80..=0xFF => {
                        log.lock().unwrap().realtime.push(byte)
                    }
                    other => line.push(other),
                }
            }
        }
    });
    received
}

fn connect() -> (Arc<LineTransport>, Arc<Mutex<Received>>) {
    let (client, controller) = duplex(4096);
    let received = spawn_controller(controller);
    let transport = LineTransport::new(client, LineTransportConfig::default());
    (Arc::new(transport), received)
}

#[tokio::test]
async fn test_tool_change_round_trip() {
    let (transport, received) = connect();
    let bus = Arc::new(EventBus::new());
    let state = ServerState::new(bus);
    state.update_machine_status(MachineStatus::new().with_tool(1));
    let dispatcher = CommandDispatcher::new(state.clone(), DispatchConfig::default());

    let mut ctx = CommandContext::new("job", "M6 T2");
    let outcome = dispatcher.process("M6 T2", &mut ctx).await.unwrap();
    assert!(outcome.should_continue);
    assert!(state.is_tool_changing());

    for command in &outcome.commands {
        let ack = transport
            .send_command(command, SendOptions::new().with_command_id(ctx.command_id.clone()))
            .await
            .unwrap();
        assert_eq!(ack.response, "ok");
        dispatcher.acknowledge(command);
    }

    assert!(!state.is_tool_changing());
    assert_eq!(state.last_known_tool(), Some(2));
    assert_eq!(
        received.lock().unwrap().lines,
        vec!["M6 T2", "(TOOL CHANGE COMPLETE)"]
    );

    // The controller now holds tool 2; asking again sends nothing.
    state.update_machine_status(MachineStatus::new().with_tool(2));
    let mut ctx = CommandContext::new("job", "M6 T2");
    let outcome = dispatcher.process("M06 T2", &mut ctx).await.unwrap();
    assert!(!outcome.should_continue);
}

struct Client;

impl JogClient for Client {
    fn connection_id(&self) -> &str {
        "pendant"
    }

    fn on_jog_stopped(&self, _id: &str, _reason: &StopReason) {}
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_jog_is_cancelled_once() {
    let (transport, received) = connect();
    let manager = JogSessionManager::new(transport, JogConfig::default());

    manager
        .start(Arc::new(Client), "jog-x", "$J=G91 X500 F2000", Meta::new())
        .await
        .unwrap();
    assert!(manager.heartbeat("pendant", "jog-x"));

    // No more heartbeats: the session and the transport watchdog both lapse.
    tokio::time::sleep(Duration::from_millis(3000)).await;

    let received = received.lock().unwrap();
    assert_eq!(received.lines, vec!["$J=G91 X500 F2000"]);
    assert_eq!(received.realtime, vec![0x85]);
    assert_eq!(manager.active_count(), 0);
}
