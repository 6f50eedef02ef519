//! Watch Face: a UDP simulator of the paired display. It announces itself to the
//! monitor, renders weather and stock payloads as they arrive, acknowledges each
//! delivery and asks for a refresh on a fixed minute period.
//!
//! Usage example (CLI):
//! ```bash
//! watch_face --monitor-ip 192.168.0.10 --listen-port 8081 --refresh-minutes 20
//! ```
#![warn(missing_docs)]
mod args;
mod display;
mod sender;

use crate::args::Args;
use crate::display::{FaceState, is_refresh_minute};
use crate::sender::{MessageSender, start_clock_thread};
use chrono::{DateTime, Local};
use clap::Parser;
use crossbeam_channel::{Sender, select, unbounded};
use log::{debug, error, info, warn};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;
use watch_common::message::{self, HostMessage};
use watch_common::net::{DATAGRAM_BUFFER, addr};
use watch_common::{MonitorError, Result};

/// Runs a blocking loop that decodes `HostMessage`s from `socket` and forwards
/// them to `host_tx`. Undecodable datagrams are logged and skipped.
fn start_receiver_loop(
    socket: Arc<UdpSocket>,
    host_tx: Sender<HostMessage>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), MonitorError> {
    info!("Face receiver running on: {}", socket.local_addr()?);
    let mut buf = [0u8; DATAGRAM_BUFFER];

    while !shutdown.load(Ordering::Relaxed) {
        match socket.recv(&mut buf) {
            Ok(size) => match message::decode::<HostMessage>(&buf[..size]) {
                Ok(host_message) => {
                    if host_tx.send(host_message).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Message dropped: {}", e),
            },
            Err(e) => {
                if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut {
                    continue;
                }
                error!("Receive data error: {}", e);
                return Err(MonitorError::Io(e));
            }
        }
    }
    info!("Receiver loop stopping...");
    Ok(())
}

fn handle_host_message(state: &mut FaceState, sender: &MessageSender, host_message: HostMessage) {
    match host_message {
        HostMessage::Payload {
            transaction_id,
            payload,
        } => {
            let answer = match state.apply(&payload) {
                Ok(kind) => {
                    info!("{:?} payload applied\n{}", kind, state);
                    sender.ack(transaction_id)
                }
                Err(e) => {
                    warn!("Payload {} rejected: {}", transaction_id, e);
                    sender.nack(transaction_id, &e.to_string())
                }
            };
            if let Err(e) = answer {
                error!("Failed to answer payload {}: {}", transaction_id, e);
            }
        }
        HostMessage::Ack { transaction_id } => {
            debug!("Refresh request {} acknowledged", transaction_id);
        }
    }
}

fn handle_tick(
    state: &mut FaceState,
    sender: &MessageSender,
    now: DateTime<Local>,
    args: &Args,
) {
    let minute = state.set_clock(&now, args.twelve_hour);
    debug!("Clock: {}", state.clock);
    if is_refresh_minute(minute, args.refresh_minutes) {
        match sender.request_refresh() {
            Ok(id) => info!("Refresh request {} sent", id),
            Err(e) => error!("Outbox send failed: {}", e),
        }
    }
}

fn main() -> Result<(), MonitorError> {
    init_logger();
    let args = Args::parse();
    let shutdown = Arc::new(AtomicBool::new(false));
    let (stop_tx, stop_rx) = unbounded::<()>();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down face...");
            shutdown.store(true, Ordering::SeqCst);
            let _ = stop_tx.send(());
        })
        .map_err(|e| MonitorError::Config(format!("Error setting Ctrl+C handler: {}", e)))?;
    }

    let monitor_ip = args.monitor_ip.trim().replace('"', "");
    let monitor_addr: SocketAddr = addr(&monitor_ip, args.monitor_port)
        .parse()
        .map_err(|e| MonitorError::Config(format!("invalid monitor address: {}", e)))?;

    let socket = Arc::new(UdpSocket::bind(addr("0.0.0.0", args.listen_port))?);
    socket.set_read_timeout(Some(Duration::from_secs(1)))?;
    info!("UDP face listening on: {}", socket.local_addr()?);

    let sender = MessageSender::new(Arc::clone(&socket), monitor_addr);
    let (host_tx, host_rx) = unbounded::<HostMessage>();
    let (tick_tx, tick_rx) = unbounded::<DateTime<Local>>();

    let receiver_socket = Arc::clone(&socket);
    let receiver_shutdown = shutdown.clone();
    thread::spawn(move || {
        if let Err(e) = start_receiver_loop(receiver_socket, host_tx, receiver_shutdown) {
            error!("Receiver loop failed: {:?}", e);
        }
    });
    start_clock_thread(tick_tx, shutdown.clone());

    sender.ready()?;
    info!("Face is running. Press Ctrl+C to exit.");

    let mut state = FaceState::default();
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(host_rx) -> msg => match msg {
                Ok(host_message) => handle_host_message(&mut state, &sender, host_message),
                Err(_) => break,
            },
            recv(tick_rx) -> tick => match tick {
                Ok(now) => handle_tick(&mut state, &sender, now, &args),
                Err(_) => break,
            },
        }
    }
    shutdown.store(true, Ordering::SeqCst);
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
