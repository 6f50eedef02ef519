//! Sending device messages to the monitor over UDP.
//!
//! This module provides a small helper for encoding and sending `DeviceMessage`s
//! and a background clock thread that ticks once per minute.
use chrono::{DateTime, Local, Timelike};
use crossbeam_channel::Sender;
use log::{debug, info};
use std::net::{SocketAddr, UdpSocket};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
};
use std::thread;
use std::time::Duration;
use watch_common::Result;
use watch_common::message::{self, DeviceMessage};
use watch_common::payload::PayloadValue;

/// Polling interval of the clock thread.
const CLOCK_POLL_MS: u64 = 500;

/// Helper type for sending messages to the monitor.
pub struct MessageSender {
    socket: Arc<UdpSocket>,
    monitor: SocketAddr,
    next_id: AtomicU32,
}

impl MessageSender {
    pub fn new(socket: Arc<UdpSocket>, monitor: SocketAddr) -> Self {
        Self {
            socket,
            monitor,
            next_id: AtomicU32::new(0),
        }
    }

    pub fn send(&self, message: &DeviceMessage) -> Result<()> {
        let bytes = message::encode(message)?;
        self.socket.send_to(&bytes, self.monitor)?;
        debug!("Sent {} bytes to {}", bytes.len(), self.monitor);
        Ok(())
    }

    /// Announces the face to the monitor.
    pub fn ready(&self) -> Result<()> {
        info!("Sending ready to {}", self.monitor);
        self.send(&DeviceMessage::Ready)
    }

    /// Asks the monitor for fresh weather and stock data. Returns the
    /// transaction id used.
    pub fn request_refresh(&self) -> Result<u32> {
        let transaction_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.send(&DeviceMessage::AppMessage {
            transaction_id,
            entries: vec![(0, PayloadValue::Int(0))],
        })?;
        Ok(transaction_id)
    }

    pub fn ack(&self, transaction_id: u32) -> Result<()> {
        self.send(&DeviceMessage::Ack { transaction_id })
    }

    pub fn nack(&self, transaction_id: u32, reason: &str) -> Result<()> {
        self.send(&DeviceMessage::Nack {
            transaction_id,
            reason: reason.to_string(),
        })
    }
}

/// Spawns a thread that emits the local time each time the minute changes.
pub fn start_clock_thread(tick_tx: Sender<DateTime<Local>>, shutdown: Arc<AtomicBool>) {
    thread::spawn(move || {
        let mut last_minute = None;
        while !shutdown.load(Ordering::Relaxed) {
            let now = Local::now();
            let minute = (now.hour(), now.minute());
            if last_minute != Some(minute) {
                last_minute = Some(minute);
                if tick_tx.send(now).is_err() {
                    break;
                }
            }
            thread::sleep(Duration::from_millis(CLOCK_POLL_MS));
        }
        info!("Clock thread stopping...");
    });
}
