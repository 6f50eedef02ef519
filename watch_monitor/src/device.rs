//! Delivery of payloads to the paired watch face.
//!
//! Every `send` is exactly one attempt: the payload goes out in one datagram
//! tagged with a fresh transaction id, and the future resolves when the device
//! answers that id with an ack or a nack. There is no timeout and no resend.
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use log::debug;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use watch_common::message::{self, HostMessage};
use watch_common::{DevicePayload, MonitorError, Result};

use crate::http_client::BoxFuture;

/// Answer of the device to one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Acked,
    Nacked(String),
}

/// One-shot delivery of a payload to the device.
pub trait DeviceChannel: Send + Sync {
    fn send(&self, payload: DevicePayload) -> BoxFuture<'_, Result<Delivery>>;
}

/// Deliveries waiting for the device's answer, keyed by transaction id.
#[derive(Debug, Clone, Default)]
pub struct PendingDeliveries {
    waiting: Arc<Mutex<HashMap<u32, (SocketAddr, oneshot::Sender<Delivery>)>>>,
    next_id: Arc<AtomicU32>,
}

impl PendingDeliveries {
    /// Allocates a transaction id for a delivery to `peer` and the receiver
    /// its answer will arrive on.
    pub fn register(&self, peer: SocketAddr) -> (u32, oneshot::Receiver<Delivery>) {
        let transaction_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        if let Ok(mut waiting) = self.waiting.lock() {
            waiting.insert(transaction_id, (peer, tx));
        }
        (transaction_id, rx)
    }

    /// Routes the device's answer. Returns `false` for an unknown id.
    pub fn complete(&self, transaction_id: u32, delivery: Delivery) -> bool {
        let sender = match self.waiting.lock() {
            Ok(mut waiting) => waiting.remove(&transaction_id),
            Err(_) => None,
        };
        match sender {
            Some((_, sender)) => sender.send(delivery).is_ok(),
            None => false,
        }
    }

    /// Drops every delivery addressed to a peer other than `peer`; their
    /// sends resolve to `DeliveryAbandoned`. Returns how many were dropped.
    pub fn abandon_except(&self, peer: SocketAddr) -> usize {
        match self.waiting.lock() {
            Ok(mut waiting) => {
                let before = waiting.len();
                waiting.retain(|_, (target, _)| *target == peer);
                before - waiting.len()
            }
            Err(_) => 0,
        }
    }

    /// Forgets a delivery that never left the monitor.
    pub fn cancel(&self, transaction_id: u32) {
        if let Ok(mut waiting) = self.waiting.lock() {
            waiting.remove(&transaction_id);
        }
    }

    pub fn len(&self) -> usize {
        self.waiting.lock().map(|waiting| waiting.len()).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Device channel over the monitor's UDP socket.
pub struct UdpDeviceChannel {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    pending: PendingDeliveries,
}

impl UdpDeviceChannel {
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr, pending: PendingDeliveries) -> Self {
        Self {
            socket,
            peer,
            pending,
        }
    }

    async fn transmit(&self, transaction_id: u32, payload: DevicePayload) -> Result<()> {
        let bytes = message::encode(&HostMessage::Payload {
            transaction_id,
            payload,
        })?;
        self.socket.send_to(&bytes, self.peer).await?;
        debug!(
            "Payload {} ({} bytes) sent to {}",
            transaction_id,
            bytes.len(),
            self.peer
        );
        Ok(())
    }
}

impl DeviceChannel for UdpDeviceChannel {
    fn send(&self, payload: DevicePayload) -> BoxFuture<'_, Result<Delivery>> {
        Box::pin(async move {
            let (transaction_id, answer) = self.pending.register(self.peer);
            if let Err(e) = self.transmit(transaction_id, payload).await {
                self.pending.cancel(transaction_id);
                return Err(e);
            }
            answer
                .await
                .map_err(|_| MonitorError::DeliveryAbandoned(transaction_id))
        })
    }
}
