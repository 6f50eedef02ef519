use crate::device::{Delivery, PendingDeliveries, UdpDeviceChannel};
use crate::orchestrator::Event;
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::UnboundedSender;
use watch_common::message::{self, DeviceMessage, HostMessage};
use watch_common::net::DATAGRAM_BUFFER;
use watch_common::{AppKey, PayloadValue, Result};

/// UDP listener for everything the device sends to the monitor.
///
/// Readiness and application messages become orchestrator `Event`s; acks and
/// nacks complete the matching pending delivery.
pub struct DeviceListener {
    socket: Arc<UdpSocket>,
    pending: PendingDeliveries,
    events: UnboundedSender<Event>,
}

impl DeviceListener {
    /// Wrap a bound socket. Deliveries created for a ready device share `pending`.
    pub fn new(
        socket: Arc<UdpSocket>,
        pending: PendingDeliveries,
        events: UnboundedSender<Event>,
    ) -> Self {
        Self {
            socket,
            pending,
            events,
        }
    }

    /// Receive loop. Undecodable datagrams are logged and skipped; the loop
    /// ends when the orchestrator stops consuming events.
    pub async fn run(self) -> Result<()> {
        info!("Device listener started on {}", self.socket.local_addr()?);
        let mut buf = [0u8; DATAGRAM_BUFFER];
        loop {
            let (size, addr) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("UDP receive error: {}", e);
                    continue;
                }
            };
            let message = match message::decode::<DeviceMessage>(&buf[..size]) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Message from {} dropped: {}", addr, e);
                    continue;
                }
            };
            if let Some(event) = self.route(message, addr).await {
                if self.events.send(event).is_err() {
                    info!("Event consumer gone, device listener stopping");
                    return Ok(());
                }
            }
        }
    }

    async fn route(&self, message: DeviceMessage, addr: SocketAddr) -> Option<Event> {
        match message {
            DeviceMessage::Ready => {
                info!("Device at {} reports ready", addr);
                let abandoned = self.pending.abandon_except(addr);
                if abandoned > 0 {
                    info!("{} deliveries to a previous session abandoned", abandoned);
                }
                let device = UdpDeviceChannel::new(
                    Arc::clone(&self.socket),
                    addr,
                    self.pending.clone(),
                );
                Some(Event::Ready {
                    peer: addr,
                    device: Arc::new(device),
                })
            }
            DeviceMessage::AppMessage {
                transaction_id,
                entries,
            } => {
                debug!(
                    "App message {} from {}: {}",
                    transaction_id,
                    addr,
                    describe_entries(&entries)
                );
                if let Err(e) = self.acknowledge(transaction_id, addr).await {
                    warn!("Failed to ack app message {}: {}", transaction_id, e);
                }
                Some(Event::InboundMessage { peer: addr })
            }
            DeviceMessage::Ack { transaction_id } => {
                self.complete(transaction_id, Delivery::Acked);
                None
            }
            DeviceMessage::Nack {
                transaction_id,
                reason,
            } => {
                self.complete(transaction_id, Delivery::Nacked(reason));
                None
            }
        }
    }

    fn complete(&self, transaction_id: u32, delivery: Delivery) {
        if !self.pending.complete(transaction_id, delivery) {
            debug!("Answer for unknown transaction {} ignored", transaction_id);
        }
        debug!("{} deliveries still pending", self.pending.len());
    }

    async fn acknowledge(&self, transaction_id: u32, addr: SocketAddr) -> Result<()> {
        let bytes = message::encode(&HostMessage::Ack { transaction_id })?;
        self.socket.send_to(&bytes, addr).await?;
        Ok(())
    }
}

/// Renders raw entries with key names where the code is known.
fn describe_entries(entries: &[(u32, PayloadValue)]) -> String {
    entries
        .iter()
        .map(|(code, value)| match AppKey::from_code(*code) {
            Some(key) => format!("{key}={value:?}"),
            None => format!("#{code}={value:?}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use watch_common::{DevicePayload, MonitorError};

    async fn pair() -> (Arc<UdpSocket>, UdpSocket) {
        let monitor = Arc::new(UdpSocket::bind("127.0.0.1:0").await.expect("bind monitor"));
        let device = UdpSocket::bind("127.0.0.1:0").await.expect("bind device");
        (monitor, device)
    }

    async fn send(device: &UdpSocket, to: SocketAddr, message: &DeviceMessage) {
        let bytes = message::encode(message).expect("encodes");
        device.send_to(&bytes, to).await.expect("send");
    }

    #[tokio::test]
    async fn ready_then_app_message_produce_events_and_ack() {
        let (monitor, device) = pair().await;
        let monitor_addr = monitor.local_addr().expect("addr");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = DeviceListener::new(monitor, PendingDeliveries::default(), tx);
        tokio::spawn(listener.run());

        send(&device, monitor_addr, &DeviceMessage::Ready).await;
        let Some(Event::Ready { .. }) = rx.recv().await else {
            panic!("expected a ready event");
        };

        send(
            &device,
            monitor_addr,
            &DeviceMessage::AppMessage {
                transaction_id: 7,
                entries: vec![(AppKey::Face.code(), PayloadValue::Int(0))],
            },
        )
        .await;
        let Some(Event::InboundMessage { peer }) = rx.recv().await else {
            panic!("expected an inbound message event");
        };

        assert_eq!(peer, device.local_addr().expect("device addr"));

        let mut buf = [0u8; DATAGRAM_BUFFER];
        let (size, _) = device.recv_from(&mut buf).await.expect("ack");
        let ack: HostMessage = message::decode(&buf[..size]).expect("decodes");
        assert!(matches!(ack, HostMessage::Ack { transaction_id: 7 }));
    }

    #[tokio::test]
    async fn garbage_is_skipped_and_acks_complete_deliveries() {
        let (monitor, device) = pair().await;
        let monitor_addr = monitor.local_addr().expect("addr");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = DeviceListener::new(monitor, PendingDeliveries::default(), tx);
        tokio::spawn(listener.run());

        device.send_to(b"not a message", monitor_addr).await.expect("send");
        send(&device, monitor_addr, &DeviceMessage::Ready).await;
        let Some(Event::Ready { device: channel, .. }) = rx.recv().await else {
            panic!("expected a ready event");
        };

        let payload = DevicePayload::weather(5, "Snow").expect("valid");
        let delivery = tokio::spawn(async move { channel.send(payload).await });

        let mut buf = [0u8; DATAGRAM_BUFFER];
        let (size, _) = device.recv_from(&mut buf).await.expect("payload");
        let HostMessage::Payload { transaction_id, .. } =
            message::decode(&buf[..size]).expect("decodes")
        else {
            panic!("expected a payload");
        };
        send(&device, monitor_addr, &DeviceMessage::Ack { transaction_id }).await;

        let outcome = delivery.await.expect("joins").expect("delivered");
        assert_eq!(outcome, Delivery::Acked);
    }

    #[tokio::test]
    async fn restarted_face_abandons_deliveries_to_the_old_address() {
        let (monitor, old_face) = pair().await;
        let new_face = UdpSocket::bind("127.0.0.1:0").await.expect("bind new face");
        let monitor_addr = monitor.local_addr().expect("addr");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = DeviceListener::new(monitor, PendingDeliveries::default(), tx);
        tokio::spawn(listener.run());

        send(&old_face, monitor_addr, &DeviceMessage::Ready).await;
        let Some(Event::Ready { device: channel, .. }) = rx.recv().await else {
            panic!("expected a ready event");
        };
        let payload = DevicePayload::weather(5, "Snow").expect("valid");
        let delivery = tokio::spawn(async move { channel.send(payload).await });
        let mut buf = [0u8; DATAGRAM_BUFFER];
        old_face.recv_from(&mut buf).await.expect("payload reaches the old face");

        send(&new_face, monitor_addr, &DeviceMessage::Ready).await;
        let Some(Event::Ready { peer, .. }) = rx.recv().await else {
            panic!("expected a second ready event");
        };
        assert_eq!(peer, new_face.local_addr().expect("new face addr"));

        let err = delivery.await.expect("joins").expect_err("abandoned");
        assert!(matches!(err, MonitorError::DeliveryAbandoned(_)));
    }
}
