//! Messages exchanged between the monitor and the watch face.
//!
//! Every UDP datagram carries exactly one message, encoded with `bincode`'s
//! standard configuration. Deliveries are matched to their acknowledgements by
//! `transaction_id`.
use bincode::{Decode, Encode};

use crate::error::MonitorError;
use crate::payload::{DevicePayload, PayloadValue};
use crate::result::Result;

/// Message sent by the device to the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum DeviceMessage {
    /// Session is established; fired once when the face starts.
    Ready,
    /// Application message from the face. Its entries are not interpreted by
    /// the monitor; receiving one requests a refresh.
    AppMessage {
        /// Identifier echoed back in the monitor's `Ack`.
        transaction_id: u32,
        /// Raw key/value entries as written by the face.
        entries: Vec<(u32, PayloadValue)>,
    },
    /// Payload with this id was accepted.
    Ack {
        /// Id of the acknowledged `HostMessage::Payload`.
        transaction_id: u32,
    },
    /// Payload with this id was refused.
    Nack {
        /// Id of the refused `HostMessage::Payload`.
        transaction_id: u32,
        /// Human-readable cause.
        reason: String,
    },
}

/// Message sent by the monitor to the device.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum HostMessage {
    /// One atomic payload to display.
    Payload {
        /// Identifier the device must answer with.
        transaction_id: u32,
        /// Dictionary to apply.
        payload: DevicePayload,
    },
    /// Acknowledges a `DeviceMessage::AppMessage`.
    Ack {
        /// Id of the acknowledged application message.
        transaction_id: u32,
    },
}

/// Encodes a message into a datagram.
pub fn encode<T: Encode>(message: &T) -> Result<Vec<u8>> {
    Ok(bincode::encode_to_vec(message, bincode::config::standard())?)
}

/// Decodes a datagram into a message. Trailing bytes are rejected.
pub fn decode<T: Decode<()>>(bytes: &[u8]) -> Result<T> {
    let (message, read) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
    if read != bytes.len() {
        return Err(MonitorError::InvalidPayload(format!(
            "{} trailing bytes after message",
            bytes.len() - read
        )));
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mood::Mood;

    #[test]
    fn payload_message_survives_the_wire() {
        let payload = DevicePayload::stock("GOOG", "530.50", "-2.25", Mood::Sad).expect("valid");
        let message = HostMessage::Payload {
            transaction_id: 7,
            payload,
        };

        let bytes = encode(&message).expect("encodes");
        let decoded: HostMessage = decode(&bytes).expect("decodes");
        assert_eq!(decoded, message);
    }

    #[test]
    fn rejects_trailing_garbage() {
        let mut bytes = encode(&DeviceMessage::Ready).expect("encodes");
        bytes.extend_from_slice(&[0xFF, 0xFF]);
        let err = decode::<DeviceMessage>(&bytes).expect_err("trailing bytes");
        assert!(matches!(err, MonitorError::InvalidPayload(_)));
    }

    #[test]
    fn rejects_truncated_datagram() {
        let bytes = encode(&DeviceMessage::Nack {
            transaction_id: 3,
            reason: String::from("incomplete payload"),
        })
        .expect("encodes");
        let err = decode::<DeviceMessage>(&bytes[..bytes.len() - 4]).expect_err("truncated");
        assert!(matches!(err, MonitorError::BincodeDecode(_)));
    }
}
