//! Error types shared between the monitor and the watch face.
//!
//! The `MonitorError` enum unifies the failure cases of a single cycle
//! (transport, schema, payload bounds) together with wrapped library errors, so
//! every crate in the workspace can propagate one error type.
use std::io;

use thiserror::Error;

/// Unified error type shared by the monitor and the device simulator.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// I/O error originating from sockets or files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Network or HTTP failure, including a non-success status code.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A feed answered, but the body does not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The quote feed answered with zero records.
    #[error("Quote feed returned no records")]
    EmptyFeed,

    /// Device coordinates could not be acquired.
    #[error("Error requesting location: {0}")]
    Location(String),

    /// A payload field is missing, misplaced or out of bounds.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The encoded payload does not fit into a single device message.
    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Encoded size in bytes.
        size: usize,
        /// Maximum accepted size in bytes.
        max: usize,
    },

    /// A mood code outside of the agreed range was received.
    #[error("Unknown mood code: {0}")]
    UnknownMood(i32),

    /// A pending delivery was dropped before the device answered.
    #[error("Delivery {0} abandoned before the device answered")]
    DeliveryAbandoned(u32),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Failure while decoding a device message with `bincode`.
    #[error("Bincode decode error: {0}")]
    BincodeDecode(#[from] bincode::error::DecodeError),

    /// Failure while encoding a device message with `bincode`.
    #[error("Bincode encode error: {0}")]
    BincodeEncode(#[from] bincode::error::EncodeError),
}
