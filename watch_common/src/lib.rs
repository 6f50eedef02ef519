//!
//! Common types shared by the monitor and the watch face.
//!
//! This crate aggregates:
//! - `error`: unified error type `MonitorError` used across the workspace.
//! - `result`: handy `Result<T, MonitorError>` alias.
//! - `keys`: symbolic dictionary keys agreed with the device.
//! - `mood`: mood codes driving the face image.
//! - `payload`: bounded key/value payload sent to the device.
//! - `message`: UDP protocol messages between monitor and device.
//! - `tickers`: ticker symbols requested from the quote feed.
//! - `net`: networking constants and small helpers.
#![warn(missing_docs)]
pub mod error;
pub mod keys;
pub mod message;
pub mod mood;
pub mod net;
pub mod payload;
pub mod result;
pub mod tickers;

pub use error::MonitorError;
pub use keys::AppKey;
pub use mood::Mood;
pub use payload::{DevicePayload, PayloadKind, PayloadValue};
pub use result::Result;
