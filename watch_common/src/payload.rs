//! Bounded key/value payload delivered to the watch face.
//!
//! A `DevicePayload` is built for exactly one data source and sent as a single
//! unit. The constructors are the only way to build one, and both refuse to
//! produce a payload that breaks a bound, so a partially filled or oversized
//! dictionary can never reach the device.
use bincode::{Decode, Encode};

use crate::error::MonitorError;
use crate::keys::AppKey;
use crate::mood::Mood;
use crate::result::Result;

/// Longest text value accepted in a single entry, in bytes.
pub const MAX_TEXT_LEN: usize = 32;
/// Largest encoded payload accepted by the device, in bytes.
pub const MAX_PAYLOAD_BYTES: usize = 256;

/// Keys of a weather payload, in send order.
pub const WEATHER_KEYS: [AppKey; 2] = [AppKey::Temperature, AppKey::Conditions];
/// Keys of a stock payload, in send order.
pub const STOCK_KEYS: [AppKey; 4] = [AppKey::Symbol, AppKey::Current, AppKey::Change, AppKey::Face];

/// Scalar value stored under an [`AppKey`].
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum PayloadValue {
    /// Signed integer (temperature, mood code).
    Int(i32),
    /// Short text (labels, symbols, decimals rendered as text).
    Text(String),
}

impl PayloadValue {
    /// Integer content, if this is an `Int`.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    /// Text content, if this is a `Text`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Int(_) => None,
            Self::Text(value) => Some(value),
        }
    }
}

/// Which data source a payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// `{TEMPERATURE, CONDITIONS}`
    Weather,
    /// `{SYMBOL, CURRENT, CHANGE, FACE}`
    Stock,
}

/// Ordered mapping of device keys to scalar values.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct DevicePayload {
    entries: Vec<(AppKey, PayloadValue)>,
}

impl DevicePayload {
    /// Builds the weather payload.
    pub fn weather(temperature_celsius: i32, condition: &str) -> Result<Self> {
        Self::checked(vec![
            (AppKey::Temperature, PayloadValue::Int(temperature_celsius)),
            (AppKey::Conditions, text(AppKey::Conditions, condition)?),
        ])
    }

    /// Builds the stock payload. `current` and `change` are forwarded as the
    /// feed wrote them (`"8.50"`, `"+0.12"`), the mood as its integer code.
    pub fn stock(symbol: &str, current: &str, change: &str, mood: Mood) -> Result<Self> {
        Self::checked(vec![
            (AppKey::Symbol, text(AppKey::Symbol, symbol)?),
            (AppKey::Current, text(AppKey::Current, current)?),
            (AppKey::Change, text(AppKey::Change, change)?),
            (AppKey::Face, PayloadValue::Int(mood.code())),
        ])
    }

    /// Entries in send order.
    pub fn entries(&self) -> &[(AppKey, PayloadValue)] {
        &self.entries
    }

    /// Value stored under `key`.
    pub fn get(&self, key: AppKey) -> Option<&PayloadValue> {
        self.entries
            .iter()
            .find(|(entry_key, _)| *entry_key == key)
            .map(|(_, value)| value)
    }

    /// Classifies the payload by its exact key set. Returns `None` for any
    /// other combination, including duplicated or missing keys.
    pub fn kind(&self) -> Option<PayloadKind> {
        let keys: Vec<AppKey> = self.entries.iter().map(|(key, _)| *key).collect();
        if keys == WEATHER_KEYS {
            Some(PayloadKind::Weather)
        } else if keys == STOCK_KEYS {
            Some(PayloadKind::Stock)
        } else {
            None
        }
    }

    /// Size of the payload once encoded for the wire.
    pub fn encoded_len(&self) -> Result<usize> {
        let bytes = bincode::encode_to_vec(self, bincode::config::standard())?;
        Ok(bytes.len())
    }

    fn checked(entries: Vec<(AppKey, PayloadValue)>) -> Result<Self> {
        let payload = Self { entries };
        let size = payload.encoded_len()?;
        if size > MAX_PAYLOAD_BYTES {
            return Err(MonitorError::PayloadTooLarge {
                size,
                max: MAX_PAYLOAD_BYTES,
            });
        }
        Ok(payload)
    }
}

fn text(key: AppKey, value: &str) -> Result<PayloadValue> {
    if value.is_empty() {
        return Err(MonitorError::InvalidPayload(format!("{key} is empty")));
    }
    if value.len() > MAX_TEXT_LEN {
        return Err(MonitorError::InvalidPayload(format!(
            "{key} is {} bytes long (max {MAX_TEXT_LEN})",
            value.len()
        )));
    }
    Ok(PayloadValue::Text(value.to_string()))
}
