//! Symbolic keys agreed with the watch face.
//!
//! The numeric value of each key is what the device switches on when it reads
//! an incoming dictionary, so the discriminants must never be reordered.
use bincode::{Decode, Encode};
use strum_macros::{Display, EnumString};

/// Key of a single entry in a [`DevicePayload`](crate::payload::DevicePayload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum AppKey {
    /// Current temperature in degrees Celsius.
    Temperature = 0,
    /// Weather condition label (e.g. `Clouds`).
    Conditions = 1,
    /// Ticker symbol of the displayed quote.
    Symbol = 2,
    /// Ask price, rendered as text.
    Current = 3,
    /// Realtime change, rendered as text.
    Change = 4,
    /// Mood code driving the face image.
    Face = 5,
}

impl AppKey {
    /// Numeric identifier used on the device side.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Resolve a numeric identifier back into a key.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Temperature),
            1 => Some(Self::Conditions),
            2 => Some(Self::Symbol),
            3 => Some(Self::Current),
            4 => Some(Self::Change),
            5 => Some(Self::Face),
            _ => None,
        }
    }
}
