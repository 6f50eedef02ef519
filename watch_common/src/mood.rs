//! Mood code shown on the watch face.
use bincode::{Decode, Encode};
use strum_macros::Display;

use crate::error::MonitorError;

/// Discrete signal derived from the displayed quote's movement.
///
/// The wire value is the integer sent under the `FACE` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode, Display)]
#[repr(i32)]
pub enum Mood {
    /// Flat or rising, below the alert threshold.
    Happy = 0,
    /// Falling, below the alert threshold.
    Sad = 1,
    /// Rate at or above the upper threshold.
    VeryHappy = 2,
    /// Rate at or below the lower threshold.
    VerySad = 3,
}

impl Mood {
    /// Integer code sent to the device.
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for Mood {
    type Error = MonitorError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Happy),
            1 => Ok(Self::Sad),
            2 => Ok(Self::VeryHappy),
            3 => Ok(Self::VerySad),
            other => Err(MonitorError::UnknownMood(other)),
        }
    }
}
