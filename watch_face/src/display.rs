//! In-memory face state: clock, weather line, stock line and the mood face.
use chrono::{DateTime, TimeZone, Timelike};
use std::fmt;
use watch_common::{AppKey, DevicePayload, MonitorError, Mood, PayloadKind, PayloadValue, Result};

/// Picture shown next to the stock line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceArt {
    Happy,
    Sad,
    StockUp,
    StockDown,
}

impl FaceArt {
    pub fn for_mood(mood: Mood) -> Self {
        match mood {
            Mood::Happy => FaceArt::Happy,
            Mood::Sad => FaceArt::Sad,
            Mood::VeryHappy => FaceArt::StockUp,
            Mood::VerySad => FaceArt::StockDown,
        }
    }

    /// Caption rendered under the face.
    pub fn alarm_text(self) -> &'static str {
        match self {
            FaceArt::Happy => "Keep up!",
            FaceArt::Sad => "God bless",
            FaceArt::StockUp => "$$$$$$$$$$$$$$$$",
            FaceArt::StockDown => "TAT, farewell",
        }
    }

    fn glyph(self) -> &'static str {
        match self {
            FaceArt::Happy => "(^_^)",
            FaceArt::Sad => "(;_;)",
            FaceArt::StockUp => "(^w^)",
            FaceArt::StockDown => "(T_T)",
        }
    }
}

impl fmt::Display for FaceArt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.glyph(), self.alarm_text())
    }
}

/// Everything the face currently displays. Fields stay empty until the first
/// payload carrying them arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaceState {
    pub clock: String,
    pub temperature: Option<i32>,
    pub conditions: Option<String>,
    pub symbol: Option<String>,
    pub current: Option<String>,
    pub change: Option<String>,
    pub face: Option<FaceArt>,
}

impl FaceState {
    /// Updates the clock; returns the minute it was set to.
    pub fn set_clock<Tz: TimeZone>(&mut self, now: &DateTime<Tz>, twelve_hour: bool) -> u32
    where
        Tz::Offset: fmt::Display,
    {
        let format = if twelve_hour { "%I:%M" } else { "%H:%M" };
        self.clock = now.format(format).to_string();
        now.minute()
    }

    /// Applies a complete weather or stock payload. Anything else is rejected
    /// and leaves the state untouched.
    pub fn apply(&mut self, payload: &DevicePayload) -> Result<PayloadKind> {
        let kind = payload.kind().ok_or_else(|| {
            MonitorError::InvalidPayload(String::from("incomplete or unknown key set"))
        })?;

        match kind {
            PayloadKind::Weather => {
                let temperature = int(payload, AppKey::Temperature)?;
                let conditions = text(payload, AppKey::Conditions)?;
                self.temperature = Some(temperature);
                self.conditions = Some(conditions);
            }
            PayloadKind::Stock => {
                let symbol = text(payload, AppKey::Symbol)?;
                let current = text(payload, AppKey::Current)?;
                let change = text(payload, AppKey::Change)?;
                let mood = Mood::try_from(int(payload, AppKey::Face)?)?;
                self.symbol = Some(symbol);
                self.current = Some(current);
                self.change = Some(change);
                self.face = Some(FaceArt::for_mood(mood));
            }
        }
        Ok(kind)
    }

    /// `"{temp}C, {conditions}"`, once weather has arrived.
    pub fn weather_line(&self) -> Option<String> {
        match (&self.temperature, &self.conditions) {
            (Some(temperature), Some(conditions)) => Some(format!("{temperature}C, {conditions}")),
            _ => None,
        }
    }

    /// `"{symbol} {change}\n{current}"`, once a quote has arrived.
    pub fn stock_line(&self) -> Option<String> {
        match (&self.symbol, &self.change, &self.current) {
            (Some(symbol), Some(change), Some(current)) => {
                Some(format!("{symbol} {change}\n{current}"))
            }
            _ => None,
        }
    }
}

impl fmt::Display for FaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.clock)?;
        if let Some(face) = self.face {
            writeln!(f, "{face}")?;
        }
        if let Some(line) = self.stock_line() {
            writeln!(f, "{line}")?;
        }
        match self.weather_line() {
            Some(line) => write!(f, "{line}"),
            None => write!(f, "Loading..."),
        }
    }
}

/// Whether a minute tick should ask the monitor for fresh data.
pub fn is_refresh_minute(minute: u32, every: u32) -> bool {
    every != 0 && minute % every == 0
}

fn int(payload: &DevicePayload, key: AppKey) -> Result<i32> {
    payload
        .get(key)
        .and_then(PayloadValue::as_int)
        .ok_or_else(|| MonitorError::InvalidPayload(format!("{key} is not an integer")))
}

fn text(payload: &DevicePayload, key: AppKey) -> Result<String> {
    payload
        .get(key)
        .and_then(PayloadValue::as_text)
        .map(str::to_string)
        .ok_or_else(|| MonitorError::InvalidPayload(format!("{key} is not text")))
}
