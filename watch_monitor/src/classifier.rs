//! Quote classification: price-movement rate, mood code and alert decision.
//!
//! The evaluation order matters. The sign of `change` sets a base mood, then
//! the rate thresholds overwrite it, so a small negative change that still
//! produces a rate at or above 1.05 ends up `VeryHappy`.
use watch_common::{DevicePayload, Mood, Result};

use crate::alert::AlertDirection;
use crate::feeds::QuoteRecord;

/// Rate at or above which the quote is considered soaring.
pub const RATE_UP: f64 = 1.05;
/// Rate at or below which (and above zero) the quote is considered dropping.
pub const RATE_DOWN: f64 = 0.95;

/// Outcome of classifying one quote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub mood: Mood,
    /// `ask / (ask - change)`; `None` when `ask == change` and no division
    /// took place.
    pub rate: Option<f64>,
    pub alert: Option<AlertDirection>,
}

/// Classifies a quote. Pure: identical input gives identical output.
pub fn classify(quote: &QuoteRecord) -> Classification {
    let ask = quote.ask;
    let change = quote.change;

    // Guards the division below: for finite doubles `ask - change == 0`
    // exactly when `ask == change`.
    if ask == change {
        return Classification {
            mood: Mood::Happy,
            rate: None,
            alert: None,
        };
    }

    let rate = ask / (ask - change);
    let base = if change < 0.0 { Mood::Sad } else { Mood::Happy };

    let (mood, alert) = if rate >= RATE_UP {
        (Mood::VeryHappy, Some(AlertDirection::Up))
    } else if rate <= RATE_DOWN && rate > 0.0 {
        (Mood::VerySad, Some(AlertDirection::Down))
    } else {
        (base, None)
    };

    Classification {
        mood,
        rate: Some(rate),
        alert,
    }
}

/// Stock payload for a classified quote.
pub fn stock_payload(quote: &QuoteRecord, classification: &Classification) -> Result<DevicePayload> {
    DevicePayload::stock(
        &quote.symbol,
        &quote.ask_text,
        &quote.change_text,
        classification.mood,
    )
}
