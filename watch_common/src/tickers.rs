//! Ticker symbols watched by the monitor.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Set of ticker symbols requested from the quote feed.
#[allow(missing_docs)]
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, Hash, Eq, PartialEq,
)]
#[strum(ascii_case_insensitive)]
pub enum Ticker {
    PBR,
    YHOO,
    NOK,
    GOOG,
    MSFT,
}

/// Tickers in the order they are requested. Only the first record of the
/// feed's answer is ever shown on the device, whatever symbol it carries.
pub const WATCHLIST: [Ticker; 5] = [
    Ticker::PBR,
    Ticker::YHOO,
    Ticker::NOK,
    Ticker::GOOG,
    Ticker::MSFT,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitive_symbols() {
        assert_eq!("goog".parse::<Ticker>().expect("known ticker"), Ticker::GOOG);
        assert!("AAPL".parse::<Ticker>().is_err());
    }

    #[test]
    fn watchlist_starts_with_pbr() {
        assert_eq!(WATCHLIST[0].to_string(), "PBR");
    }
}
