use std::sync::Arc;

use log::debug;
use serde::Deserialize;
use watch_common::tickers::Ticker;
use watch_common::{MonitorError, Result};

use crate::http_client::{BoxFuture, HttpClient, HttpRequest};

/// Query parameters appended after the YQL statement.
const YQL_SUFFIX: &str =
    "&format=json&diagnostics=true&env=http%3A%2F%2Fdatatables.org%2Falltables.env&callback=";

/// One quote as returned by the feed, already validated.
///
/// The numbers drive the classifier; the texts are what the feed wrote and
/// are what the device displays.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRecord {
    pub symbol: String,
    pub ask: f64,
    pub change: f64,
    pub ask_text: String,
    pub change_text: String,
}

#[cfg(test)]
impl QuoteRecord {
    /// Record whose texts are the plain renderings of the numbers.
    pub(crate) fn from_values(symbol: &str, ask: f64, change: f64) -> Self {
        Self {
            symbol: String::from(symbol),
            ask,
            change,
            ask_text: ask.to_string(),
            change_text: change.to_string(),
        }
    }
}

/// Issues one request for the watched tickers and returns the records in
/// feed order.
pub trait QuoteSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<QuoteRecord>>>;
}

/// Yahoo Finance quotes through the public YQL endpoint.
pub struct YqlQuoteSource {
    http_client: Arc<dyn HttpClient>,
    endpoint: String,
    tickers: Vec<Ticker>,
}

impl YqlQuoteSource {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        endpoint: impl Into<String>,
        tickers: &[Ticker],
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            tickers: tickers.to_vec(),
        }
    }

    pub fn url(&self) -> String {
        let symbols = self
            .tickers
            .iter()
            .map(|ticker| format!("\"{ticker}\""))
            .collect::<Vec<_>>()
            .join(",");
        let statement = format!("select * from yahoo.finance.quotes where symbol in ({symbols})");
        format!(
            "{}?q={}{}",
            self.endpoint,
            urlencoding::encode(&statement),
            YQL_SUFFIX
        )
    }
}

impl QuoteSource for YqlQuoteSource {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<QuoteRecord>>> {
        Box::pin(async move {
            let response = self.http_client.execute(HttpRequest::get(self.url())).await?;
            let body = response.into_success_body()?;
            parse_quotes(&body)
        })
    }
}

#[derive(Debug, Deserialize)]
struct YqlEnvelope {
    query: Option<YqlQuery>,
}

#[derive(Debug, Deserialize)]
struct YqlQuery {
    results: Option<YqlResults>,
}

#[derive(Debug, Deserialize)]
struct YqlResults {
    quote: Option<OneOrMany<YqlQuote>>,
}

/// YQL collapses a single-row result into a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

#[derive(Debug, Deserialize)]
struct YqlQuote {
    symbol: Option<String>,
    #[serde(rename = "AskRealtime")]
    ask_realtime: Option<Numeric>,
    #[serde(rename = "ChangeRealtime")]
    change_realtime: Option<Numeric>,
}

/// Numeric fields arrive as JSON strings (`"+0.12"`) or plain numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

/// Parses and validates a YQL quotes response. A response without results
/// yields an empty list. The first record is the one displayed, so a missing
/// or non-numeric field there rejects the whole response; unusable later
/// records are skipped.
pub(crate) fn parse_quotes(body: &str) -> Result<Vec<QuoteRecord>> {
    let envelope: YqlEnvelope = serde_json::from_str(body)
        .map_err(|e| MonitorError::MalformedResponse(format!("quote feed: {e}")))?;

    let query = envelope.query.ok_or_else(|| {
        MonitorError::MalformedResponse(String::from("quote feed: missing `query`"))
    })?;

    let quotes = match query.results.and_then(|results| results.quote) {
        None => return Ok(Vec::new()),
        Some(OneOrMany::One(quote)) => vec![quote],
        Some(OneOrMany::Many(quotes)) => quotes,
    };

    let mut quotes = quotes.into_iter().enumerate();
    let Some((index, first)) = quotes.next() else {
        return Ok(Vec::new());
    };
    let mut records = vec![validate(index, first)?];
    for (index, quote) in quotes {
        match validate(index, quote) {
            Ok(record) => records.push(record),
            Err(e) => debug!("Skipping unusable quote record: {}", e),
        }
    }
    Ok(records)
}

fn validate(index: usize, quote: YqlQuote) -> Result<QuoteRecord> {
    let symbol = quote
        .symbol
        .map(|symbol| symbol.trim().to_string())
        .filter(|symbol| !symbol.is_empty())
        .ok_or_else(|| malformed(index, "symbol", "missing"))?;
    let (ask, ask_text) = number(index, "AskRealtime", quote.ask_realtime)?;
    let (change, change_text) = number(index, "ChangeRealtime", quote.change_realtime)?;
    Ok(QuoteRecord {
        symbol,
        ask,
        change,
        ask_text,
        change_text,
    })
}

/// Numeric value and the text it was read from.
fn number(index: usize, field: &str, value: Option<Numeric>) -> Result<(f64, String)> {
    let (value, text) = match value {
        None => return Err(malformed(index, field, "missing")),
        Some(Numeric::Number(value)) => (value, value.to_string()),
        Some(Numeric::Text(text)) => {
            let text = text.trim().to_string();
            let value = text
                .parse::<f64>()
                .map_err(|_| malformed(index, field, &format!("not a number: {text:?}")))?;
            (value, text)
        }
    };
    if !value.is_finite() {
        return Err(malformed(index, field, "not finite"));
    }
    Ok((value, text))
}

fn malformed(index: usize, field: &str, reason: &str) -> MonitorError {
    MonitorError::MalformedResponse(format!("quote[{index}].{field}: {reason}"))
}
