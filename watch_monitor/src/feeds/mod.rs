//! HTTP feeds polled once per cycle.
//!
//! Both feeds validate the response shape at the boundary: anything that does
//! not match surfaces as [`MonitorError::MalformedResponse`] instead of a
//! failed field access further down the pipeline.
//!
//! [`MonitorError::MalformedResponse`]: watch_common::MonitorError::MalformedResponse

pub mod quote;
pub mod weather;

pub use quote::{QuoteRecord, QuoteSource, YqlQuoteSource};
pub use weather::{OpenWeatherSource, WeatherSource};
