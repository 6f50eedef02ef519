//! Device coordinates used to key the weather feed.
//!
//! The IP lookup is the only call in the monitor with an acquisition timeout.
//! A position younger than the staleness allowance is reused without a lookup.
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::debug;
use serde::Deserialize;
use watch_common::{MonitorError, Result};

use crate::http_client::{BoxFuture, HttpClient, HttpRequest};

/// Acquisition timeout for a fresh position.
pub const ACQUISITION_TIMEOUT: Duration = Duration::from_millis(15_000);
/// Oldest cached position that may still be reused.
pub const MAXIMUM_AGE: Duration = Duration::from_millis(60_000);

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return Err(MonitorError::Location(format!(
                "coordinates out of range: {latitude}, {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Resolves the current device coordinates.
pub trait LocationProvider: Send + Sync {
    fn locate(&self) -> BoxFuture<'_, Result<Coordinates>>;
}

/// Coordinates supplied by configuration.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

impl LocationProvider for FixedLocation {
    fn locate(&self) -> BoxFuture<'_, Result<Coordinates>> {
        let coordinates = self.0;
        Box::pin(async move { Ok(coordinates) })
    }
}

#[derive(Debug, Deserialize)]
struct IpLocationBody {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Position derived from the public IP address (`ip-api.com` response shape).
pub struct IpLocationProvider {
    http_client: Arc<dyn HttpClient>,
    url: String,
    timeout: Duration,
    maximum_age: Duration,
    cached: Mutex<Option<(Coordinates, Instant)>>,
}

impl IpLocationProvider {
    pub fn new(http_client: Arc<dyn HttpClient>, url: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
            timeout: ACQUISITION_TIMEOUT,
            maximum_age: MAXIMUM_AGE,
            cached: Mutex::new(None),
        }
    }

    #[cfg(test)]
    fn with_maximum_age(mut self, maximum_age: Duration) -> Self {
        self.maximum_age = maximum_age;
        self
    }

    fn fresh_cached(&self) -> Option<Coordinates> {
        let cached = self.cached.lock().ok()?;
        cached
            .filter(|(_, acquired)| acquired.elapsed() <= self.maximum_age)
            .map(|(coordinates, _)| coordinates)
    }

    fn store(&self, coordinates: Coordinates) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some((coordinates, Instant::now()));
        }
    }

    async fn acquire(&self) -> Result<Coordinates> {
        let request = HttpRequest::get(self.url.as_str()).with_timeout(self.timeout);
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| {
                if e.timed_out() {
                    MonitorError::Location(format!(
                        "no position within {} ms: {}",
                        self.timeout.as_millis(),
                        e.message()
                    ))
                } else {
                    MonitorError::Location(e.message().to_string())
                }
            })?;
        let body = response
            .into_success_body()
            .map_err(|e| MonitorError::Location(e.to_string()))?;
        parse_ip_location(&body)
    }
}

impl LocationProvider for IpLocationProvider {
    fn locate(&self) -> BoxFuture<'_, Result<Coordinates>> {
        Box::pin(async move {
            if let Some(coordinates) = self.fresh_cached() {
                debug!("Reusing cached position {:?}", coordinates);
                return Ok(coordinates);
            }
            let coordinates = self.acquire().await?;
            self.store(coordinates);
            Ok(coordinates)
        })
    }
}

fn parse_ip_location(body: &str) -> Result<Coordinates> {
    let parsed: IpLocationBody = serde_json::from_str(body)
        .map_err(|e| MonitorError::Location(format!("unreadable lookup response: {e}")))?;

    if let Some(status) = parsed.status.as_deref() {
        if status != "success" {
            let reason = parsed.message.unwrap_or_else(|| status.to_string());
            return Err(MonitorError::Location(format!("lookup failed: {reason}")));
        }
    }

    match (parsed.lat, parsed.lon) {
        (Some(latitude), Some(longitude)) => Coordinates::new(latitude, longitude),
        _ => Err(MonitorError::Location(String::from(
            "lookup response has no lat/lon",
        ))),
    }
}
