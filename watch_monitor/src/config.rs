//! Validated monitor configuration built from [`Args`].
use std::net::SocketAddr;

use crate::alert::{AlertTemplates, EmailSettings};
use crate::args::Args;
use crate::location::Coordinates;
use watch_common::{MonitorError, Result};

/// Where the weather branch gets its position from.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationSettings {
    Fixed(Coordinates),
    IpLookup { url: String },
}

/// Everything `main` needs to assemble the pipeline.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub bind: SocketAddr,
    pub quote_endpoint: String,
    pub weather_endpoint: String,
    pub weather_api_key: Option<String>,
    pub location: LocationSettings,
    /// `None` disables alerts.
    pub alerts: Option<(EmailSettings, AlertTemplates)>,
}

impl MonitorConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        let bind: SocketAddr = args
            .bind
            .parse()
            .map_err(|e| MonitorError::Config(format!("invalid bind address {}: {}", args.bind, e)))?;

        let location = match (args.latitude, args.longitude) {
            (Some(latitude), Some(longitude)) => {
                LocationSettings::Fixed(Coordinates::new(latitude, longitude)?)
            }
            (None, None) => LocationSettings::IpLookup {
                url: args.location_url,
            },
            _ => {
                return Err(MonitorError::Config(String::from(
                    "latitude and longitude must be given together",
                )));
            }
        };

        let alerts = match args.mandrill_key {
            None => None,
            Some(api_key) => {
                let settings = EmailSettings {
                    endpoint: args.mandrill_endpoint,
                    api_key,
                    from_email: args.from_email.unwrap_or_default(),
                    from_name: args.from_name,
                    to_email: args.to_email.unwrap_or_default(),
                    to_name: args.to_name,
                }
                .validate()?;
                let templates = match args.templates {
                    Some(path) => AlertTemplates::from_file(&path)?,
                    None => AlertTemplates::default(),
                };
                Some((settings, templates))
            }
        };

        Ok(Self {
            bind,
            quote_endpoint: args.quote_endpoint,
            weather_endpoint: args.weather_endpoint,
            weather_api_key: args.weather_api_key.filter(|key| !key.trim().is_empty()),
            location,
            alerts,
        })
    }
}
