//! Command-line arguments for the watch monitor.
//!
//! Credentials may also come from the environment so they stay out of shell history.
use clap::Parser;
use std::path::PathBuf;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Local address the device protocol listens on.
    #[clap(long, default_value = "0.0.0.0:8080")]
    pub bind: String,

    /// Quote service endpoint (YQL-compatible).
    #[clap(long, default_value = "https://query.yahooapis.com/v1/public/yql")]
    pub quote_endpoint: String,

    /// Current-weather service endpoint.
    #[clap(long, default_value = "http://api.openweathermap.org/data/2.5/weather")]
    pub weather_endpoint: String,

    /// Optional API key appended to weather requests.
    #[clap(long, env = "OPENWEATHER_API_KEY")]
    pub weather_api_key: Option<String>,

    /// Fixed latitude; use together with `--longitude` to skip IP geolocation.
    #[clap(long, allow_hyphen_values = true)]
    pub latitude: Option<f64>,

    /// Fixed longitude; use together with `--latitude`.
    #[clap(long, allow_hyphen_values = true)]
    pub longitude: Option<f64>,

    /// IP geolocation endpoint used when no fixed position is given.
    #[clap(long, default_value = "http://ip-api.com/json")]
    pub location_url: String,

    /// Email provider key. Alerts are disabled when absent.
    #[clap(long, env = "MANDRILL_API_KEY")]
    pub mandrill_key: Option<String>,

    /// Email provider send endpoint.
    #[clap(long, default_value = "https://mandrillapp.com/api/1.0/messages/send.json")]
    pub mandrill_endpoint: String,

    /// Alert sender address.
    #[clap(long, env = "ALERT_FROM_EMAIL")]
    pub from_email: Option<String>,

    /// Alert sender display name.
    #[clap(long, default_value = "Watch Monitor")]
    pub from_name: String,

    /// Alert recipient address.
    #[clap(long, env = "ALERT_TO_EMAIL")]
    pub to_email: Option<String>,

    /// Alert recipient display name.
    #[clap(long, default_value = "")]
    pub to_name: String,

    /// JSON file with `up`/`down` alert templates.
    #[clap(long)]
    pub templates: Option<PathBuf>,
}
