//! Watch monitor: fetches weather and stock quotes and pushes them to a paired watch face.
//!
//! The monitor binds one UDP socket and waits for the face to announce itself.
//! From then on every readiness signal or application message from the face
//! starts two independent cycles:
//!
//! - weather: locate → current-weather feed → `{temperature, conditions}` payload;
//! - stock: quote feed → first record → mood classification → `{symbol, current,
//!   change, face}` payload, plus an email alert when the price moved by 5 % or more.
//!
//! Usage example (CLI):
//! ```bash
//! MANDRILL_API_KEY=... watch_monitor --from-email monitor@example.com --to-email me@example.com
//! ```
#![warn(missing_docs)]
mod alert;
mod args;
mod classifier;
mod config;
mod device;
mod feeds;
mod http_client;
mod listener;
mod location;
mod orchestrator;

use crate::alert::{AlertDispatcher, DisabledDispatcher, MandrillDispatcher};
use crate::args::Args;
use crate::config::{LocationSettings, MonitorConfig};
use crate::device::PendingDeliveries;
use crate::feeds::{OpenWeatherSource, YqlQuoteSource};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::listener::DeviceListener;
use crate::location::{FixedLocation, IpLocationProvider, LocationProvider};
use crate::orchestrator::{Orchestrator, Pipeline};
use clap::Parser;
use log::{error, info};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use watch_common::tickers::WATCHLIST;
use watch_common::{MonitorError, Result};

fn build_pipeline(config: &MonitorConfig, http_client: Arc<dyn HttpClient>) -> Pipeline {
    let location: Arc<dyn LocationProvider> = match &config.location {
        LocationSettings::Fixed(coordinates) => Arc::new(FixedLocation(*coordinates)),
        LocationSettings::IpLookup { url } => {
            Arc::new(IpLocationProvider::new(Arc::clone(&http_client), url.clone()))
        }
    };
    let alerts: Arc<dyn AlertDispatcher> = match &config.alerts {
        Some((settings, templates)) => Arc::new(MandrillDispatcher::new(
            Arc::clone(&http_client),
            settings.clone(),
            templates.clone(),
        )),
        None => Arc::new(DisabledDispatcher),
    };
    Pipeline {
        location,
        weather: Arc::new(OpenWeatherSource::new(
            Arc::clone(&http_client),
            config.weather_endpoint.clone(),
            config.weather_api_key.clone(),
        )),
        quotes: Arc::new(YqlQuoteSource::new(
            http_client,
            config.quote_endpoint.clone(),
            &WATCHLIST,
        )),
        alerts,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), MonitorError> {
    init_logger();
    let config = MonitorConfig::from_args(Args::parse())?;
    if config.alerts.is_none() {
        info!("No email provider key configured; alerts are disabled");
    }

    let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let pipeline = build_pipeline(&config, http_client);

    let socket = Arc::new(UdpSocket::bind(config.bind).await?);
    info!("UDP socket created on: {}", socket.local_addr()?);

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let listener = DeviceListener::new(socket, PendingDeliveries::default(), events_tx);
    let orchestrator = Orchestrator::new(pipeline);

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received. Shutting down monitor..."),
            Err(e) => {
                error!("Ctrl+C handler unavailable: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    tokio::select! {
        result = listener.run() => {
            if let Err(e) = result {
                error!("Device listener failed: {}", e);
                return Err(e);
            }
        }
        _ = orchestrator.run(events_rx, shutdown) => {}
    }
    Ok(())
}

fn init_logger() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
