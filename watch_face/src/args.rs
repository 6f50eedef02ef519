//! Command-line arguments for the watch face simulator.
use clap::Parser;
use watch_common::net::{DEVICE_PORT, MONITOR_PORT};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Monitor IP address (IPv4 or IPv6).
    #[clap(long, default_value = "127.0.0.1")]
    pub monitor_ip: String,

    /// Monitor UDP port.
    #[clap(long, default_value_t = MONITOR_PORT)]
    pub monitor_port: u16,

    /// Local UDP port the face listens on.
    #[clap(long, default_value_t = DEVICE_PORT)]
    pub listen_port: u16,

    /// Request fresh data whenever the clock minute is a multiple of this value.
    #[clap(long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..=60))]
    pub refresh_minutes: u32,

    /// Show the clock in 12-hour format.
    #[clap(long)]
    pub twelve_hour: bool,
}
