//! Shared networking constants and helpers used by the monitor and the watch face.

/// UDP port the monitor listens on for device messages (device -> monitor).
pub const MONITOR_PORT: u16 = 8080;
/// UDP port the watch face listens on for payloads (monitor -> device).
pub const DEVICE_PORT: u16 = 8081;
/// Size of the receive buffer for a single datagram on either side.
pub const DATAGRAM_BUFFER: usize = 1024;

/// Formats a host and port as "ip:port", bracketing bare IPv6 hosts ("[::1]:port").
pub fn addr(ip: &str, port: u16) -> String {
    if ip.contains(':') && !ip.starts_with('[') {
        format!("[{}]:{}", ip, port)
    } else {
        format!("{}:{}", ip, port)
    }
}
