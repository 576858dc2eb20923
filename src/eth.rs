// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::can::FrameSink;
use crate::signals::{self, Signal};
use log::{debug, info, warn};
use serde_json::Value;
use std::{
    io::{self, Read},
    net::{TcpListener, TcpStream},
    time::Duration,
};

/// Default TCP port for the telemetry ingress.
pub const DEFAULT_PORT: u16 = 5000;

const READ_BUF: usize = 1024;

// A connected-but-silent client must not stall the control loop, so reads on
// accepted sockets carry a short deadline.
const CLIENT_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// JSON-over-TCP ingress feeding the telemetry signal encoder.
///
/// Clients connect, send one `{"signal": "<name>", "value": <v>}` message
/// and are disconnected. Malformed or unrecognized input is dropped without
/// a response.
pub struct TelemetryIngress {
    listener: TcpListener,
}

impl TelemetryIngress {
    /// Bind the listening socket and switch it to non-blocking accepts.
    pub fn bind(port: u16) -> io::Result<TelemetryIngress> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        info!("telemetry ingress listening on port {}", port);
        Ok(TelemetryIngress { listener })
    }

    /// Service at most one pending connection, returning immediately when
    /// none is waiting.
    pub fn poll(&mut self, sink: &mut dyn FrameSink) {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                debug!("telemetry client connected: {}", peer);
                handle_client(stream, sink);
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => (),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => (),
            Err(err) => warn!("telemetry accept error: {}", err),
        }
    }
}

fn handle_client(mut stream: TcpStream, sink: &mut dyn FrameSink) {
    if let Err(err) = stream.set_read_timeout(Some(CLIENT_READ_TIMEOUT)) {
        debug!("failed to set client read timeout: {}", err);
    }

    let mut buf = [0u8; READ_BUF];
    let n = match stream.read(&mut buf) {
        Ok(n) if n > 0 => n,
        Ok(_) => return,
        Err(err) => {
            debug!("telemetry client read error: {}", err);
            return;
        }
    };

    match parse_signal(&buf[..n]) {
        Some(signal) => {
            if let Err(err) = signals::send_signal(sink, signal) {
                warn!("telemetry send failed: {}", err);
            }
        }
        None => debug!("dropping unparseable telemetry payload"),
    }
    // connection closes on drop; one message per connection
}

/// Extract a telemetry signal from a payload of the form
/// `{"signal": "<name>", "value": <v>}`.
///
/// The first non-empty line of the buffer is parsed as one JSON document.
/// Values are coerced per signal: battery level as an integer (floats
/// truncate, the result wraps into a byte), velocity as a float, and the
/// charging flags as boolean-ish values. Anything else yields `None`.
pub fn parse_signal(raw: &[u8]) -> Option<Signal> {
    let text = std::str::from_utf8(raw).ok()?;
    let line = text.lines().find(|line| !line.trim().is_empty())?;
    let doc: Value = serde_json::from_str(line.trim()).ok()?;

    let name = doc.get("signal")?.as_str()?;
    let value = doc.get("value")?;

    match name {
        "battery_level" => {
            let level = value
                .as_i64()
                .or_else(|| value.as_f64().map(|v| v as i64))?;
            Some(Signal::BatteryLevel(level as u8))
        }
        "velocity" => Some(Signal::Velocity(value.as_f64()? as f32)),
        "charging_active" => Some(Signal::ChargingActive(parse_flag(value)?)),
        "charge_request" => Some(Signal::ChargeRequest(parse_flag(value)?)),
        _ => None,
    }
}

/// Boolean coercion kept compatible with existing senders: JSON `true`, the
/// number 1, or a string containing "true" or "1" all read as set.
fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(num) => Some(num.as_i64() == Some(1) || num.as_f64() == Some(1.0)),
        Value::String(text) => Some(text.contains("true") || text.contains('1')),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_battery_level() {
        assert_eq!(
            parse_signal(br#"{"signal": "battery_level", "value": 87}"#),
            Some(Signal::BatteryLevel(87))
        );
        // floats truncate on the way to an integer level
        assert_eq!(
            parse_signal(br#"{"signal": "battery_level", "value": 42.9}"#),
            Some(Signal::BatteryLevel(42))
        );
        // out-of-range wraps into a byte
        assert_eq!(
            parse_signal(br#"{"signal": "battery_level", "value": 300}"#),
            Some(Signal::BatteryLevel(44))
        );
    }

    #[test]
    fn test_parse_velocity() {
        assert_eq!(
            parse_signal(br#"{"signal": "velocity", "value": -12.5}"#),
            Some(Signal::Velocity(-12.5))
        );
        assert_eq!(
            parse_signal(br#"{"signal": "velocity", "value": 50}"#),
            Some(Signal::Velocity(50.0))
        );
    }

    #[test]
    fn test_parse_flags() {
        assert_eq!(
            parse_signal(br#"{"signal": "charging_active", "value": true}"#),
            Some(Signal::ChargingActive(true))
        );
        assert_eq!(
            parse_signal(br#"{"signal": "charging_active", "value": false}"#),
            Some(Signal::ChargingActive(false))
        );
        assert_eq!(
            parse_signal(br#"{"signal": "charge_request", "value": 1}"#),
            Some(Signal::ChargeRequest(true))
        );
        assert_eq!(
            parse_signal(br#"{"signal": "charge_request", "value": 0}"#),
            Some(Signal::ChargeRequest(false))
        );
        assert_eq!(
            parse_signal(br#"{"signal": "charging_active", "value": "true"}"#),
            Some(Signal::ChargingActive(true))
        );
        assert_eq!(
            parse_signal(br#"{"signal": "charging_active", "value": "1"}"#),
            Some(Signal::ChargingActive(true))
        );
        assert_eq!(
            parse_signal(br#"{"signal": "charging_active", "value": "off"}"#),
            Some(Signal::ChargingActive(false))
        );
    }

    #[test]
    fn test_first_line_wins() {
        let raw = b"\n{\"signal\": \"battery_level\", \"value\": 5}\n{\"signal\": \"velocity\", \"value\": 1.0}\n";
        assert_eq!(parse_signal(raw), Some(Signal::BatteryLevel(5)));
    }

    #[test]
    fn test_malformed_input_dropped() {
        assert_eq!(parse_signal(b""), None);
        assert_eq!(parse_signal(b"not json"), None);
        assert_eq!(parse_signal(&[0xFF, 0xFE, 0x00]), None);
        assert_eq!(parse_signal(br#"{"signal": "battery_level"}"#), None);
        assert_eq!(parse_signal(br#"{"value": 10}"#), None);
        assert_eq!(
            parse_signal(br#"{"signal": "unknown_signal", "value": 1}"#),
            None
        );
        assert_eq!(
            parse_signal(br#"{"signal": "velocity", "value": "fast"}"#),
            None
        );
        assert_eq!(
            parse_signal(br#"{"signal": "charging_active", "value": null}"#),
            None
        );
    }
}
