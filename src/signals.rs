// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::can::{Error, FrameSink};
use log::debug;

/// CAN identifier for the battery level signal.
pub const BATTERY_ID: u32 = 0x100;
/// CAN identifier for the velocity signal.
pub const VELOCITY_ID: u32 = 0x101;
/// CAN identifier for the charging active flag.
pub const CHARGING_ACTIVE_ID: u32 = 0x102;
/// CAN identifier for the charge request flag.
pub const CHARGE_REQUEST_ID: u32 = 0x103;

/// Telemetry signal values with their fixed frame encodings.
///
/// Each variant is bound to one arbitration identifier and one payload
/// layout; see [`Signal::id`] and [`Signal::encode`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// State of charge, raw 0-255
    BatteryLevel(u8),
    /// Vehicle velocity, IEEE-754 single precision
    Velocity(f32),
    /// Charger currently delivering power
    ChargingActive(bool),
    /// Vehicle requesting a charge cycle
    ChargeRequest(bool),
}

impl Signal {
    /// Fixed arbitration identifier for this signal.
    pub fn id(&self) -> u32 {
        match self {
            Signal::BatteryLevel(_) => BATTERY_ID,
            Signal::Velocity(_) => VELOCITY_ID,
            Signal::ChargingActive(_) => CHARGING_ACTIVE_ID,
            Signal::ChargeRequest(_) => CHARGE_REQUEST_ID,
        }
    }

    /// Encode the value into `buf`, returning the payload length.
    ///
    /// Velocity is the native-endian bit pattern of the float; the flags and
    /// battery level are single bytes.
    pub fn encode(&self, buf: &mut [u8; 4]) -> usize {
        match *self {
            Signal::BatteryLevel(level) => {
                buf[0] = level;
                1
            }
            Signal::Velocity(velocity) => {
                buf.copy_from_slice(&velocity.to_ne_bytes());
                4
            }
            Signal::ChargingActive(active) => {
                buf[0] = active as u8;
                1
            }
            Signal::ChargeRequest(request) => {
                buf[0] = request as u8;
                1
            }
        }
    }
}

/// Encode and transmit one telemetry signal, mirroring the transport result.
pub fn send_signal(sink: &mut dyn FrameSink, signal: Signal) -> Result<(), Error> {
    let mut buf = [0u8; 4];
    let len = signal.encode(&mut buf);
    sink.send(signal.id(), &buf[..len])?;
    debug!("sent {:?}", signal);
    Ok(())
}
