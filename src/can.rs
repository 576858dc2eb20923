// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use log::{debug, error, info};
use std::{fmt, io};

#[cfg(feature = "can")]
use socketcan::{CanFrame, CanSocket, EmbeddedFrame, Frame as _, Socket, StandardId};

/// Default CAN interface when none is configured.
pub const DEFAULT_INTERFACE: &str = "can0";

/// Maximum data bytes in a classic CAN frame.
pub const CAN_MAX_DLEN: usize = 8;

/// Transport error types.
#[derive(Debug)]
pub enum Error {
    /// No socket is bound; open the transport first
    NotOpen,
    /// Socket creation or bind failed
    Open(io::Error),
    /// Frame transmission failed
    Send(io::Error),
    /// Frame reception failed
    Recv(io::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::NotOpen => write!(f, "can socket not open"),
            Error::Open(err) => write!(f, "can open failed: {}", err),
            Error::Send(err) => write!(f, "can send failed: {}", err),
            Error::Recv(err) => write!(f, "can recv failed: {}", err),
        }
    }
}

/// Frame transmission interface.
///
/// The protocol engine and the telemetry encoder only need to put frames on
/// the bus, so they take this trait instead of the concrete transport. Tests
/// substitute a capturing sink.
pub trait FrameSink {
    /// Transmit a single frame. Payloads beyond 8 bytes are truncated and
    /// identifiers are masked to the standard 11-bit range.
    fn send(&mut self, id: u32, data: &[u8]) -> Result<(), Error>;
}

/// Inbound CAN data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    /// Arbitration identifier
    pub id: u32,
    /// Data bytes, only the first `len` are valid
    pub data: [u8; CAN_MAX_DLEN],
    /// Payload length in bytes (0-8)
    pub len: usize,
}

impl Packet {
    /// The valid payload bytes of this frame.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

/// Store an interface name in the fixed space the kernel allows, truncating
/// anything longer.
fn clamp_ifname(name: &str) -> String {
    name.chars().take(libc::IFNAMSIZ - 1).collect()
}

/// CAN bus transport over a raw SocketCAN socket bound to one interface.
///
/// The socket runs in non-blocking mode so the single-threaded control loop
/// can poll it between TCP accepts.
#[cfg(feature = "can")]
pub struct CanTransport {
    ifname: String,
    socket: Option<CanSocket>,
}

#[cfg(feature = "can")]
impl CanTransport {
    /// Create a closed transport configured for the default interface.
    pub fn new() -> Self {
        CanTransport {
            ifname: DEFAULT_INTERFACE.to_string(),
            socket: None,
        }
    }

    /// Bind the socket to the named interface, or the stored name when
    /// `ifname` is absent or empty. Opening an already-open transport keeps
    /// the existing socket and succeeds.
    pub fn open(&mut self, ifname: Option<&str>) -> Result<(), Error> {
        if let Some(name) = ifname {
            if !name.is_empty() {
                self.ifname = clamp_ifname(name);
            }
        }

        if self.socket.is_some() {
            debug!("can socket already open");
            return Ok(());
        }

        match CanSocket::open(&self.ifname) {
            Ok(sock) => {
                sock.set_nonblocking(true).map_err(Error::Open)?;
                info!("can socket bound to {}", self.ifname);
                self.socket = Some(sock);
                Ok(())
            }
            Err(err) => {
                error!("failed to open can socket on {}: {}", self.ifname, err);
                Err(Error::Open(err))
            }
        }
    }

    /// Release the socket. Calling on a closed transport is a no-op.
    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            info!("can socket closed");
        }
    }

    /// Whether a socket is currently bound.
    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Poll for one pending inbound data frame without blocking.
    ///
    /// Returns `Ok(None)` when the receive queue is empty. Remote and error
    /// frames are not commands and are skipped.
    pub fn recv(&mut self) -> Result<Option<Packet>, Error> {
        let sock = self.socket.as_ref().ok_or(Error::NotOpen)?;

        match sock.read_frame() {
            Ok(CanFrame::Data(frame)) => {
                let mut data = [0u8; CAN_MAX_DLEN];
                let len = frame.data().len().min(CAN_MAX_DLEN);
                data[..len].copy_from_slice(&frame.data()[..len]);
                Ok(Some(Packet {
                    id: frame.raw_id(),
                    data,
                    len,
                }))
            }
            Ok(CanFrame::Remote(frame)) => {
                debug!("ignoring remote frame: {:?}", frame);
                Ok(None)
            }
            Ok(CanFrame::Error(frame)) => {
                debug!("ignoring error frame: {:?}", frame);
                Ok(None)
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(err) => Err(Error::Recv(err)),
        }
    }
}

#[cfg(feature = "can")]
impl Default for CanTransport {
    fn default() -> Self {
        CanTransport::new()
    }
}

#[cfg(feature = "can")]
impl FrameSink for CanTransport {
    fn send(&mut self, id: u32, data: &[u8]) -> Result<(), Error> {
        let Some(sock) = &self.socket else {
            error!("can socket not open");
            return Err(Error::NotOpen);
        };

        let data = &data[..data.len().min(CAN_MAX_DLEN)];

        // Masked to 11 bits, so the constructors cannot fail.
        let id = StandardId::new((id & 0x7FF) as u16).unwrap();
        let frame = CanFrame::new(id, data).unwrap();

        match sock.write_frame(&frame) {
            Ok(()) => {
                debug!("sent frame id={:03X} len={}", id.as_raw(), data.len());
                Ok(())
            }
            Err(err) => {
                error!("failed to write can frame: {}", err);
                Err(Error::Send(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_ifname() {
        assert_eq!(clamp_ifname("can0"), "can0");
        assert_eq!(clamp_ifname(""), "");

        let long = "a".repeat(64);
        let clamped = clamp_ifname(&long);
        assert_eq!(clamped.len(), libc::IFNAMSIZ - 1);
        assert!(long.starts_with(&clamped));
    }

    #[test]
    fn test_packet_payload() {
        let pkt = Packet {
            id: 0x400,
            data: [0x01, 0x03, 0x01, 0, 0, 0, 0, 0],
            len: 3,
        };
        assert_eq!(pkt.payload(), &[0x01, 0x03, 0x01]);

        let empty = Packet {
            id: 0x400,
            data: [0; CAN_MAX_DLEN],
            len: 0,
        };
        assert!(empty.payload().is_empty());
    }
}
