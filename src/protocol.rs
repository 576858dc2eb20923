// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::can::FrameSink;
use crate::relay::{RelayBank, MAX_RELAYS};
use log::{debug, error};
use std::fmt;

/// CAN identifier carrying inbound relay commands.
pub const CMD_ID: u32 = 0x400;
/// CAN identifier for outbound status replies.
pub const STATUS_ID: u32 = 0x401;

const STATUS_ALL: u8 = 0x10;
const STATUS_SINGLE: u8 = 0x11;

/// Command opcodes, the first payload byte of a command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Set one relay to an explicit state
    Set = 0x01,
    /// Flip one relay
    Toggle = 0x02,
    /// Report one relay
    Query = 0x03,
    /// Report the full bank
    QueryAll = 0x04,
}

impl TryFrom<u8> for Opcode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, FrameError> {
        match value {
            0x01 => Ok(Opcode::Set),
            0x02 => Ok(Opcode::Toggle),
            0x03 => Ok(Opcode::Query),
            0x04 => Ok(Opcode::QueryAll),
            other => Err(FrameError::UnknownOpcode(other)),
        }
    }
}

/// Reasons a command frame is dropped without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Frame carries no payload at all
    Empty,
    /// Payload shorter than the opcode requires
    Malformed(Opcode),
    /// Relay index outside the addressable range
    InvalidIndex(u8),
    /// First byte is not a known opcode
    UnknownOpcode(u8),
}

impl std::error::Error for FrameError {}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            FrameError::Empty => write!(f, "empty command payload"),
            FrameError::Malformed(op) => write!(f, "truncated {:?} command", op),
            FrameError::InvalidIndex(index) => write!(f, "invalid relay index {}", index),
            FrameError::UnknownOpcode(op) => write!(f, "unknown opcode {:#04x}", op),
        }
    }
}

fn checked_index(index: u8) -> Result<u8, FrameError> {
    if index < MAX_RELAYS {
        Ok(index)
    } else {
        Err(FrameError::InvalidIndex(index))
    }
}

/// A validated relay command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Drive one relay to an explicit state
    Set {
        /// Relay index
        index: u8,
        /// Target state
        on: bool,
    },
    /// Flip one relay
    Toggle {
        /// Relay index
        index: u8,
    },
    /// Report one relay without mutating it
    Query {
        /// Relay index
        index: u8,
    },
    /// Report the full bank bitmask
    QueryAll,
}

impl Command {
    /// Decode and validate a command payload.
    pub fn decode(payload: &[u8]) -> Result<Command, FrameError> {
        let &op = payload.first().ok_or(FrameError::Empty)?;

        match Opcode::try_from(op)? {
            Opcode::Set => {
                if payload.len() < 3 {
                    return Err(FrameError::Malformed(Opcode::Set));
                }
                Ok(Command::Set {
                    index: checked_index(payload[1])?,
                    on: payload[2] != 0,
                })
            }
            Opcode::Toggle => {
                if payload.len() < 2 {
                    return Err(FrameError::Malformed(Opcode::Toggle));
                }
                Ok(Command::Toggle {
                    index: checked_index(payload[1])?,
                })
            }
            Opcode::Query => {
                if payload.len() < 2 {
                    return Err(FrameError::Malformed(Opcode::Query));
                }
                Ok(Command::Query {
                    index: checked_index(payload[1])?,
                })
            }
            Opcode::QueryAll => Ok(Command::QueryAll),
        }
    }

    /// Serialize into `buf` for transmission on [`CMD_ID`], returning the
    /// payload length. Used by bus-side tooling such as relayctl.
    pub fn encode(&self, buf: &mut [u8; 3]) -> usize {
        match *self {
            Command::Set { index, on } => {
                buf[0] = Opcode::Set as u8;
                buf[1] = index;
                buf[2] = on as u8;
                3
            }
            Command::Toggle { index } => {
                buf[0] = Opcode::Toggle as u8;
                buf[1] = index;
                2
            }
            Command::Query { index } => {
                buf[0] = Opcode::Query as u8;
                buf[1] = index;
                2
            }
            Command::QueryAll => {
                buf[0] = Opcode::QueryAll as u8;
                1
            }
        }
    }
}

/// Outbound status reply, serialized to a fixed 3-byte payload on
/// [`STATUS_ID`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReply {
    /// Full bank bitmask
    All {
        /// Bitmask, one bit per relay
        mask: u16,
    },
    /// Single relay state
    Single {
        /// Relay index
        index: u8,
        /// Current state
        on: bool,
    },
}

impl From<&StatusReply> for [u8; 3] {
    fn from(reply: &StatusReply) -> [u8; 3] {
        match *reply {
            StatusReply::All { mask } => [STATUS_ALL, mask as u8, (mask >> 8) as u8],
            StatusReply::Single { index, on } => [STATUS_SINGLE, index, on as u8],
        }
    }
}

impl StatusReply {
    /// Parse a status payload as seen by bus peers.
    pub fn decode(payload: &[u8]) -> Option<StatusReply> {
        match *payload {
            [STATUS_ALL, low, high] => Some(StatusReply::All {
                mask: u16::from_le_bytes([low, high]),
            }),
            [STATUS_SINGLE, index, state] => Some(StatusReply::Single {
                index,
                on: state != 0,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for StatusReply {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StatusReply::All { mask } => write!(f, "relays: {:#010b}", mask),
            StatusReply::Single { index, on } => {
                write!(f, "relay {}: {}", index, if on { "on" } else { "off" })
            }
        }
    }
}

/// Dispatch one inbound frame.
///
/// Returns whether the frame was addressed to the command identifier and
/// therefore consumed, regardless of whether it decoded cleanly. Frames that
/// fail validation are logged and dropped without a reply, leaving the
/// requester to re-query.
pub fn handle_frame(
    bank: &mut RelayBank,
    sink: &mut dyn FrameSink,
    id: u32,
    payload: &[u8],
) -> bool {
    if id != CMD_ID {
        return false;
    }

    let command = match Command::decode(payload) {
        Ok(command) => command,
        Err(err @ (FrameError::Empty | FrameError::UnknownOpcode(_))) => {
            debug!("dropping command frame: {}", err);
            return true;
        }
        Err(err) => {
            error!("dropping command frame: {}", err);
            return true;
        }
    };

    let reply = match command {
        Command::Set { index, on } => {
            bank.set(index, on);
            StatusReply::Single {
                index,
                on: bank.get(index),
            }
        }
        Command::Toggle { index } => {
            bank.toggle(index);
            StatusReply::Single {
                index,
                on: bank.get(index),
            }
        }
        Command::Query { index } => StatusReply::Single {
            index,
            on: bank.get(index),
        },
        Command::QueryAll => StatusReply::All { mask: bank.mask() },
    };

    send_status(sink, &reply);
    true
}

// Reply delivery is best effort: a lost status frame is recovered by the
// requester querying again.
fn send_status(sink: &mut dyn FrameSink, reply: &StatusReply) {
    let data = <[u8; 3]>::from(reply);
    if let Err(err) = sink.send(STATUS_ID, &data) {
        error!("failed to send status reply: {}", err);
    } else {
        debug!("sent {}", reply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::can::{Error as CanError, FrameSink};
    use crate::hw::LogRelays;
    use crate::relay::RelayBank;

    #[derive(Default)]
    struct MockSink {
        frames: Vec<(u32, Vec<u8>)>,
        fail: bool,
    }

    impl FrameSink for MockSink {
        fn send(&mut self, id: u32, data: &[u8]) -> Result<(), CanError> {
            if self.fail {
                return Err(CanError::NotOpen);
            }
            self.frames.push((id, data.to_vec()));
            Ok(())
        }
    }

    fn bank() -> RelayBank {
        RelayBank::new(Box::new(LogRelays))
    }

    #[test]
    fn test_foreign_id_not_claimed() {
        let mut bank = bank();
        let mut sink = MockSink::default();

        assert!(!handle_frame(&mut bank, &mut sink, 0x123, &[0x04]));
        assert!(!handle_frame(&mut bank, &mut sink, STATUS_ID, &[0x04]));
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn test_empty_payload_claimed_without_reply() {
        let mut bank = bank();
        let mut sink = MockSink::default();

        assert!(handle_frame(&mut bank, &mut sink, CMD_ID, &[]));
        assert!(sink.frames.is_empty());
        assert_eq!(bank.mask(), 0);
    }

    #[test]
    fn test_set_replies_single_status() {
        let mut bank = bank();
        let mut sink = MockSink::default();

        assert!(handle_frame(&mut bank, &mut sink, CMD_ID, &[0x01, 3, 1]));
        assert!(bank.get(3));
        assert_eq!(sink.frames, vec![(STATUS_ID, vec![0x11, 3, 1])]);
    }

    #[test]
    fn test_set_off_replies_zero_state() {
        let mut bank = bank();
        let mut sink = MockSink::default();
        bank.set(5, true);

        assert!(handle_frame(&mut bank, &mut sink, CMD_ID, &[0x01, 5, 0]));
        assert!(!bank.get(5));
        assert_eq!(sink.frames, vec![(STATUS_ID, vec![0x11, 5, 0])]);
    }

    #[test]
    fn test_set_invalid_index_no_reply_no_change() {
        let mut bank = bank();
        let mut sink = MockSink::default();

        assert!(handle_frame(&mut bank, &mut sink, CMD_ID, &[0x01, 9, 1]));
        assert!(sink.frames.is_empty());
        assert_eq!(bank.mask(), 0);
    }

    #[test]
    fn test_truncated_set_no_reply() {
        let mut bank = bank();
        let mut sink = MockSink::default();

        assert!(handle_frame(&mut bank, &mut sink, CMD_ID, &[0x01, 3]));
        assert!(sink.frames.is_empty());
        assert_eq!(bank.mask(), 0);
    }

    #[test]
    fn test_toggle_flips_and_replies() {
        let mut bank = bank();
        let mut sink = MockSink::default();

        assert!(handle_frame(&mut bank, &mut sink, CMD_ID, &[0x02, 2]));
        assert!(bank.get(2));
        assert!(handle_frame(&mut bank, &mut sink, CMD_ID, &[0x02, 2]));
        assert!(!bank.get(2));
        assert_eq!(
            sink.frames,
            vec![
                (STATUS_ID, vec![0x11, 2, 1]),
                (STATUS_ID, vec![0x11, 2, 0]),
            ]
        );
    }

    #[test]
    fn test_query_does_not_mutate() {
        let mut bank = bank();
        let mut sink = MockSink::default();
        bank.set(6, true);
        let before = bank.mask();

        assert!(handle_frame(&mut bank, &mut sink, CMD_ID, &[0x03, 6]));
        assert_eq!(bank.mask(), before);
        assert_eq!(sink.frames, vec![(STATUS_ID, vec![0x11, 6, 1])]);
    }

    #[test]
    fn test_query_all_reports_mask() {
        let mut bank = bank();
        let mut sink = MockSink::default();
        bank.set_mask(0b1010_0001);

        assert!(handle_frame(&mut bank, &mut sink, CMD_ID, &[0x04]));
        assert_eq!(sink.frames, vec![(STATUS_ID, vec![0x10, 0b1010_0001, 0x00])]);
    }

    #[test]
    fn test_query_all_ignores_trailing_bytes() {
        let mut bank = bank();
        let mut sink = MockSink::default();

        assert!(handle_frame(
            &mut bank,
            &mut sink,
            CMD_ID,
            &[0x04, 0xDE, 0xAD]
        ));
        assert_eq!(sink.frames, vec![(STATUS_ID, vec![0x10, 0x00, 0x00])]);
    }

    #[test]
    fn test_unknown_opcode_claimed_silently() {
        let mut bank = bank();
        let mut sink = MockSink::default();

        assert!(handle_frame(&mut bank, &mut sink, CMD_ID, &[0x7F, 1, 2]));
        assert!(sink.frames.is_empty());
        assert_eq!(bank.mask(), 0);
    }

    #[test]
    fn test_reply_send_failure_is_swallowed() {
        let mut bank = bank();
        let mut sink = MockSink {
            fail: true,
            ..Default::default()
        };

        // the frame is still claimed and the state change still lands
        assert!(handle_frame(&mut bank, &mut sink, CMD_ID, &[0x01, 0, 1]));
        assert!(bank.get(0));
    }

    #[test]
    fn test_command_decode_errors() {
        assert_eq!(Command::decode(&[]), Err(FrameError::Empty));
        assert_eq!(
            Command::decode(&[0x01, 1]),
            Err(FrameError::Malformed(Opcode::Set))
        );
        assert_eq!(
            Command::decode(&[0x02]),
            Err(FrameError::Malformed(Opcode::Toggle))
        );
        assert_eq!(
            Command::decode(&[0x03, 8]),
            Err(FrameError::InvalidIndex(8))
        );
        assert_eq!(Command::decode(&[0x00]), Err(FrameError::UnknownOpcode(0)));
        assert_eq!(
            Command::decode(&[0x05, 1, 2]),
            Err(FrameError::UnknownOpcode(5))
        );
    }

    #[test]
    fn test_command_encode() {
        let mut buf = [0u8; 3];

        assert_eq!(Command::Set { index: 3, on: true }.encode(&mut buf), 3);
        assert_eq!(buf, [0x01, 3, 1]);

        assert_eq!(Command::Toggle { index: 7 }.encode(&mut buf), 2);
        assert_eq!(buf[..2], [0x02, 7]);

        assert_eq!(Command::Query { index: 0 }.encode(&mut buf), 2);
        assert_eq!(buf[..2], [0x03, 0]);

        assert_eq!(Command::QueryAll.encode(&mut buf), 1);
        assert_eq!(buf[0], 0x04);
    }

    #[test]
    fn test_status_reply_decode() {
        assert_eq!(
            StatusReply::decode(&[0x10, 0x55, 0x00]),
            Some(StatusReply::All { mask: 0x0055 })
        );
        assert_eq!(
            StatusReply::decode(&[0x11, 4, 1]),
            Some(StatusReply::Single { index: 4, on: true })
        );
        assert_eq!(StatusReply::decode(&[0x12, 0, 0]), None);
        assert_eq!(StatusReply::decode(&[0x10, 0x55]), None);
        assert_eq!(StatusReply::decode(&[]), None);
    }
}
