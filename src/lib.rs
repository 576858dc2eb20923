// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Relay Node Library
//!
//! This library provides the core engine for a CAN-commanded relay bank:
//! up to eight relays are exposed to a fleet controller through a small
//! command/status protocol on the CAN bus, while a TCP/JSON ingress feeds
//! vehicle telemetry signals back onto the bus.
//!
//! # Features
//!
//! - **CAN Transport** - Raw SocketCAN frame transmit/receive
//! - **Command Protocol** - SET/TOGGLE/QUERY/QUERY_ALL opcode dispatch with
//!   status replies
//! - **Relay State Model** - Authoritative bitmask kept in lockstep with the
//!   hardware backend
//! - **Hardware Abstraction** - Injected relay drive backend, logging stub
//!   by default
//! - **Telemetry Encoder** - Battery, velocity and charging signals as
//!   fixed-layout frames
//! - **TCP Ingress** - Line-oriented JSON accepted from vehicle systems

#![warn(missing_docs)]

/// CAN transport over SocketCAN
pub mod can;

/// TCP/JSON telemetry ingress
pub mod eth;

/// Relay drive backends
pub mod hw;

/// Relay command protocol engine
pub mod protocol;

/// Relay state model
pub mod relay;

/// Telemetry signal encoding
pub mod signals;
