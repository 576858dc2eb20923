// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use log::debug;

/// Relay drive backend.
///
/// The relay bank drives every state change through this trait, chosen at
/// composition time. Deployments wire in an implementation for their actual
/// relay hardware; the default [`LogRelays`] stub only logs so the node can
/// run on a bench without anything connected.
///
/// Drive failures are not reported back; the protocol layer treats the
/// hardware as fire-and-forget.
pub trait RelayHardware {
    /// One-time hardware setup, called when the relay bank is created.
    fn init(&mut self);

    /// Drive relay `index` to the requested state, best effort.
    fn drive(&mut self, index: u8, on: bool);
}

/// Logging stub backend used when no hardware implementation is supplied.
#[derive(Debug, Default)]
pub struct LogRelays;

impl RelayHardware for LogRelays {
    fn init(&mut self) {
        debug!("relay hardware init (stub)");
    }

    fn drive(&mut self, index: u8, on: bool) {
        debug!("relay {} -> {} (stub)", index, if on { "on" } else { "off" });
    }
}
