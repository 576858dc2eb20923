// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser;
use relaynode::{can::CanTransport, eth::TelemetryIngress, hw::LogRelays, protocol, relay::RelayBank};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};
use tracing::{error, info, trace};
use tracing_subscriber::{layer::SubscriberExt as _, Layer as _, Registry};

static RUNNING: AtomicBool = AtomicBool::new(true);

// Only the flag is touched from signal context; the control loop observes it
// at the next iteration boundary.
extern "C" fn request_shutdown(_signal: libc::c_int) {
    RUNNING.store(false, Ordering::SeqCst);
}

fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, request_shutdown as libc::sighandler_t);
        libc::signal(libc::SIGTERM, request_shutdown as libc::sighandler_t);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(args.rust_log);

    let journald = match tracing_journald::layer() {
        Ok(journald) => Some(journald.with_filter(args.rust_log)),
        Err(_) => None,
    };

    let subscriber = Registry::default().with(stdout_log).with(journald);
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
    tracing_log::LogTracer::init()?;

    install_signal_handlers();

    let mut transport = CanTransport::new();
    transport.open(Some(&args.can))?;

    let mut bank = RelayBank::new(Box::new(LogRelays));

    // The node cannot run without its listening socket.
    let mut ingress = match TelemetryIngress::bind(args.port) {
        Ok(ingress) => ingress,
        Err(err) => {
            error!(
                "failed to bind telemetry ingress on port {}: {}",
                args.port, err
            );
            return Err(err.into());
        }
    };

    info!(
        "relay node started on {} (telemetry port {})",
        args.can, args.port
    );

    let idle = Duration::from_millis(args.poll_interval_ms);
    while RUNNING.load(Ordering::SeqCst) {
        // Drain pending command frames before servicing the ingress.
        loop {
            match transport.recv() {
                Ok(Some(packet)) => {
                    if !protocol::handle_frame(&mut bank, &mut transport, packet.id, packet.payload())
                    {
                        trace!("frame {:03X} not addressed to us", packet.id);
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    error!("canbus error: {}", err);
                    break;
                }
            }
        }

        ingress.poll(&mut transport);
        thread::sleep(idle);
    }

    transport.close();
    info!("relay node stopped");
    Ok(())
}
