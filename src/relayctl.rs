// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use log::debug;
use relaynode::can::{CanTransport, FrameSink as _};
use relaynode::protocol::{Command, StatusReply, CMD_ID, STATUS_ID};
use std::{
    thread,
    time::{Duration, Instant},
};

const REPLY_TIMEOUT: Duration = Duration::from_secs(1);
const POLL_TIME: Duration = Duration::from_millis(2);

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CAN device to use
    #[arg(short, long)]
    device: Option<String>,

    /// Set a relay to the given positional value (0 or 1)
    #[arg(short, long, value_name = "INDEX")]
    set: Option<u8>,

    /// Toggle a relay
    #[arg(short, long, value_name = "INDEX")]
    toggle: Option<u8>,

    /// Query the state of a single relay
    #[arg(short, long, value_name = "INDEX")]
    query: Option<u8>,

    /// Query the state of every relay
    #[arg(long)]
    query_all: bool,

    /// Monitor relay status traffic on the bus
    #[arg(short, long)]
    monitor: bool,

    /// Value for --set (0 or 1)
    #[arg()]
    value: Option<u8>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let device = args.device.unwrap_or("can0".to_string());
    debug!("opening can interface {}", device);

    let mut transport = CanTransport::new();
    transport.open(Some(&device))?;

    if let Some(index) = args.set {
        match args.value {
            Some(value) => run_command(
                &mut transport,
                Command::Set {
                    index,
                    on: value != 0,
                },
            )?,
            None => {
                println!("--set requires a value");
                return Ok(());
            }
        }
    }

    if let Some(index) = args.toggle {
        run_command(&mut transport, Command::Toggle { index })?;
    }

    if let Some(index) = args.query {
        run_command(&mut transport, Command::Query { index })?;
    }

    if args.query_all {
        run_command(&mut transport, Command::QueryAll)?;
    }

    if args.monitor {
        monitor(&mut transport)?;
    }

    Ok(())
}

fn run_command(
    transport: &mut CanTransport,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut buf = [0u8; 3];
    let len = command.encode(&mut buf);
    transport.send(CMD_ID, &buf[..len])?;

    match wait_status(transport, REPLY_TIMEOUT)? {
        Some(reply) => println!("{}", reply),
        None => println!("no status reply within {:?}", REPLY_TIMEOUT),
    }
    Ok(())
}

fn wait_status(
    transport: &mut CanTransport,
    timeout: Duration,
) -> Result<Option<StatusReply>, Box<dyn std::error::Error>> {
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        match transport.recv()? {
            Some(pkt) if pkt.id == STATUS_ID => {
                if let Some(reply) = StatusReply::decode(pkt.payload()) {
                    return Ok(Some(reply));
                }
                debug!("undecodable status frame: {:02X?}", pkt.payload());
            }
            Some(_) => (),
            None => thread::sleep(POLL_TIME),
        }
    }

    Ok(None)
}

fn monitor(transport: &mut CanTransport) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        match transport.recv()? {
            Some(pkt) if pkt.id == STATUS_ID => match StatusReply::decode(pkt.payload()) {
                Some(reply) => println!("{}", reply),
                None => println!("{:03X} {:02X?}", pkt.id, pkt.payload()),
            },
            Some(pkt) => println!("{:03X} {:02X?}", pkt.id, pkt.payload()),
            None => thread::sleep(POLL_TIME),
        }
    }
}
