// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// can device wired to the fleet controller
    #[arg(long, env, default_value = "can0")]
    pub can: String,

    /// TCP port for the telemetry ingress
    #[arg(long, env, default_value = "5000")]
    pub port: u16,

    /// control loop idle sleep in milliseconds
    #[arg(long, env, default_value = "10")]
    pub poll_interval_ms: u64,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,
}
