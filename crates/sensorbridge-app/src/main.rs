// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sensor bridge host.
//
// Entry point. Loads configuration, initialises logging and drives one bridge
// session the way a web view would: register the callback, subscribe, then
// print every pushed message to stdout as a JSON line.
//
// Usage: sensorbridge [CONFIG_PATH]

mod data_dir;
mod host;

use std::path::PathBuf;

use sensorbridge_core::BridgeConfig;
use sensorbridge_core::config::CONFIG_FILE;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir::data_dir().join(CONFIG_FILE));

    let config = match BridgeConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("sensorbridge: {e}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(config = %config_path.display(), "sensorbridge starting");

    // First run: leave an editable copy of the defaults behind.
    if !config_path.exists() {
        match config.save(&config_path) {
            Ok(()) => tracing::info!(config = %config_path.display(), "wrote default config"),
            Err(e) => tracing::warn!(error = %e, "could not write default config"),
        }
    }

    if let Err(e) = host::run(config).await {
        tracing::error!(error = %e, "sensorbridge stopped with an error");
        std::process::exit(1);
    }
}
