// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host configuration, persisted as JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SensorBridgeError};
use crate::types::{SamplingPeriod, SensorType, SubscriptionKey};

/// File name used inside the data directory.
pub const CONFIG_FILE: &str = "sensorbridge.json";

/// Settings for the bridge host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
    /// Pairs subscribed right after the callback is registered.
    pub subscriptions: Vec<SubscriptionKey>,
    /// Stop after this many seconds; run until interrupted when unset.
    pub run_seconds: Option<u64>,
    /// Simulated sensor service settings.
    pub simulator: SimulatorConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".into(),
            subscriptions: vec![SubscriptionKey::new(
                SensorType::Accelerometer,
                SamplingPeriod::Ui,
            )],
            run_seconds: None,
            simulator: SimulatorConfig::default(),
        }
    }
}

/// Simulated sensor service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Use the simulator instead of the native sensor service.
    pub enabled: bool,
    /// Sensor types the simulated device reports as present.
    pub sensors: Vec<SensorType>,
    /// Generate readings on background threads at each sampling period's
    /// nominal rate.
    pub tick: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: !cfg!(target_os = "android"),
            sensors: vec![
                SensorType::Accelerometer,
                SensorType::Gyroscope,
                SensorType::MagneticField,
                SensorType::Light,
            ],
            tick: true,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from `path`.
    ///
    /// A missing file yields the defaults; a file that exists but does not
    /// parse is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&data)
            .map_err(|e| SensorBridgeError::Config(format!("{}: {e}", path.display())))
    }

    /// Write configuration to `path` as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
