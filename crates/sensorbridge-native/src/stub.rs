// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub sensor service for desktop/CI builds where no hardware sensors exist.
//
// Accepts the full vocabulary but lists no physical sensors, so every
// subscription fails with `SensorUnavailable` before registration is tried.

use std::sync::Arc;

use sensorbridge_core::error::{Result, SensorBridgeError};
use sensorbridge_core::types::{ListenerHandle, SamplingPeriod, SensorInfo, SensorType};

use crate::traits::{SensorEventListener, SensorService};

/// No-op sensor service returned on non-mobile platforms.
pub struct StubSensorService;

impl SensorService for StubSensorService {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }

    fn sensors(&self, sensor_type: SensorType) -> Result<Vec<SensorInfo>> {
        tracing::debug!(sensor = %sensor_type, "stub sensor service lists no sensors");
        Ok(Vec::new())
    }

    fn register_listener(
        &self,
        sensor: &SensorInfo,
        _period: SamplingPeriod,
        _listener: Arc<dyn SensorEventListener>,
    ) -> Result<ListenerHandle> {
        tracing::warn!(sensor = %sensor.name, "register_listener called on stub sensor service");
        Err(SensorBridgeError::PlatformUnavailable)
    }

    fn unregister_listener(&self, _handle: ListenerHandle) -> Result<()> {
        Ok(())
    }
}
