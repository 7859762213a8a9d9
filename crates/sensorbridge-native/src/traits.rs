// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the sensor service.

use std::sync::Arc;

use sensorbridge_core::error::Result;
use sensorbridge_core::types::{
    ListenerHandle, SamplingPeriod, SensorAccuracy, SensorInfo, SensorReading, SensorType,
};

/// Receives samples for one listener registration.
///
/// Called from the platform's own dispatch thread(s), never from the thread
/// that registered the listener.
pub trait SensorEventListener: Send + Sync {
    /// A new sample is available.
    fn on_sensor_changed(&self, reading: SensorReading);

    /// The sensor's accuracy changed.
    fn on_accuracy_changed(&self, sensor: &SensorInfo, accuracy: SensorAccuracy);
}

/// The platform's sensor service (`SensorManager` on Android).
pub trait SensorService: Send + Sync {
    /// Human-readable platform name (e.g. "Android", "Simulator").
    fn platform_name(&self) -> &str;

    /// Sensor-type vocabulary this platform accepts.
    fn sensor_types(&self) -> Vec<SensorType> {
        SensorType::ALL.to_vec()
    }

    /// Sampling-period vocabulary this platform accepts.
    fn sampling_periods(&self) -> Vec<SamplingPeriod> {
        SamplingPeriod::ALL.to_vec()
    }

    /// Physical sensors of the given type, in platform order. Empty when the
    /// device has none.
    fn sensors(&self, sensor_type: SensorType) -> Result<Vec<SensorInfo>>;

    /// Start delivering samples from `sensor` to `listener` at `period`.
    fn register_listener(
        &self,
        sensor: &SensorInfo,
        period: SamplingPeriod,
        listener: Arc<dyn SensorEventListener>,
    ) -> Result<ListenerHandle>;

    /// Stop delivery for a registration. Unknown handles are ignored.
    fn unregister_listener(&self, handle: ListenerHandle) -> Result<()>;
}
