// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Native sensor service abstractions.
//
// `traits` defines the contract the bridge consumes; `android` talks to
// `android.hardware.SensorManager` over JNI, `stub` stands in on desktop/CI
// builds and `sim` is an in-process simulated device for tests and demos.

pub mod sim;
pub mod traits;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(target_os = "android"))]
pub mod stub;

use std::sync::Arc;

pub use sim::SimSensorService;
pub use traits::{SensorEventListener, SensorService};

/// Returns the sensor service for the target operating system.
pub fn platform_service() -> Arc<dyn SensorService> {
    #[cfg(target_os = "android")]
    {
        Arc::new(android::AndroidSensorService::new())
    }
    #[cfg(not(target_os = "android"))]
    {
        Arc::new(stub::StubSensorService)
    }
}
