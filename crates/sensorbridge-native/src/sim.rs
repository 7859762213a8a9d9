// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process simulated sensor service for tests, CI and desktop demos.
//
// A `SimSensorService` reports a fixed set of sensor types as present.
// Readings are injected with `emit` or, when ticking is enabled, produced by
// one background thread per registration at the sampling period's nominal
// rate. Listener callbacks are always invoked without any internal lock held,
// so a listener may call back into the service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use sensorbridge_core::error::{Result, SensorBridgeError};
use sensorbridge_core::types::{
    ListenerHandle, SamplingPeriod, SensorAccuracy, SensorInfo, SensorReading, SensorType,
};
use tracing::{debug, trace};

use crate::traits::{SensorEventListener, SensorService};

/// Lower bound on the ticker interval so `FASTEST` does not spin.
const MIN_TICK: Duration = Duration::from_millis(5);

struct Registration {
    sensor: SensorInfo,
    period: SamplingPeriod,
    listener: Arc<dyn SensorEventListener>,
    stop: Arc<AtomicBool>,
}

struct SimInner {
    present: Vec<SensorType>,
    tick: bool,
    epoch: Instant,
    registrations: Mutex<HashMap<ListenerHandle, Registration>>,
}

/// Simulated device. Cheap to clone; clones share the same registrations.
#[derive(Clone)]
pub struct SimSensorService {
    inner: Arc<SimInner>,
}

impl SimSensorService {
    /// A device with the given sensor types present and no ticker threads.
    pub fn new(present: impl IntoIterator<Item = SensorType>) -> Self {
        Self::build(present, false)
    }

    /// A device that generates readings on its own.
    pub fn ticking(present: impl IntoIterator<Item = SensorType>) -> Self {
        Self::build(present, true)
    }

    fn build(present: impl IntoIterator<Item = SensorType>, tick: bool) -> Self {
        Self {
            inner: Arc::new(SimInner {
                present: present.into_iter().collect(),
                tick,
                epoch: Instant::now(),
                registrations: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Deliver a reading to every listener registered on `sensor_type`.
    ///
    /// Returns the number of listeners that received it.
    pub fn emit(&self, sensor_type: SensorType, values: Vec<f32>) -> usize {
        let listeners = self.listeners_for(sensor_type);
        let reading = SensorReading {
            values,
            timestamp_ns: self.now_ns(),
            accuracy: SensorAccuracy::High,
        };
        for listener in &listeners {
            listener.on_sensor_changed(reading.clone());
        }
        trace!(sensor = %sensor_type, delivered = listeners.len(), "sim: emitted reading");
        listeners.len()
    }

    /// Deliver an accuracy change to every listener registered on `sensor_type`.
    pub fn emit_accuracy(&self, sensor_type: SensorType, accuracy: SensorAccuracy) -> usize {
        let targets: Vec<(SensorInfo, Arc<dyn SensorEventListener>)> = self
            .inner
            .registrations
            .lock()
            .map(|regs| {
                regs.values()
                    .filter(|r| r.sensor.sensor_type == sensor_type)
                    .map(|r| (r.sensor.clone(), Arc::clone(&r.listener)))
                    .collect()
            })
            .unwrap_or_default();
        for (sensor, listener) in &targets {
            listener.on_accuracy_changed(sensor, accuracy);
        }
        targets.len()
    }

    /// Number of live listener registrations.
    pub fn listener_count(&self) -> usize {
        self.inner
            .registrations
            .lock()
            .map(|r| r.len())
            .unwrap_or(0)
    }

    /// Sampling periods of the live registrations on `sensor_type`.
    pub fn registered_periods(&self, sensor_type: SensorType) -> Vec<SamplingPeriod> {
        let mut periods: Vec<SamplingPeriod> = self
            .inner
            .registrations
            .lock()
            .map(|regs| {
                regs.values()
                    .filter(|r| r.sensor.sensor_type == sensor_type)
                    .map(|r| r.period)
                    .collect()
            })
            .unwrap_or_default();
        periods.sort();
        periods
    }

    fn listeners_for(&self, sensor_type: SensorType) -> Vec<Arc<dyn SensorEventListener>> {
        self.inner
            .registrations
            .lock()
            .map(|regs| {
                regs.values()
                    .filter(|r| r.sensor.sensor_type == sensor_type)
                    .map(|r| Arc::clone(&r.listener))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn now_ns(&self) -> i64 {
        i64::try_from(self.inner.epoch.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }

    fn spawn_ticker(
        &self,
        sensor_type: SensorType,
        period: SamplingPeriod,
        listener: Arc<dyn SensorEventListener>,
        stop: Arc<AtomicBool>,
    ) {
        let epoch = self.inner.epoch;
        let interval = period.nominal_interval().max(MIN_TICK);
        let spawned = thread::Builder::new()
            .name(format!("sim-{}", sensor_type.name().to_ascii_lowercase()))
            .spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    let t = epoch.elapsed();
                    let reading = SensorReading {
                        values: synthetic_values(sensor_type, t.as_secs_f32()),
                        timestamp_ns: i64::try_from(t.as_nanos()).unwrap_or(i64::MAX),
                        accuracy: SensorAccuracy::High,
                    };
                    listener.on_sensor_changed(reading);
                    thread::sleep(interval);
                }
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, sensor = %sensor_type, "sim: failed to spawn ticker thread");
        }
    }
}

impl SensorService for SimSensorService {
    fn platform_name(&self) -> &str {
        "Simulator"
    }

    fn sensors(&self, sensor_type: SensorType) -> Result<Vec<SensorInfo>> {
        if !self.inner.present.contains(&sensor_type) {
            return Ok(Vec::new());
        }
        Ok(vec![SensorInfo {
            sensor_type,
            name: format!("Simulated {}", sensor_type.name().to_ascii_lowercase()),
            vendor: "sensorbridge".into(),
            index: 0,
        }])
    }

    fn register_listener(
        &self,
        sensor: &SensorInfo,
        period: SamplingPeriod,
        listener: Arc<dyn SensorEventListener>,
    ) -> Result<ListenerHandle> {
        if !self.inner.present.contains(&sensor.sensor_type) {
            return Err(SensorBridgeError::Platform(format!(
                "no simulated {} sensor",
                sensor.sensor_type
            )));
        }

        let handle = ListenerHandle::new();
        let stop = Arc::new(AtomicBool::new(false));
        self.inner
            .registrations
            .lock()
            .map_err(|_| SensorBridgeError::Poisoned)?
            .insert(
                handle,
                Registration {
                    sensor: sensor.clone(),
                    period,
                    listener: Arc::clone(&listener),
                    stop: Arc::clone(&stop),
                },
            );

        if self.inner.tick {
            self.spawn_ticker(sensor.sensor_type, period, listener, stop);
        }

        debug!(%handle, sensor = %sensor.sensor_type, sampling = %period, "sim: listener registered");
        Ok(handle)
    }

    fn unregister_listener(&self, handle: ListenerHandle) -> Result<()> {
        let removed = self
            .inner
            .registrations
            .lock()
            .map_err(|_| SensorBridgeError::Poisoned)?
            .remove(&handle);
        if let Some(reg) = removed {
            reg.stop.store(true, Ordering::Release);
            debug!(%handle, sensor = %reg.sensor.sensor_type, "sim: listener unregistered");
        }
        Ok(())
    }
}

/// Plausible-looking readings: a slow oscillation per axis.
fn synthetic_values(sensor_type: SensorType, t: f32) -> Vec<f32> {
    match sensor_type {
        SensorType::Light => vec![300.0 + 50.0 * t.sin()],
        SensorType::Pressure => vec![1013.25 + 0.5 * t.sin()],
        SensorType::Proximity => vec![if (t as u64) % 2 == 0 { 0.0 } else { 5.0 }],
        SensorType::StepCounter => vec![t.floor()],
        SensorType::Accelerometer | SensorType::Gravity => {
            vec![0.3 * t.sin(), 0.3 * t.cos(), 9.81]
        }
        SensorType::RotationVector => vec![0.1 * t.sin(), 0.1 * t.cos(), 0.0, 0.99, 0.0],
        _ => vec![t.sin(), t.cos(), (0.5 * t).sin()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        readings: Mutex<Vec<SensorReading>>,
        accuracy: Mutex<Vec<SensorAccuracy>>,
    }

    impl SensorEventListener for Recorder {
        fn on_sensor_changed(&self, reading: SensorReading) {
            self.readings.lock().unwrap().push(reading);
        }

        fn on_accuracy_changed(&self, _sensor: &SensorInfo, accuracy: SensorAccuracy) {
            self.accuracy.lock().unwrap().push(accuracy);
        }
    }

    fn accel(svc: &SimSensorService) -> SensorInfo {
        svc.sensors(SensorType::Accelerometer).unwrap().remove(0)
    }

    #[test]
    fn absent_sensor_is_not_listed() {
        let svc = SimSensorService::new([SensorType::Accelerometer]);
        assert!(svc.sensors(SensorType::HeartRate).unwrap().is_empty());
        assert_eq!(svc.sensors(SensorType::Accelerometer).unwrap().len(), 1);
    }

    #[test]
    fn emit_reaches_registered_listener() {
        let svc = SimSensorService::new([SensorType::Accelerometer]);
        let rec = Arc::new(Recorder::default());
        svc.register_listener(&accel(&svc), SamplingPeriod::Ui, rec.clone())
            .unwrap();

        assert_eq!(svc.emit(SensorType::Accelerometer, vec![1.0, 2.0, 3.0]), 1);
        assert_eq!(svc.emit(SensorType::Gyroscope, vec![1.0]), 0);

        let readings = rec.readings.lock().unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn unregister_stops_delivery() {
        let svc = SimSensorService::new([SensorType::Accelerometer]);
        let rec = Arc::new(Recorder::default());
        let handle = svc
            .register_listener(&accel(&svc), SamplingPeriod::Game, rec.clone())
            .unwrap();
        assert_eq!(svc.listener_count(), 1);

        svc.unregister_listener(handle).unwrap();
        assert_eq!(svc.listener_count(), 0);
        assert_eq!(svc.emit(SensorType::Accelerometer, vec![0.0; 3]), 0);
        assert!(rec.readings.lock().unwrap().is_empty());

        // Unknown handles are ignored.
        svc.unregister_listener(handle).unwrap();
    }

    #[test]
    fn accuracy_changes_are_forwarded() {
        let svc = SimSensorService::new([SensorType::Accelerometer]);
        let rec = Arc::new(Recorder::default());
        svc.register_listener(&accel(&svc), SamplingPeriod::Ui, rec.clone())
            .unwrap();

        assert_eq!(svc.emit_accuracy(SensorType::Accelerometer, SensorAccuracy::Low), 1);
        assert_eq!(*rec.accuracy.lock().unwrap(), vec![SensorAccuracy::Low]);
    }

    #[test]
    fn ticker_generates_readings_until_unregistered() {
        let svc = SimSensorService::ticking([SensorType::Accelerometer]);
        let rec = Arc::new(Recorder::default());
        let handle = svc
            .register_listener(&accel(&svc), SamplingPeriod::Fastest, rec.clone())
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while rec.readings.lock().unwrap().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        svc.unregister_listener(handle).unwrap();

        let readings = rec.readings.lock().unwrap();
        assert!(!readings.is_empty());
        assert_eq!(readings[0].values.len(), 3);
    }
}
