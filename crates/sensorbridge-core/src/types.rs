// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the sensor bridge.
//
// Sensor types and sampling periods are accepted from script code by their
// platform constant names with the `TYPE_` / `SENSOR_DELAY_` prefix stripped
// (e.g. "ACCELEROMETER", "UI"). Names are matched exactly, case included.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use crate::error::{Result, SensorBridgeError};

// ---------------------------------------------------------------------------
// Sensor types
// ---------------------------------------------------------------------------

macro_rules! sensor_types {
    ($($variant:ident = $id:literal => $name:literal,)+) => {
        /// Platform sensor category (`android.hardware.Sensor.TYPE_*`).
        ///
        /// The numeric id is the platform constant; the name is the constant
        /// without its `TYPE_` prefix.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum SensorType {
            $($variant,)+
        }

        impl SensorType {
            /// Every sensor type the bridge knows about, in platform id order.
            pub const ALL: &'static [SensorType] = &[$(SensorType::$variant,)+];

            /// Platform constant value.
            pub fn id(self) -> i32 {
                match self {
                    $(SensorType::$variant => $id,)+
                }
            }

            /// Constant name without the `TYPE_` prefix.
            pub fn name(self) -> &'static str {
                match self {
                    $(SensorType::$variant => $name,)+
                }
            }
        }
    };
}

sensor_types! {
    Accelerometer = 1 => "ACCELEROMETER",
    MagneticField = 2 => "MAGNETIC_FIELD",
    Orientation = 3 => "ORIENTATION",
    Gyroscope = 4 => "GYROSCOPE",
    Light = 5 => "LIGHT",
    Pressure = 6 => "PRESSURE",
    Temperature = 7 => "TEMPERATURE",
    Proximity = 8 => "PROXIMITY",
    Gravity = 9 => "GRAVITY",
    LinearAcceleration = 10 => "LINEAR_ACCELERATION",
    RotationVector = 11 => "ROTATION_VECTOR",
    RelativeHumidity = 12 => "RELATIVE_HUMIDITY",
    AmbientTemperature = 13 => "AMBIENT_TEMPERATURE",
    MagneticFieldUncalibrated = 14 => "MAGNETIC_FIELD_UNCALIBRATED",
    GameRotationVector = 15 => "GAME_ROTATION_VECTOR",
    GyroscopeUncalibrated = 16 => "GYROSCOPE_UNCALIBRATED",
    SignificantMotion = 17 => "SIGNIFICANT_MOTION",
    StepDetector = 18 => "STEP_DETECTOR",
    StepCounter = 19 => "STEP_COUNTER",
    GeomagneticRotationVector = 20 => "GEOMAGNETIC_ROTATION_VECTOR",
    HeartRate = 21 => "HEART_RATE",
    Pose6Dof = 28 => "POSE_6DOF",
    StationaryDetect = 29 => "STATIONARY_DETECT",
    MotionDetect = 30 => "MOTION_DETECT",
    HeartBeat = 31 => "HEART_BEAT",
    LowLatencyOffbodyDetect = 34 => "LOW_LATENCY_OFFBODY_DETECT",
    AccelerometerUncalibrated = 35 => "ACCELEROMETER_UNCALIBRATED",
    HingeAngle = 36 => "HINGE_ANGLE",
    HeadTracker = 37 => "HEAD_TRACKER",
    AccelerometerLimitedAxes = 38 => "ACCELEROMETER_LIMITED_AXES",
    GyroscopeLimitedAxes = 39 => "GYROSCOPE_LIMITED_AXES",
    AccelerometerLimitedAxesUncalibrated = 40 => "ACCELEROMETER_LIMITED_AXES_UNCALIBRATED",
    GyroscopeLimitedAxesUncalibrated = 41 => "GYROSCOPE_LIMITED_AXES_UNCALIBRATED",
    Heading = 42 => "HEADING",
}

impl SensorType {
    /// Look up a sensor type by constant name. Linear; callers on a hot path
    /// should build their own table from [`SensorType::ALL`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for SensorType {
    type Error = SensorBridgeError;

    fn try_from(name: String) -> Result<Self> {
        Self::from_name(&name).ok_or(SensorBridgeError::UnknownSensorType(name))
    }
}

impl From<SensorType> for String {
    fn from(t: SensorType) -> Self {
        t.name().to_owned()
    }
}

// ---------------------------------------------------------------------------
// Sampling periods
// ---------------------------------------------------------------------------

/// Delivery rate tier (`SensorManager.SENSOR_DELAY_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SamplingPeriod {
    /// As fast as the hardware allows.
    Fastest,
    /// Suitable for games.
    Game,
    /// Suitable for user interface updates.
    Ui,
    /// Screen orientation changes.
    Normal,
}

impl SamplingPeriod {
    pub const ALL: &'static [SamplingPeriod] = &[
        SamplingPeriod::Fastest,
        SamplingPeriod::Game,
        SamplingPeriod::Ui,
        SamplingPeriod::Normal,
    ];

    /// Platform constant value, passed as `samplingPeriodUs` to
    /// `registerListener` (values 0..=3 are interpreted as delay tiers).
    pub fn id(self) -> i32 {
        match self {
            Self::Fastest => 0,
            Self::Game => 1,
            Self::Ui => 2,
            Self::Normal => 3,
        }
    }

    /// Constant name without the `SENSOR_DELAY_` prefix.
    pub fn name(self) -> &'static str {
        match self {
            Self::Fastest => "FASTEST",
            Self::Game => "GAME",
            Self::Ui => "UI",
            Self::Normal => "NORMAL",
        }
    }

    /// Nominal interval between samples for this tier.
    pub fn nominal_interval(self) -> Duration {
        match self {
            Self::Fastest => Duration::ZERO,
            Self::Game => Duration::from_micros(20_000),
            Self::Ui => Duration::from_micros(66_667),
            Self::Normal => Duration::from_micros(200_000),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }
}

impl std::fmt::Display for SamplingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for SamplingPeriod {
    type Error = SensorBridgeError;

    fn try_from(name: String) -> Result<Self> {
        Self::from_name(&name).ok_or(SensorBridgeError::UnknownSamplingPeriod(name))
    }
}

impl From<SamplingPeriod> for String {
    fn from(p: SamplingPeriod) -> Self {
        p.name().to_owned()
    }
}

// ---------------------------------------------------------------------------
// Accuracy
// ---------------------------------------------------------------------------

/// Reported accuracy of a sensor (`SensorManager.SENSOR_STATUS_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorAccuracy {
    NoContact,
    Unreliable,
    Low,
    Medium,
    High,
    /// A status value this build does not know.
    Other(i32),
}

impl SensorAccuracy {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            -1 => Self::NoContact,
            0 => Self::Unreliable,
            1 => Self::Low,
            2 => Self::Medium,
            3 => Self::High,
            other => Self::Other(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Physical sensors and readings
// ---------------------------------------------------------------------------

/// A physical sensor as listed by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorInfo {
    pub sensor_type: SensorType,
    pub name: String,
    pub vendor: String,
    /// Position in the platform's list for this type.
    pub index: usize,
}

/// Raw sample delivered by the platform to a listener.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub values: Vec<f32>,
    /// Monotonic timestamp in nanoseconds.
    pub timestamp_ns: i64,
    pub accuracy: SensorAccuracy,
}

/// Identifier of one platform listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(pub Uuid);

impl ListenerHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Subscriptions and events
// ---------------------------------------------------------------------------

/// Identity of a subscription: one sensor type at one sampling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionKey {
    pub sensor: SensorType,
    pub sampling: SamplingPeriod,
}

impl SubscriptionKey {
    pub fn new(sensor: SensorType, sampling: SamplingPeriod) -> Self {
        Self { sensor, sampling }
    }
}

impl std::fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.sensor, self.sampling)
    }
}

/// Sample event pushed to the script callback.
///
/// Wire form: `{values: [float...], timeStamp: int, sensor: string, sampling: string}`.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub values: Vec<f32>,
    pub time_stamp: i64,
    pub sensor: &'static str,
    pub sampling: &'static str,
}

impl SensorEvent {
    pub fn new(key: SubscriptionKey, reading: &SensorReading) -> Self {
        Self {
            values: reading.values.clone(),
            time_stamp: reading.timestamp_ns,
            sensor: key.sensor.name(),
            sampling: key.sampling.name(),
        }
    }

    /// Encode as a JSON object.
    ///
    /// JSON has no representation for NaN or infinities, so a reading
    /// carrying one is rejected instead of being silently turned into `null`.
    pub fn to_json(&self) -> Result<Value> {
        let mut values = Vec::with_capacity(self.values.len());
        for (i, v) in self.values.iter().enumerate() {
            let n = Number::from_f64(f64::from(*v)).ok_or_else(|| {
                SensorBridgeError::InvalidReading(format!("values[{i}] is not finite ({v})"))
            })?;
            values.push(Value::Number(n));
        }

        let mut obj = Map::new();
        obj.insert("values".into(), Value::Array(values));
        obj.insert("timeStamp".into(), Value::from(self.time_stamp));
        obj.insert("sensor".into(), Value::from(self.sensor));
        obj.insert("sampling".into(), Value::from(self.sampling));
        Ok(Value::Object(obj))
    }
}
