// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the sensor bridge.
//
// The `Display` text of each variant is what script callers receive as the
// error string of a failed command, so keep the messages short and literal.

use thiserror::Error;

/// Top-level error type for all sensor bridge operations.
#[derive(Debug, Error)]
pub enum SensorBridgeError {
    // -- Callback registration --
    #[error("callback already registered")]
    AlreadyRegistered,

    #[error("cannot subscribe to anything before registering a callback")]
    NoCallbackRegistered,

    // -- Name resolution --
    #[error("unavailable sensor type: {0}")]
    UnknownSensorType(String),

    #[error("unavailable sampling period: {0}")]
    UnknownSamplingPeriod(String),

    #[error("sensor {0} could not be retrieved")]
    SensorUnavailable(String),

    // -- Subscriptions --
    #[error("listener already registered for sensor {sensor} at sampling period {sampling}")]
    DuplicateSubscription { sensor: String, sampling: String },

    /// `removed` is the number of listeners the failed unsubscribe closed,
    /// always 0; it is reported back to the caller alongside the message.
    #[error("no listener found for sensor {sensor} at sampling period {sampling}")]
    NotSubscribed {
        sensor: String,
        sampling: String,
        removed: usize,
    },

    // -- Command surface --
    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    // -- Event delivery --
    #[error("sensor reading cannot be encoded: {0}")]
    InvalidReading(String),

    #[error("callback channel closed")]
    ChannelClosed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Configuration / storage --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    // -- Platform --
    #[error("platform sensor service error: {0}")]
    Platform(String),

    #[error("sensor service not available on this platform")]
    PlatformUnavailable,

    #[error("bridge state lock poisoned")]
    Poisoned,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SensorBridgeError>;
