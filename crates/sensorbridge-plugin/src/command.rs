// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command surface: action names and loosely-typed argument lists from script
// code, parsed into typed commands.

use serde_json::Value;

use sensorbridge_core::error::{Result, SensorBridgeError};

pub const REGISTER_CALLBACK: &str = "registerCallback";
pub const SUBSCRIBE: &str = "subscribe";
pub const UNSUBSCRIBE: &str = "unsubscribe";

/// A parsed bridge command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Bind the long-lived callback channel. Arguments are ignored.
    RegisterCallback,
    Subscribe { sensor: String, sampling: String },
    Unsubscribe { sensor: String, sampling: String },
}

impl Command {
    /// Parse an action name and its argument list.
    pub fn parse(action: &str, args: &[Value]) -> Result<Self> {
        match action {
            REGISTER_CALLBACK => Ok(Self::RegisterCallback),
            SUBSCRIBE => {
                let (sensor, sampling) = sensor_sampling_args(args)?;
                Ok(Self::Subscribe { sensor, sampling })
            }
            UNSUBSCRIBE => {
                let (sensor, sampling) = sensor_sampling_args(args)?;
                Ok(Self::Unsubscribe { sensor, sampling })
            }
            other => Err(SensorBridgeError::UnknownAction(other.to_owned())),
        }
    }

    /// Action name as sent by script code.
    pub fn action(&self) -> &'static str {
        match self {
            Self::RegisterCallback => REGISTER_CALLBACK,
            Self::Subscribe { .. } => SUBSCRIBE,
            Self::Unsubscribe { .. } => UNSUBSCRIBE,
        }
    }
}

fn sensor_sampling_args(args: &[Value]) -> Result<(String, String)> {
    Ok((
        string_arg(args, 0, "sensor type")?,
        string_arg(args, 1, "sampling period")?,
    ))
}

fn string_arg(args: &[Value], index: usize, what: &str) -> Result<String> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(SensorBridgeError::InvalidArguments(format!(
            "argument {index} ({what}) must be a string, got {other}"
        ))),
        None => Err(SensorBridgeError::InvalidArguments(format!(
            "missing argument {index} ({what})"
        ))),
    }
}
