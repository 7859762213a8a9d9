// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sensor bridge plugin, the script-facing half. Script code binds one
// long-lived callback stream, subscribes to (sensor, sampling) pairs through
// the command surface, and receives every sample as a pushed message.

pub mod bridge;
pub mod channel;
pub mod command;

pub use bridge::SensorBridge;
pub use channel::{CallbackSender, CallbackStream, PluginResult, Status, callback_channel};
pub use command::Command;
