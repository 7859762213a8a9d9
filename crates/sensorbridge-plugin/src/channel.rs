// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Callback channel between the bridge and script code.
//
// Every message pushed to a caller is a `PluginResult`. A result with
// `keep_callback` set tells the script side that more messages will follow on
// the same callback; one-shot command replies leave it unset.
//
// The channel is unbounded: platform dispatch threads push without blocking
// and the caller drains at its own pace.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use sensorbridge_core::error::{Result, SensorBridgeError};

/// Outcome carried by a pushed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// A single message delivered to script code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginResult {
    pub status: Status,
    /// Data carried by the result. Errors leave it `null` unless the failing
    /// command still reports a value (unsubscribe's removed count).
    pub payload: Value,
    /// Error string for `Status::Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The callback stays open for further messages.
    pub keep_callback: bool,
}

impl PluginResult {
    pub fn ok(payload: impl Into<Value>) -> Self {
        Self {
            status: Status::Ok,
            payload: payload.into(),
            message: None,
            keep_callback: false,
        }
    }

    /// Success with no payload.
    pub fn ok_empty() -> Self {
        Self::ok(Value::Null)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            payload: Value::Null,
            message: Some(message.into()),
            keep_callback: false,
        }
    }

    /// Replace the payload, keeping status and message.
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Mark the callback as kept open.
    pub fn keep(mut self) -> Self {
        self.keep_callback = true;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Error string, if this is an error result.
    pub fn error_message(&self) -> Option<&str> {
        match self.status {
            Status::Error => self.message.as_deref(),
            Status::Ok => None,
        }
    }
}

/// Create a connected sender/stream pair.
pub fn callback_channel() -> (CallbackSender, CallbackStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CallbackSender { tx }, CallbackStream { rx })
}

/// Push half of a callback channel, held by the bridge.
#[derive(Debug, Clone)]
pub struct CallbackSender {
    tx: UnboundedSender<PluginResult>,
}

impl CallbackSender {
    /// Push a message. Fails only when the caller dropped its stream.
    pub fn send(&self, result: PluginResult) -> Result<()> {
        self.tx
            .send(result)
            .map_err(|_| SensorBridgeError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Drain half of a callback channel, held by the caller.
///
/// Ends (`None`) once every sender has been dropped, e.g. after the bridge
/// tears down.
#[derive(Debug)]
pub struct CallbackStream {
    rx: UnboundedReceiver<PluginResult>,
}

impl CallbackStream {
    /// Wait for the next message.
    pub async fn next(&mut self) -> Option<PluginResult> {
        self.rx.recv().await
    }

    /// Take the next message if one is already queued.
    pub fn try_next(&mut self) -> Option<PluginResult> {
        self.rx.try_recv().ok()
    }

    /// Take every message already queued.
    pub fn drain(&mut self) -> Vec<PluginResult> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Whether every sender is gone and nothing is left to read. Queued
    /// messages are left in place.
    pub fn is_finished(&self) -> bool {
        self.rx.is_closed() && self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_sets_flag_only() {
        let r = PluginResult::ok("registered").keep();
        assert!(r.is_ok());
        assert!(r.keep_callback);
        assert_eq!(r.payload, "registered");
    }

    #[test]
    fn error_message_only_for_errors() {
        assert_eq!(PluginResult::error("boom").error_message(), Some("boom"));
        assert_eq!(PluginResult::ok("boom").error_message(), None);
    }

    #[test]
    fn send_after_stream_dropped_fails() {
        let (tx, rx) = callback_channel();
        drop(rx);
        assert!(tx.is_closed());
        assert!(matches!(
            tx.send(PluginResult::ok_empty()),
            Err(SensorBridgeError::ChannelClosed)
        ));
    }

    #[test]
    fn stream_finishes_when_senders_drop() {
        let (tx, mut rx) = callback_channel();
        tx.send(PluginResult::ok(1)).unwrap();
        drop(tx);
        assert!(!rx.is_finished());
        assert_eq!(rx.drain(), vec![PluginResult::ok(1)]);
        assert!(rx.is_finished());
    }

    #[tokio::test]
    async fn async_next_receives_in_order() {
        let (tx, mut rx) = callback_channel();
        tx.send(PluginResult::ok(1).keep()).unwrap();
        tx.send(PluginResult::ok(2).keep()).unwrap();
        assert_eq!(rx.next().await.unwrap().payload, 1);
        assert_eq!(rx.next().await.unwrap().payload, 2);
    }

    #[test]
    fn serializes_with_lowercase_status() {
        let json = serde_json::to_value(PluginResult::error("x")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "x");
        assert_eq!(json["keep_callback"], false);

        let json = serde_json::to_value(PluginResult::ok(1)).unwrap();
        assert!(json.get("message").is_none());
    }

    #[test]
    fn error_can_carry_payload() {
        let r = PluginResult::error("nothing to remove").with_payload(0);
        assert_eq!(r.status, Status::Error);
        assert_eq!(r.payload, 0);
        assert_eq!(r.error_message(), Some("nothing to remove"));
    }
}
