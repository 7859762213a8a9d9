// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The sensor bridge: one bound callback, one platform listener per
// (sensor, sampling) pair, and a straight relay from platform samples to the
// callback stream.
//
// Locking:
//   - `commands` serializes registerCallback / subscribe / unsubscribe /
//     teardown. Delivery never takes it.
//   - `Shared::state` guards the callback and the subscription map. It is
//     held only for short map operations and while pushing one message, never
//     across a call into the sensor service, so the platform may deliver from
//     inside register/unregister.
// A sample is forwarded only if, under the state lock, its subscription is
// still the live one for its key. Once unsubscribe/teardown has removed the
// entry no further message for it reaches the callback.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, error, info, instrument, trace, warn};

use sensorbridge_core::error::{Result, SensorBridgeError};
use sensorbridge_core::types::{
    ListenerHandle, SamplingPeriod, SensorAccuracy, SensorEvent, SensorInfo, SensorReading,
    SensorType, SubscriptionKey,
};
use sensorbridge_native::traits::{SensorEventListener, SensorService};

use crate::channel::{CallbackSender, PluginResult};
use crate::command::Command;

/// Acknowledgement pushed when a callback is bound.
pub const REGISTERED_ACK: &str = "registered";

// ---------------------------------------------------------------------------
// Name resolution
// ---------------------------------------------------------------------------

/// Accepted sensor-type and sampling-period names, built once from the
/// vocabulary the platform reports.
struct Vocabulary {
    sensor_types: HashMap<&'static str, SensorType>,
    sampling_periods: HashMap<&'static str, SamplingPeriod>,
}

impl Vocabulary {
    fn from_service(service: &dyn SensorService) -> Self {
        Self {
            sensor_types: service
                .sensor_types()
                .into_iter()
                .map(|t| (t.name(), t))
                .collect(),
            sampling_periods: service
                .sampling_periods()
                .into_iter()
                .map(|p| (p.name(), p))
                .collect(),
        }
    }

    fn sensor_type(&self, name: &str) -> Result<SensorType> {
        self.sensor_types
            .get(name)
            .copied()
            .ok_or_else(|| SensorBridgeError::UnknownSensorType(name.to_owned()))
    }

    fn sampling_period(&self, name: &str) -> Result<SamplingPeriod> {
        self.sampling_periods
            .get(name)
            .copied()
            .ok_or_else(|| SensorBridgeError::UnknownSamplingPeriod(name.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Subscription {
    /// Distinguishes this subscription from an earlier one on the same key.
    id: u64,
    /// Set once the platform accepted the listener.
    handle: Option<ListenerHandle>,
    sensor: SensorInfo,
}

#[derive(Default)]
struct State {
    callback: Option<CallbackSender>,
    subscriptions: HashMap<SubscriptionKey, Subscription>,
    next_id: u64,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| SensorBridgeError::Poisoned)
    }

    /// Forward one platform sample to the bound callback.
    fn deliver(&self, key: SubscriptionKey, id: u64, reading: &SensorReading) {
        let Ok(state) = self.state.lock() else {
            warn!(%key, "bridge state poisoned, sample dropped");
            return;
        };
        if state.subscriptions.get(&key).map(|s| s.id) != Some(id) {
            trace!(%key, "sample for closed subscription dropped");
            return;
        }
        let Some(callback) = state.callback.as_ref() else {
            return;
        };

        let message = match SensorEvent::new(key, reading).to_json() {
            Ok(json) => PluginResult::ok(json).keep(),
            Err(e) => {
                error!(%key, error = %e, "failed to encode sensor event");
                PluginResult::error(e.to_string()).keep()
            }
        };
        match callback.send(message) {
            Ok(()) => trace!(%key, ts = reading.timestamp_ns, "sensor event delivered"),
            Err(e) => warn!(%key, error = %e, "sensor event not delivered"),
        }
    }
}

/// Platform listener for one subscription.
struct BridgeListener {
    key: SubscriptionKey,
    id: u64,
    shared: Arc<Shared>,
}

impl SensorEventListener for BridgeListener {
    fn on_sensor_changed(&self, reading: SensorReading) {
        self.shared.deliver(self.key, self.id, &reading);
    }

    fn on_accuracy_changed(&self, _sensor: &SensorInfo, accuracy: SensorAccuracy) {
        // Not forwarded to script code.
        trace!(key = %self.key, ?accuracy, "accuracy change ignored");
    }
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

/// Script-facing sensor bridge over a platform [`SensorService`].
///
/// All methods take `&self`; the bridge can be shared across threads behind
/// an `Arc`.
pub struct SensorBridge {
    service: Arc<dyn SensorService>,
    vocabulary: Vocabulary,
    shared: Arc<Shared>,
    commands: Mutex<()>,
}

impl SensorBridge {
    /// Create a bridge over `service`. Name tables are built here, once.
    pub fn new(service: Arc<dyn SensorService>) -> Self {
        let vocabulary = Vocabulary::from_service(service.as_ref());
        info!(
            platform = service.platform_name(),
            sensor_types = vocabulary.sensor_types.len(),
            sampling_periods = vocabulary.sampling_periods.len(),
            "sensor bridge created"
        );
        Self {
            service,
            vocabulary,
            shared: Arc::new(Shared::default()),
            commands: Mutex::new(()),
        }
    }

    /// Name of the underlying platform service.
    pub fn platform_name(&self) -> &str {
        self.service.platform_name()
    }

    fn serialize_commands(&self) -> Result<MutexGuard<'_, ()>> {
        self.commands.lock().map_err(|_| SensorBridgeError::Poisoned)
    }

    // -- Command surface -----------------------------------------------------

    /// Run one script command and push exactly one reply through `callback`.
    ///
    /// For `registerCallback` the reply is the `"registered"` acknowledgement
    /// and `callback` stays bound for every later sample; for the other
    /// commands `callback` only receives the one-shot reply. `unsubscribe`
    /// replies carry the removed count as payload, 0 on `NotSubscribed`.
    pub fn execute(&self, action: &str, args: &[Value], callback: CallbackSender) {
        let command = match Command::parse(action, args) {
            Ok(command) => command,
            Err(e) => {
                warn!(action, error = %e, "rejected command");
                if callback.send(PluginResult::error(e.to_string())).is_err() {
                    debug!(action, "caller dropped its reply channel");
                }
                return;
            }
        };
        trace!(action = command.action(), "dispatching command");

        let reply = match command {
            Command::RegisterCallback => match self.register_callback(callback.clone()) {
                Ok(()) => return,
                Err(e) => PluginResult::error(e.to_string()),
            },
            Command::Subscribe { sensor, sampling } => match self.subscribe(&sensor, &sampling) {
                Ok(()) => PluginResult::ok_empty(),
                Err(e) => PluginResult::error(e.to_string()),
            },
            Command::Unsubscribe { sensor, sampling } => {
                match self.unsubscribe(&sensor, &sampling) {
                    Ok(removed) => PluginResult::ok(removed),
                    Err(e @ SensorBridgeError::NotSubscribed { removed, .. }) => {
                        PluginResult::error(e.to_string()).with_payload(removed)
                    }
                    Err(e) => PluginResult::error(e.to_string()),
                }
            }
        };
        if callback.send(reply).is_err() {
            debug!(action, "caller dropped its reply channel");
        }
    }

    /// Bind the long-lived callback and push the `"registered"`
    /// acknowledgement through it.
    ///
    /// Fails with `AlreadyRegistered` while another callback is bound; the
    /// bound one is kept.
    #[instrument(skip_all)]
    pub fn register_callback(&self, callback: CallbackSender) -> Result<()> {
        let _cmd = self.serialize_commands()?;
        let mut state = self.shared.lock()?;
        if state.callback.is_some() {
            warn!("callback already registered");
            return Err(SensorBridgeError::AlreadyRegistered);
        }
        callback.send(PluginResult::ok(REGISTERED_ACK).keep())?;
        state.callback = Some(callback);
        info!("event callback registered");
        Ok(())
    }

    /// Start delivering samples of `sensor_name` at `sampling_name`.
    #[instrument(skip(self))]
    pub fn subscribe(&self, sensor_name: &str, sampling_name: &str) -> Result<()> {
        let _cmd = self.serialize_commands()?;
        if self.shared.lock()?.callback.is_none() {
            return Err(SensorBridgeError::NoCallbackRegistered);
        }

        let sensor_type = self.vocabulary.sensor_type(sensor_name)?;
        let sensor = self
            .service
            .sensors(sensor_type)?
            .into_iter()
            .next()
            .ok_or_else(|| SensorBridgeError::SensorUnavailable(sensor_name.to_owned()))?;
        let sampling = self.vocabulary.sampling_period(sampling_name)?;
        let key = SubscriptionKey::new(sensor_type, sampling);

        // Insert before registering so samples delivered during registration
        // already find their subscription.
        let id = {
            let mut state = self.shared.lock()?;
            if state.subscriptions.contains_key(&key) {
                return Err(SensorBridgeError::DuplicateSubscription {
                    sensor: sensor_name.to_owned(),
                    sampling: sampling_name.to_owned(),
                });
            }
            let id = state.next_id;
            state.next_id += 1;
            state.subscriptions.insert(
                key,
                Subscription {
                    id,
                    handle: None,
                    sensor: sensor.clone(),
                },
            );
            id
        };

        let listener = Arc::new(BridgeListener {
            key,
            id,
            shared: Arc::clone(&self.shared),
        });
        match self.service.register_listener(&sensor, sampling, listener) {
            Ok(handle) => {
                if let Some(sub) = self.shared.lock()?.subscriptions.get_mut(&key) {
                    sub.handle = Some(handle);
                }
                debug!(%key, %handle, device = %sensor.name, "subscribed");
                Ok(())
            }
            Err(e) => {
                self.shared.lock()?.subscriptions.remove(&key);
                warn!(%key, error = %e, "platform refused listener");
                Err(e)
            }
        }
    }

    /// Stop delivering samples for the exact pair. Returns the number of
    /// listeners removed.
    #[instrument(skip(self))]
    pub fn unsubscribe(&self, sensor_name: &str, sampling_name: &str) -> Result<usize> {
        let _cmd = self.serialize_commands()?;
        let not_subscribed = || SensorBridgeError::NotSubscribed {
            sensor: sensor_name.to_owned(),
            sampling: sampling_name.to_owned(),
            removed: 0,
        };

        // Names that never resolve can never have been subscribed.
        let (Ok(sensor_type), Ok(sampling)) = (
            self.vocabulary.sensor_type(sensor_name),
            self.vocabulary.sampling_period(sampling_name),
        ) else {
            return Err(not_subscribed());
        };
        let key = SubscriptionKey::new(sensor_type, sampling);

        let removed = self.shared.lock()?.subscriptions.remove(&key);
        let sub = removed.ok_or_else(not_subscribed)?;
        if let Some(handle) = sub.handle {
            self.service.unregister_listener(handle)?;
        }
        debug!(%key, device = %sub.sensor.name, "unsubscribed");
        Ok(1)
    }

    /// Close every platform listener and clear all subscriptions and the
    /// bound callback. Returns the number of subscriptions closed.
    pub fn teardown(&self) -> usize {
        let _cmd = self.commands.lock();
        let (subscriptions, callback) = match self.shared.state.lock() {
            Ok(mut state) => (
                std::mem::take(&mut state.subscriptions),
                state.callback.take(),
            ),
            Err(_) => {
                error!("bridge state poisoned, teardown skipped");
                return 0;
            }
        };
        drop(callback);

        let closed = subscriptions.len();
        for (key, sub) in subscriptions {
            if let Some(handle) = sub.handle {
                if let Err(e) = self.service.unregister_listener(handle) {
                    warn!(%key, error = %e, "failed to unregister listener during teardown");
                }
            }
        }
        if closed > 0 {
            info!(closed, "sensor bridge torn down");
        }
        closed
    }

    // -- Host lifecycle --------------------------------------------------------

    /// The hosting page context is being destroyed.
    pub fn on_destroy(&self) {
        self.teardown();
    }

    /// The hosting page navigated away and its script state is gone.
    pub fn on_reset(&self) {
        self.teardown();
    }

    // -- Introspection ---------------------------------------------------------

    pub fn has_callback(&self) -> bool {
        self.shared
            .lock()
            .map(|s| s.callback.is_some())
            .unwrap_or(false)
    }

    /// Active subscription keys, sorted.
    pub fn active_subscriptions(&self) -> Vec<SubscriptionKey> {
        let mut keys: Vec<SubscriptionKey> = self
            .shared
            .lock()
            .map(|s| s.subscriptions.keys().copied().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl Drop for SensorBridge {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{CallbackStream, Status, callback_channel};
    use sensorbridge_native::SimSensorService;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn sim() -> SimSensorService {
        SimSensorService::new([SensorType::Accelerometer, SensorType::Gyroscope])
    }

    fn bridge_with(svc: &SimSensorService) -> SensorBridge {
        SensorBridge::new(Arc::new(svc.clone()))
    }

    /// Bridge with a bound callback; the acknowledgement is already consumed.
    fn registered(svc: &SimSensorService) -> (SensorBridge, CallbackStream) {
        let bridge = bridge_with(svc);
        let (tx, mut events) = callback_channel();
        bridge.register_callback(tx).expect("register");
        let ack = events.try_next().expect("ack");
        assert_eq!(ack.payload, REGISTERED_ACK);
        (bridge, events)
    }

    /// Run a one-shot command and return its single reply.
    fn call(bridge: &SensorBridge, action: &str, args: &[Value]) -> PluginResult {
        let (tx, mut rx) = callback_channel();
        bridge.execute(action, args, tx);
        let reply = rx.try_next().expect("reply");
        assert!(rx.is_finished(), "exactly one reply per command");
        reply
    }

    #[test]
    fn register_pushes_kept_acknowledgement() {
        let bridge = bridge_with(&sim());
        let (tx, mut events) = callback_channel();
        bridge.register_callback(tx).unwrap();

        let ack = events.try_next().unwrap();
        assert_eq!(ack, PluginResult::ok("registered").keep());
        assert!(bridge.has_callback());
        assert!(!events.is_finished());
    }

    #[test]
    fn second_registration_fails_and_first_stays_bound() {
        let svc = sim();
        let (bridge, mut events) = registered(&svc);

        let (tx2, events2) = callback_channel();
        let err = bridge.register_callback(tx2).unwrap_err();
        assert!(matches!(err, SensorBridgeError::AlreadyRegistered));
        assert!(events2.is_finished());

        bridge.subscribe("ACCELEROMETER", "UI").unwrap();
        svc.emit(SensorType::Accelerometer, vec![1.0, 2.0, 3.0]);
        assert_eq!(events.drain().len(), 1);
    }

    #[test]
    fn subscribe_without_callback_fails_without_side_effects() {
        let svc = sim();
        let bridge = bridge_with(&svc);
        let err = bridge.subscribe("ACCELEROMETER", "UI").unwrap_err();
        assert!(matches!(err, SensorBridgeError::NoCallbackRegistered));
        assert!(bridge.active_subscriptions().is_empty());
        assert_eq!(svc.listener_count(), 0);
    }

    #[test]
    fn unknown_sensor_type_creates_nothing() {
        let svc = sim();
        let (bridge, _events) = registered(&svc);
        let err = bridge.subscribe("NOT_A_SENSOR", "UI").unwrap_err();
        assert!(matches!(err, SensorBridgeError::UnknownSensorType(n) if n == "NOT_A_SENSOR"));
        assert!(bridge.active_subscriptions().is_empty());
        assert_eq!(svc.listener_count(), 0);
    }

    #[test]
    fn unknown_sampling_period() {
        let (bridge, _events) = registered(&sim());
        let err = bridge.subscribe("ACCELEROMETER", "SOMETIMES").unwrap_err();
        assert!(matches!(err, SensorBridgeError::UnknownSamplingPeriod(_)));
    }

    #[test]
    fn absent_hardware_is_unavailable() {
        let (bridge, _events) = registered(&sim());
        let err = bridge.subscribe("HEART_RATE", "NORMAL").unwrap_err();
        assert!(matches!(err, SensorBridgeError::SensorUnavailable(n) if n == "HEART_RATE"));
    }

    #[test]
    fn duplicate_subscription_leaves_original_running() {
        let svc = sim();
        let (bridge, mut events) = registered(&svc);
        bridge.subscribe("ACCELEROMETER", "UI").unwrap();

        let err = bridge.subscribe("ACCELEROMETER", "UI").unwrap_err();
        assert!(matches!(err, SensorBridgeError::DuplicateSubscription { .. }));
        assert_eq!(svc.listener_count(), 1);

        svc.emit(SensorType::Accelerometer, vec![0.1, 0.2, 0.3]);
        assert_eq!(events.drain().len(), 1);
    }

    #[test]
    fn same_sensor_at_two_rates_is_two_subscriptions() {
        let svc = sim();
        let (bridge, mut events) = registered(&svc);
        bridge.subscribe("ACCELEROMETER", "UI").unwrap();
        bridge.subscribe("ACCELEROMETER", "GAME").unwrap();
        assert_eq!(
            svc.registered_periods(SensorType::Accelerometer),
            vec![SamplingPeriod::Game, SamplingPeriod::Ui]
        );

        svc.emit(SensorType::Accelerometer, vec![0.0; 3]);
        let mut samplings: Vec<String> = events
            .drain()
            .into_iter()
            .map(|m| m.payload["sampling"].as_str().unwrap().to_owned())
            .collect();
        samplings.sort();
        assert_eq!(samplings, vec!["GAME", "UI"]);
    }

    #[test]
    fn sample_is_delivered_once_and_tagged() {
        let svc = sim();
        let (bridge, mut events) = registered(&svc);
        bridge.subscribe("ACCELEROMETER", "UI").unwrap();

        assert_eq!(svc.emit(SensorType::Accelerometer, vec![0.5, -1.0, 9.75]), 1);

        let delivered = events.drain();
        assert_eq!(delivered.len(), 1);
        let event = &delivered[0];
        assert_eq!(event.status, Status::Ok);
        assert!(event.keep_callback);
        assert_eq!(event.payload["sensor"], "ACCELEROMETER");
        assert_eq!(event.payload["sampling"], "UI");
        assert_eq!(event.payload["values"], json!([0.5, -1.0, 9.75]));
        assert!(event.payload["timeStamp"].is_i64());
    }

    #[test]
    fn unencodable_sample_reports_error_and_keeps_subscription() {
        let svc = sim();
        let (bridge, mut events) = registered(&svc);
        bridge.subscribe("GYROSCOPE", "GAME").unwrap();

        svc.emit(SensorType::Gyroscope, vec![f32::INFINITY, 0.0, 0.0]);
        let msg = events.try_next().unwrap();
        assert_eq!(msg.status, Status::Error);
        assert!(msg.keep_callback);
        assert!(msg.error_message().unwrap().contains("not finite"));

        svc.emit(SensorType::Gyroscope, vec![0.0, 0.0, 0.0]);
        assert!(events.try_next().unwrap().is_ok());
        assert_eq!(bridge.active_subscriptions().len(), 1);
    }

    #[test]
    fn accuracy_changes_are_dropped() {
        let svc = sim();
        let (bridge, mut events) = registered(&svc);
        bridge.subscribe("ACCELEROMETER", "UI").unwrap();

        assert_eq!(svc.emit_accuracy(SensorType::Accelerometer, SensorAccuracy::Low), 1);
        assert!(events.try_next().is_none());
    }

    #[test]
    fn unsubscribe_inactive_pair_fails() {
        let (bridge, _events) = registered(&sim());
        let err = bridge.unsubscribe("ACCELEROMETER", "UI").unwrap_err();
        assert!(matches!(err, SensorBridgeError::NotSubscribed { .. }));

        let err = bridge.unsubscribe("NOT_A_SENSOR", "UI").unwrap_err();
        assert!(matches!(err, SensorBridgeError::NotSubscribed { .. }));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let svc = sim();
        let (bridge, mut events) = registered(&svc);
        bridge.subscribe("ACCELEROMETER", "UI").unwrap();

        assert_eq!(bridge.unsubscribe("ACCELEROMETER", "UI").unwrap(), 1);
        assert_eq!(svc.listener_count(), 0);
        svc.emit(SensorType::Accelerometer, vec![0.0; 3]);
        assert!(events.try_next().is_none());
    }

    #[test]
    fn resubscribe_after_unsubscribe() {
        let svc = sim();
        let (bridge, mut events) = registered(&svc);
        bridge.subscribe("ACCELEROMETER", "UI").unwrap();
        bridge.unsubscribe("ACCELEROMETER", "UI").unwrap();
        bridge.subscribe("ACCELEROMETER", "UI").unwrap();

        svc.emit(SensorType::Accelerometer, vec![0.0; 3]);
        assert_eq!(events.drain().len(), 1);
    }

    #[test]
    fn teardown_closes_everything() {
        let svc = sim();
        let (bridge, mut events) = registered(&svc);
        bridge.subscribe("ACCELEROMETER", "UI").unwrap();
        bridge.subscribe("GYROSCOPE", "FASTEST").unwrap();

        assert_eq!(bridge.teardown(), 2);
        assert_eq!(svc.listener_count(), 0);
        assert!(bridge.active_subscriptions().is_empty());
        assert!(!bridge.has_callback());

        svc.emit(SensorType::Accelerometer, vec![0.0; 3]);
        assert!(events.is_finished());

        let (tx, mut fresh) = callback_channel();
        bridge.register_callback(tx).unwrap();
        assert_eq!(fresh.try_next().unwrap().payload, REGISTERED_ACK);
    }

    #[test]
    fn reset_and_destroy_tear_down() {
        let svc = sim();
        let (bridge, _events) = registered(&svc);
        bridge.subscribe("ACCELEROMETER", "UI").unwrap();
        bridge.on_reset();
        assert_eq!(svc.listener_count(), 0);
        assert!(!bridge.has_callback());

        let (tx, _fresh) = callback_channel();
        bridge.register_callback(tx).unwrap();
        bridge.subscribe("GYROSCOPE", "UI").unwrap();
        bridge.on_destroy();
        assert_eq!(svc.listener_count(), 0);
    }

    #[test]
    fn dropping_bridge_unregisters_listeners() {
        let svc = sim();
        {
            let (bridge, _events) = registered(&svc);
            bridge.subscribe("ACCELEROMETER", "UI").unwrap();
            assert_eq!(svc.listener_count(), 1);
        }
        assert_eq!(svc.listener_count(), 0);
    }

    #[test]
    fn closed_callback_does_not_stop_sensing() {
        let svc = sim();
        let (bridge, events) = registered(&svc);
        bridge.subscribe("ACCELEROMETER", "UI").unwrap();
        drop(events);

        svc.emit(SensorType::Accelerometer, vec![0.0; 3]);
        assert_eq!(bridge.active_subscriptions().len(), 1);
        assert_eq!(svc.listener_count(), 1);
    }

    // -- Command surface --

    #[test]
    fn execute_register_callback_replies_through_bound_channel() {
        let svc = sim();
        let bridge = bridge_with(&svc);
        let (tx, mut events) = callback_channel();
        bridge.execute("registerCallback", &[], tx);
        assert_eq!(events.try_next().unwrap(), PluginResult::ok("registered").keep());

        let reply = call(&bridge, "registerCallback", &[]);
        assert_eq!(reply.error_message(), Some("callback already registered"));
    }

    #[test]
    fn execute_subscribe_and_unsubscribe() {
        let svc = sim();
        let (bridge, _events) = registered(&svc);

        let reply = call(&bridge, "subscribe", &[json!("ACCELEROMETER"), json!("UI")]);
        assert_eq!(reply, PluginResult::ok_empty());

        let reply = call(&bridge, "subscribe", &[json!("ACCELEROMETER"), json!("UI")]);
        assert_eq!(
            reply.error_message(),
            Some("listener already registered for sensor ACCELEROMETER at sampling period UI")
        );

        let reply = call(&bridge, "unsubscribe", &[json!("ACCELEROMETER"), json!("UI")]);
        assert_eq!(reply, PluginResult::ok(1));

        let reply = call(&bridge, "unsubscribe", &[json!("ACCELEROMETER"), json!("UI")]);
        assert_eq!(
            reply.error_message(),
            Some("no listener found for sensor ACCELEROMETER at sampling period UI")
        );
    }

    #[test]
    fn unsubscribe_inactive_pair_reports_zero_removed() {
        let (bridge, _events) = registered(&sim());

        let reply = call(&bridge, "unsubscribe", &[json!("ACCELEROMETER"), json!("UI")]);
        assert_eq!(reply.status, Status::Error);
        assert_eq!(reply.payload, json!(0));
        assert!(!reply.keep_callback);

        let err = bridge.unsubscribe("GYROSCOPE", "GAME").unwrap_err();
        assert!(matches!(err, SensorBridgeError::NotSubscribed { removed: 0, .. }));
    }

    #[test]
    fn execute_rejects_bad_input() {
        let (bridge, _events) = registered(&sim());
        let reply = call(&bridge, "selfDestruct", &[]);
        assert_eq!(reply.error_message(), Some("unknown action: selfDestruct"));

        let reply = call(&bridge, "subscribe", &[json!("ACCELEROMETER")]);
        assert!(reply.error_message().unwrap().starts_with("invalid arguments"));
    }

    #[test]
    fn concurrent_samples_and_unsubscribe() {
        let svc = sim();
        let (bridge, mut events) = registered(&svc);
        bridge.subscribe("ACCELEROMETER", "FASTEST").unwrap();

        let emitter = {
            let svc = svc.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    svc.emit(SensorType::Accelerometer, vec![0.0; 3]);
                }
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(1));
        bridge.unsubscribe("ACCELEROMETER", "FASTEST").unwrap();
        events.drain();
        emitter.join().unwrap();

        // Nothing arrives once unsubscribe has returned.
        assert!(events.drain().is_empty());
    }

    /// Lists one sensor of every type; refuses the first listener, then
    /// accepts.
    struct RefuseOnce {
        refused: AtomicBool,
    }

    impl SensorService for RefuseOnce {
        fn platform_name(&self) -> &str {
            "refuse-once"
        }

        fn sensors(&self, sensor_type: SensorType) -> Result<Vec<SensorInfo>> {
            Ok(vec![SensorInfo {
                sensor_type,
                name: format!("{sensor_type} test device"),
                vendor: "test".into(),
                index: 0,
            }])
        }

        fn register_listener(
            &self,
            _sensor: &SensorInfo,
            _period: SamplingPeriod,
            _listener: Arc<dyn SensorEventListener>,
        ) -> Result<ListenerHandle> {
            if self.refused.swap(true, Ordering::SeqCst) {
                Ok(ListenerHandle::new())
            } else {
                Err(SensorBridgeError::Platform("registerListener returned false".into()))
            }
        }

        fn unregister_listener(&self, _handle: ListenerHandle) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn refused_listener_rolls_back_subscription() {
        let bridge = SensorBridge::new(Arc::new(RefuseOnce {
            refused: AtomicBool::new(false),
        }));
        let (tx, _events) = callback_channel();
        bridge.register_callback(tx).unwrap();

        let err = bridge.subscribe("LIGHT", "NORMAL").unwrap_err();
        assert!(matches!(err, SensorBridgeError::Platform(m) if m.contains("returned false")));
        assert!(bridge.active_subscriptions().is_empty());

        bridge.subscribe("LIGHT", "NORMAL").unwrap();
        assert_eq!(
            bridge.active_subscriptions(),
            vec![SubscriptionKey::new(SensorType::Light, SamplingPeriod::Normal)]
        );
    }
}
