// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One bridge session driven through the script command surface.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use sensorbridge_core::error::{Result, SensorBridgeError};
use sensorbridge_core::types::SubscriptionKey;
use sensorbridge_core::BridgeConfig;
use sensorbridge_native::{SensorService, SimSensorService, platform_service};
use sensorbridge_plugin::bridge::REGISTERED_ACK;
use sensorbridge_plugin::command::{REGISTER_CALLBACK, SUBSCRIBE};
use sensorbridge_plugin::{CallbackStream, PluginResult, SensorBridge, callback_channel};

/// Pick the sensor service the config asks for.
pub fn sensor_service(config: &BridgeConfig) -> Arc<dyn SensorService> {
    let sim = &config.simulator;
    if !sim.enabled {
        return platform_service();
    }
    let present = sim.sensors.iter().copied();
    if sim.tick {
        Arc::new(SimSensorService::ticking(present))
    } else {
        Arc::new(SimSensorService::new(present))
    }
}

/// Send a subscribe/unsubscribe style command and return its single reply.
pub fn command(bridge: &SensorBridge, action: &str, key: SubscriptionKey) -> PluginResult {
    let (tx, mut rx) = callback_channel();
    bridge.execute(
        action,
        &[json!(key.sensor.name()), json!(key.sampling.name())],
        tx,
    );
    rx.try_next()
        .unwrap_or_else(|| PluginResult::error("no reply"))
}

/// Register the callback and wait for the acknowledgement.
pub async fn register(bridge: &SensorBridge) -> Result<CallbackStream> {
    let (tx, mut events) = callback_channel();
    bridge.execute(REGISTER_CALLBACK, &[], tx);
    match events.next().await {
        Some(ack) if ack.is_ok() && ack.payload == REGISTERED_ACK => Ok(events),
        Some(other) => Err(SensorBridgeError::Platform(format!(
            "expected registration acknowledgement, got {}",
            other.error_message().unwrap_or("an unexpected payload")
        ))),
        None => Err(SensorBridgeError::ChannelClosed),
    }
}

/// Run until the stream ends, Ctrl-C, or the configured run time elapses.
pub async fn run(config: BridgeConfig) -> Result<()> {
    let bridge = SensorBridge::new(sensor_service(&config));
    info!(platform = bridge.platform_name(), "bridge ready");

    let mut events = register(&bridge).await?;

    for key in &config.subscriptions {
        let reply = command(&bridge, SUBSCRIBE, *key);
        match reply.error_message() {
            None => info!(%key, "subscribed"),
            Some(error) => warn!(%key, error, "subscription failed"),
        }
    }

    let deadline = async {
        match config.run_seconds {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut forwarded = 0u64;
    loop {
        tokio::select! {
            msg = events.next() => match msg {
                Some(msg) => {
                    print_line(&msg)?;
                    forwarded += 1;
                }
                None => break,
            },
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            _ = &mut deadline => {
                info!("run time elapsed");
                break;
            }
        }
    }

    let closed = bridge.teardown();
    info!(forwarded, closed, "session finished");
    Ok(())
}

fn print_line(msg: &PluginResult) -> Result<()> {
    let line = serde_json::to_string(msg)?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "{line}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorbridge_core::types::{SamplingPeriod, SensorType};
    use sensorbridge_plugin::command::UNSUBSCRIBE;

    fn sim_config(tick: bool) -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.simulator.enabled = true;
        config.simulator.tick = tick;
        config
    }

    #[test]
    fn disabled_simulator_uses_platform_service() {
        let mut config = BridgeConfig::default();
        config.simulator.enabled = false;
        assert_ne!(sensor_service(&config).platform_name(), "Simulator");
        assert_eq!(sensor_service(&sim_config(false)).platform_name(), "Simulator");
    }

    #[tokio::test]
    async fn register_then_command_roundtrip() {
        let bridge = SensorBridge::new(sensor_service(&sim_config(false)));
        let _events = register(&bridge).await.unwrap();

        let key = SubscriptionKey::new(SensorType::Gyroscope, SamplingPeriod::Normal);
        assert!(command(&bridge, SUBSCRIBE, key).is_ok());
        assert_eq!(command(&bridge, UNSUBSCRIBE, key), PluginResult::ok(1));

        let again = command(&bridge, UNSUBSCRIBE, key);
        assert!(!again.is_ok());
        assert_eq!(again.payload, serde_json::json!(0));
    }

    #[tokio::test]
    async fn second_register_is_rejected() {
        let bridge = SensorBridge::new(sensor_service(&sim_config(false)));
        let _events = register(&bridge).await.unwrap();
        assert!(register(&bridge).await.is_err());
    }

    #[tokio::test]
    async fn run_stops_after_configured_time() {
        let mut config = sim_config(true);
        config.run_seconds = Some(0);
        run(config).await.unwrap();
    }
}
