// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android sensor service via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`. Sensor enumeration and listener registration go
// through the hosting Activity's `SensorManager`.
//
// ## Architecture notes
//
// `SensorManager.registerListener` needs a Java object implementing
// `android.hardware.SensorEventListener`; JNI cannot implement a Java
// interface on its own. The host app therefore ships a tiny glue class,
// [`LISTENER_CLASS`], constructed with a native id and forwarding both
// callbacks back into Rust:
//
// ```java
// package org.sensorbridge;
//
// public final class NativeSensorListener implements SensorEventListener {
//     private final long nativeId;
//     public NativeSensorListener(long nativeId) { this.nativeId = nativeId; }
//     @Override public void onSensorChanged(SensorEvent e) {
//         nativeOnSensorChanged(nativeId, e.values, e.timestamp, e.accuracy);
//     }
//     @Override public void onAccuracyChanged(Sensor s, int accuracy) {
//         nativeOnAccuracyChanged(nativeId, accuracy);
//     }
//     private native void nativeOnSensorChanged(long id, float[] values, long ts, int accuracy);
//     private native void nativeOnAccuracyChanged(long id, int accuracy);
// }
// ```
//
// The native ids index a process-wide table of Rust listeners so the
// exported `Java_org_sensorbridge_*` entry points can find their target.

#![cfg(target_os = "android")]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, OnceLock};

use jni::objects::{GlobalRef, JClass, JFloatArray, JObject, JString, JValue};
use jni::sys::{jint, jlong};
use jni::{JNIEnv, JavaVM};

use sensorbridge_core::error::{Result, SensorBridgeError};
use sensorbridge_core::types::{
    ListenerHandle, SamplingPeriod, SensorAccuracy, SensorInfo, SensorReading, SensorType,
};

use crate::traits::{SensorEventListener, SensorService};

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// Fully-qualified name of the host-provided Java glue listener.
pub const LISTENER_CLASS: &str = "org.sensorbridge.NativeSensorListener";

/// `Context.SENSOR_SERVICE`.
const SENSOR_SERVICE: &str = "sensor";

static JAVA_VM: OnceLock<JavaVM> = OnceLock::new();

/// Rust listeners reachable from the JNI entry points, by native id.
static NATIVE_LISTENERS: LazyLock<Mutex<HashMap<i64, NativeListener>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

static NEXT_NATIVE_ID: AtomicI64 = AtomicI64::new(1);

struct NativeListener {
    sensor: SensorInfo,
    listener: Arc<dyn SensorEventListener>,
    java: GlobalRef,
}

/// The process `JavaVM`, resolved once from `ndk_context`.
fn java_vm() -> Result<&'static JavaVM> {
    if let Some(vm) = JAVA_VM.get() {
        return Ok(vm);
    }
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is valid for the lifetime of the process.
    let vm = unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| SensorBridgeError::Platform(format!("failed to obtain JavaVM: {e}")))?;
    Ok(JAVA_VM.get_or_init(|| vm))
}

/// Obtain a [`JNIEnv`] for the current thread, attaching it if needed.
fn jni_env() -> Result<JNIEnv<'static>> {
    java_vm()?
        .attach_current_thread_permanently()
        .map_err(|e| SensorBridgeError::Platform(format!("failed to attach JNI thread: {e}")))
}

/// Obtain the hosting Android `Activity` as a [`JObject`].
fn activity() -> Result<JObject<'static>> {
    let ptr = ndk_context::android_context().context();
    if ptr.is_null() {
        return Err(SensorBridgeError::Platform(
            "Android context is null: native activity not initialised".into(),
        ));
    }
    // SAFETY: the NDK guarantees this pointer is a valid global jobject for
    // the hosting Activity.
    Ok(unsafe { JObject::from_raw(ptr.cast()) })
}

/// Map any `jni::errors::Error` into `SensorBridgeError::Platform`.
fn jni_err(context: &str, e: jni::errors::Error) -> SensorBridgeError {
    SensorBridgeError::Platform(format!("{context}: {e}"))
}

/// Run `f` inside a JNI local frame.
///
/// Threads attached with `attach_current_thread_permanently` never return to
/// Java, so their local references are only released when a frame pops.
fn with_frame<T>(
    env: &mut JNIEnv<'_>,
    capacity: i32,
    f: impl FnOnce(&mut JNIEnv<'_>) -> Result<T>,
) -> Result<T> {
    env.with_local_frame(capacity, |env| Ok::<_, jni::errors::Error>(f(env)))
        .map_err(|e| jni_err("with_local_frame", e))?
}

/// `activity.getSystemService(SENSOR_SERVICE)`.
fn sensor_manager<'a>(env: &mut JNIEnv<'a>, activity: &JObject<'_>) -> Result<JObject<'a>> {
    let j_name = env
        .new_string(SENSOR_SERVICE)
        .map_err(|e| jni_err("new_string(sensor)", e))?;
    let manager = env
        .call_method(
            activity,
            "getSystemService",
            "(Ljava/lang/String;)Ljava/lang/Object;",
            &[JValue::Object(&j_name)],
        )
        .map_err(|e| jni_err("getSystemService", e))?
        .l()
        .map_err(|e| jni_err("getSystemService->l", e))?;
    if manager.is_null() {
        return Err(SensorBridgeError::Platform("SensorManager unavailable".into()));
    }
    Ok(manager)
}

/// `sensorManager.getSensorList(type)`.
fn sensor_list<'a>(
    env: &mut JNIEnv<'a>,
    manager: &JObject<'_>,
    sensor_type: SensorType,
) -> Result<JObject<'a>> {
    env.call_method(
        manager,
        "getSensorList",
        "(I)Ljava/util/List;",
        &[JValue::Int(sensor_type.id())],
    )
    .map_err(|e| jni_err("getSensorList", e))?
    .l()
    .map_err(|e| jni_err("getSensorList->l", e))
}

/// Call a `()Ljava/lang/String;` getter and convert the result.
fn string_getter(env: &mut JNIEnv<'_>, obj: &JObject<'_>, method: &str) -> Result<String> {
    let value = env
        .call_method(obj, method, "()Ljava/lang/String;", &[])
        .map_err(|e| jni_err(method, e))?
        .l()
        .map_err(|e| jni_err(method, e))?;
    if value.is_null() {
        return Ok(String::new());
    }
    let j_str = JString::from(value);
    let s: String = env
        .get_string(&j_str)
        .map_err(|e| jni_err("get_string", e))?
        .into();
    env.delete_local_ref(j_str)
        .map_err(|e| jni_err("delete_local_ref", e))?;
    Ok(s)
}

/// Load the glue listener class through the app's class loader; `FindClass`
/// from a native thread only sees system classes.
fn glue_class<'a>(env: &mut JNIEnv<'a>, activity: &JObject<'_>) -> Result<JClass<'a>> {
    let loader = env
        .call_method(activity, "getClassLoader", "()Ljava/lang/ClassLoader;", &[])
        .map_err(|e| jni_err("getClassLoader", e))?
        .l()
        .map_err(|e| jni_err("getClassLoader->l", e))?;
    let j_name = env
        .new_string(LISTENER_CLASS)
        .map_err(|e| jni_err("new_string(listener class)", e))?;
    let class = env
        .call_method(
            &loader,
            "loadClass",
            "(Ljava/lang/String;)Ljava/lang/Class;",
            &[JValue::Object(&j_name)],
        )
        .map_err(|e| jni_err("loadClass", e))?
        .l()
        .map_err(|e| jni_err("loadClass->l", e))?;
    Ok(JClass::from(class))
}

// ---------------------------------------------------------------------------
// Service struct
// ---------------------------------------------------------------------------

/// Android implementation of the sensor service.
///
/// Holds only the mapping from listener handles to native ids; the Java
/// objects live in the process-wide listener table.
pub struct AndroidSensorService {
    native_ids: Mutex<HashMap<ListenerHandle, i64>>,
}

impl AndroidSensorService {
    /// Create a new Android sensor service.
    ///
    /// This does **not** touch JNI. The first JNI call happens lazily.
    pub fn new() -> Self {
        Self {
            native_ids: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for AndroidSensorService {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorService for AndroidSensorService {
    fn platform_name(&self) -> &str {
        "Android"
    }

    fn sensors(&self, sensor_type: SensorType) -> Result<Vec<SensorInfo>> {
        let mut env = jni_env()?;
        let activity = activity()?;
        let sensors = with_frame(&mut env, 16, |env| {
            let manager = sensor_manager(env, &activity)?;
            let list = sensor_list(env, &manager, sensor_type)?;
            if list.is_null() {
                return Ok(Vec::new());
            }

            let size = env
                .call_method(&list, "size", "()I", &[])
                .map_err(|e| jni_err("List.size", e))?
                .i()
                .map_err(|e| jni_err("List.size->i", e))?;

            let mut sensors = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
            for i in 0..size {
                let sensor = env
                    .call_method(&list, "get", "(I)Ljava/lang/Object;", &[JValue::Int(i)])
                    .map_err(|e| jni_err("List.get", e))?
                    .l()
                    .map_err(|e| jni_err("List.get->l", e))?;
                let name = string_getter(env, &sensor, "getName")?;
                let vendor = string_getter(env, &sensor, "getVendor")?;
                env.delete_local_ref(sensor)
                    .map_err(|e| jni_err("delete_local_ref", e))?;
                sensors.push(SensorInfo {
                    sensor_type,
                    name,
                    vendor,
                    index: usize::try_from(i).unwrap_or(0),
                });
            }
            Ok(sensors)
        })?;

        tracing::debug!(sensor = %sensor_type, count = sensors.len(), "Android: listed sensors");
        Ok(sensors)
    }

    fn register_listener(
        &self,
        sensor: &SensorInfo,
        period: SamplingPeriod,
        listener: Arc<dyn SensorEventListener>,
    ) -> Result<ListenerHandle> {
        let index = i32::try_from(sensor.index)
            .map_err(|_| SensorBridgeError::Platform(format!("sensor index {} out of range", sensor.index)))?;
        let native_id = NEXT_NATIVE_ID.fetch_add(1, Ordering::Relaxed);

        let mut env = jni_env()?;
        let activity = activity()?;
        with_frame(&mut env, 16, |env| {
            let manager = sensor_manager(env, &activity)?;
            let list = sensor_list(env, &manager, sensor.sensor_type)?;
            let j_sensor = env
                .call_method(&list, "get", "(I)Ljava/lang/Object;", &[JValue::Int(index)])
                .map_err(|e| jni_err("List.get", e))?
                .l()
                .map_err(|e| jni_err("List.get->l", e))?;

            // new NativeSensorListener(nativeId)
            let class = glue_class(env, &activity)?;
            let j_listener = env
                .new_object(&class, "(J)V", &[JValue::Long(native_id)])
                .map_err(|e| jni_err("new NativeSensorListener", e))?;
            let java = env
                .new_global_ref(&j_listener)
                .map_err(|e| jni_err("new_global_ref(listener)", e))?;

            // The first sample may arrive before registerListener returns.
            NATIVE_LISTENERS
                .lock()
                .map_err(|_| SensorBridgeError::Poisoned)?
                .insert(
                    native_id,
                    NativeListener {
                        sensor: sensor.clone(),
                        listener,
                        java,
                    },
                );

            let registered = env
                .call_method(
                    &manager,
                    "registerListener",
                    "(Landroid/hardware/SensorEventListener;Landroid/hardware/Sensor;I)Z",
                    &[
                        JValue::Object(&j_listener),
                        JValue::Object(&j_sensor),
                        JValue::Int(period.id()),
                    ],
                )
                .and_then(|v| v.z());

            match registered {
                Ok(true) => Ok(()),
                Ok(false) => {
                    forget_native(native_id);
                    Err(SensorBridgeError::Platform(format!(
                        "SensorManager refused listener for {} at {}",
                        sensor.sensor_type, period
                    )))
                }
                Err(e) => {
                    forget_native(native_id);
                    Err(jni_err("registerListener", e))
                }
            }
        })?;

        let handle = ListenerHandle::new();
        self.native_ids
            .lock()
            .map_err(|_| SensorBridgeError::Poisoned)?
            .insert(handle, native_id);

        tracing::info!(
            %handle,
            native_id,
            sensor = %sensor.sensor_type,
            sampling = %period,
            "Android: sensor listener registered"
        );
        Ok(handle)
    }

    fn unregister_listener(&self, handle: ListenerHandle) -> Result<()> {
        let native_id = self
            .native_ids
            .lock()
            .map_err(|_| SensorBridgeError::Poisoned)?
            .remove(&handle);
        let Some(native_id) = native_id else {
            return Ok(());
        };
        let Some(entry) = forget_native(native_id) else {
            return Ok(());
        };

        let mut env = jni_env()?;
        let activity = activity()?;
        with_frame(&mut env, 4, |env| {
            let manager = sensor_manager(env, &activity)?;
            env.call_method(
                &manager,
                "unregisterListener",
                "(Landroid/hardware/SensorEventListener;)V",
                &[JValue::Object(entry.java.as_obj())],
            )
            .map_err(|e| jni_err("unregisterListener", e))?;
            Ok(())
        })?;

        tracing::info!(%handle, native_id, sensor = %entry.sensor.sensor_type, "Android: sensor listener unregistered");
        Ok(())
    }
}

/// Drop a native id from the listener table, returning its entry.
fn forget_native(native_id: i64) -> Option<NativeListener> {
    NATIVE_LISTENERS
        .lock()
        .ok()
        .and_then(|mut table| table.remove(&native_id))
}

fn lookup_native(native_id: i64) -> Option<(SensorInfo, Arc<dyn SensorEventListener>)> {
    NATIVE_LISTENERS.lock().ok().and_then(|table| {
        table
            .get(&native_id)
            .map(|n| (n.sensor.clone(), Arc::clone(&n.listener)))
    })
}

// ---------------------------------------------------------------------------
// JNI entry points called by the glue listener
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub extern "system" fn Java_org_sensorbridge_NativeSensorListener_nativeOnSensorChanged<'local>(
    env: JNIEnv<'local>,
    _this: JObject<'local>,
    native_id: jlong,
    values: JFloatArray<'local>,
    timestamp: jlong,
    accuracy: jint,
) {
    let Some((_, listener)) = lookup_native(native_id) else {
        tracing::trace!(native_id, "Android: sample for unknown listener dropped");
        return;
    };

    let len = match env.get_array_length(&values) {
        Ok(len) => usize::try_from(len).unwrap_or(0),
        Err(e) => {
            tracing::warn!(error = %e, native_id, "Android: unreadable sensor values");
            return;
        }
    };
    let mut buf = vec![0.0f32; len];
    if let Err(e) = env.get_float_array_region(&values, 0, &mut buf) {
        tracing::warn!(error = %e, native_id, "Android: unreadable sensor values");
        return;
    }

    listener.on_sensor_changed(SensorReading {
        values: buf,
        timestamp_ns: timestamp,
        accuracy: SensorAccuracy::from_raw(accuracy),
    });
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_org_sensorbridge_NativeSensorListener_nativeOnAccuracyChanged<'local>(
    _env: JNIEnv<'local>,
    _this: JObject<'local>,
    native_id: jlong,
    accuracy: jint,
) {
    if let Some((sensor, listener)) = lookup_native(native_id) {
        listener.on_accuracy_changed(&sensor, SensorAccuracy::from_raw(accuracy));
    }
}
