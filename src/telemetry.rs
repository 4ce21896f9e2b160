//! Telemetry payload composition
//!
//! Local and peripheral readings are independent until they meet here, once
//! per telemetry iteration.

use crate::device::sensors::LocalReading;
use crate::peripheral::PeripheralReading;
use chrono::{DateTime, TimeZone};
use serde::Serialize;

/// Format of the `time` field, in the device's local time zone
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outbound telemetry document
///
/// Field order is the key order on the wire.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TelemetryPayload {
    pub proximity: u16,
    pub luminance: f64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub time: String,
    pub temperature: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub gas_resistance: f64,
    pub altitude: f64,
}

impl TelemetryPayload {
    /// Merge one local and one peripheral reading taken at `now`
    pub fn compose<Tz>(local: &LocalReading, peripheral: &PeripheralReading, now: DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        Self {
            proximity: local.proximity,
            luminance: local.luminance,
            accel_x: local.motion.x,
            accel_y: local.motion.y,
            accel_z: local.motion.z,
            time: now.format(TIME_FORMAT).to_string(),
            temperature: peripheral.temperature,
            pressure: peripheral.pressure,
            humidity: peripheral.humidity,
            gas_resistance: peripheral.gas_resistance,
            altitude: peripheral.altitude,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
