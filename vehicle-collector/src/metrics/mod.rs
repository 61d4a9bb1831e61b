//! Metric points built from telemetry snapshots
//!
//! One snapshot maps to a fixed set of measurements:
//! - `vehicle_data`: vehicle state and odometer
//! - `drive_state`: position, heading, speed, power, gear
//! - `charge_state`: battery and charger readings
//! - `climate_state`: cabin and outside temperatures
//!
//! Each point is tagged with both the vehicle id and the VIN. Fields absent or
//! null in the snapshot are left out of the point, never written as zero.

pub mod line_protocol;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::telemetry::TelemetrySnapshot;

pub const MEASUREMENTS: [&str; 4] = ["vehicle_data", "drive_state", "charge_state", "climate_state"];

/// Tag value used when the snapshot carries no VIN
pub const UNKNOWN_VIN: &str = "unknown";

/// Typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A single time-series point destined for the sink
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl MetricPoint {
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Add the field only when a value is present
    pub fn optional_field<V: Into<FieldValue>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    pub fn field_value(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

/// Build the fixed set of points for one vehicle snapshot
pub fn points_from_snapshot(
    vehicle_id: &str,
    snapshot: &TelemetrySnapshot,
    timestamp: DateTime<Utc>,
) -> Vec<MetricPoint> {
    let vin = snapshot.vin.as_deref().unwrap_or(UNKNOWN_VIN);
    let point = |measurement: &str| {
        MetricPoint::new(measurement, timestamp)
            .tag("vehicle", vehicle_id)
            .tag("vin", vin)
    };

    let drive = &snapshot.drive_state;
    let charge = &snapshot.charge_state;
    let climate = &snapshot.climate_state;

    vec![
        point("vehicle_data")
            .optional_field("state", snapshot.state.clone())
            .optional_field("odometer", snapshot.vehicle_state.odometer),
        point("drive_state")
            .optional_field("heading", drive.heading)
            .optional_field("latitude", drive.latitude)
            .optional_field("longitude", drive.longitude)
            .optional_field("speed", drive.speed)
            .optional_field("power", drive.power)
            .optional_field("shift_state", drive.shift_state.clone()),
        point("charge_state")
            .optional_field("battery_level", charge.battery_level)
            .optional_field("battery_range", charge.battery_range)
            .optional_field("est_battery_range", charge.est_battery_range)
            .optional_field("charging_state", charge.charging_state.clone())
            .optional_field("charge_amps", charge.charge_amps)
            .optional_field("charge_rate", charge.charge_rate)
            .optional_field("charge_limit_soc", charge.charge_limit_soc)
            .optional_field("charger_voltage", charge.charger_voltage)
            .optional_field("charger_actual_current", charge.charger_actual_current)
            .optional_field("charger_power", charge.charger_power)
            .optional_field("charger_phases", charge.charger_phases)
            .optional_field("minutes_to_full_charge", charge.minutes_to_full_charge)
            .optional_field("time_to_full_charge", charge.time_to_full_charge),
        point("climate_state")
            .optional_field("inside_temp", climate.inside_temp)
            .optional_field("outside_temp", climate.outside_temp)
            .optional_field("driver_temp_setting", climate.driver_temp_setting)
            .optional_field("passenger_temp_setting", climate.passenger_temp_setting),
    ]
}
