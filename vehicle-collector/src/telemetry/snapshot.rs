//! Typed vehicle telemetry snapshot (matches the `vehicle_data` response body)
//!
//! Every group field is optional: sleeping or partially-online vehicles return
//! nulls, and older firmware omits fields entirely. Missing groups deserialize
//! as empty groups so point construction never has to special-case them.

use serde::Deserialize;

/// Point-in-time telemetry for one vehicle
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetrySnapshot {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default)]
    pub drive_state: DriveState,
    #[serde(default)]
    pub charge_state: ChargeState,
    #[serde(default)]
    pub climate_state: ClimateState,
    #[serde(default)]
    pub vehicle_state: VehicleState,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DriveState {
    pub heading: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Null while parked
    pub speed: Option<i64>,
    pub power: Option<i64>,
    /// Null while parked ("P", "D", "R", "N" otherwise)
    pub shift_state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChargeState {
    /// Battery SOC in percent
    pub battery_level: Option<i64>,
    /// EPA-rated range in miles
    pub battery_range: Option<f64>,
    /// Estimated range in miles
    pub est_battery_range: Option<f64>,
    pub charging_state: Option<String>,
    /// Configured charge current in amps
    pub charge_amps: Option<i64>,
    /// Charge rate in mph
    pub charge_rate: Option<f64>,
    pub charge_limit_soc: Option<i64>,
    pub charger_voltage: Option<i64>,
    pub charger_actual_current: Option<i64>,
    /// Charger power in kilowatts
    pub charger_power: Option<i64>,
    /// Null when not plugged in
    pub charger_phases: Option<i64>,
    pub minutes_to_full_charge: Option<i64>,
    /// Hours to reach the requested SOC
    pub time_to_full_charge: Option<f64>,
}

/// Temperatures in degrees Celsius
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClimateState {
    pub inside_temp: Option<f64>,
    pub outside_temp: Option<f64>,
    pub driver_temp_setting: Option<f64>,
    pub passenger_temp_setting: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VehicleState {
    /// Odometer reading in miles
    pub odometer: Option<f64>,
}
