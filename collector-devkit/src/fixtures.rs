/*!
Builders for telemetry API payloads

Produce `vehicle_data` bodies shaped like the owner API so tests can tweak
single fields (park the car, unplug the charger) without spelling out the
whole document.
*/

use serde_json::{json, Value};

/// Builder for one vehicle's `vehicle_data` response body
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    body: Value,
}

impl SnapshotBuilder {
    /// A driving, unplugged vehicle with every group populated
    pub fn driving<S: Into<String>>(vehicle_id: S, vin: S) -> Self {
        Self {
            body: json!({
                "id_s": vehicle_id.into(),
                "vin": vin.into(),
                "state": "online",
                "drive_state": {
                    "heading": 270,
                    "latitude": 52.3702,
                    "longitude": 4.8952,
                    "speed": 48,
                    "power": 23,
                    "shift_state": "D"
                },
                "charge_state": {
                    "battery_level": 76,
                    "battery_range": 221.5,
                    "est_battery_range": 187.3,
                    "charging_state": "Disconnected",
                    "charge_amps": 16,
                    "charge_rate": 0.0,
                    "charge_limit_soc": 90,
                    "charger_voltage": 0,
                    "charger_actual_current": 0,
                    "charger_power": 0,
                    "charger_phases": null,
                    "minutes_to_full_charge": 0,
                    "time_to_full_charge": 0.0
                },
                "climate_state": {
                    "inside_temp": 21.5,
                    "outside_temp": 11.0,
                    "driver_temp_setting": 20.5,
                    "passenger_temp_setting": 20.5
                },
                "vehicle_state": {
                    "odometer": 15234.7
                }
            }),
        }
    }

    /// Parked: speed and shift state are null
    pub fn parked(mut self) -> Self {
        self.body["drive_state"]["speed"] = Value::Null;
        self.body["drive_state"]["shift_state"] = Value::Null;
        self.body["drive_state"]["power"] = json!(0);
        self
    }

    /// Plugged in on a three-phase charger
    pub fn charging(mut self, phases: i64) -> Self {
        self.body["charge_state"]["charging_state"] = json!("Charging");
        self.body["charge_state"]["charger_phases"] = json!(phases);
        self.body["charge_state"]["charger_power"] = json!(11);
        self.body["charge_state"]["charger_voltage"] = json!(230);
        self.body["charge_state"]["charger_actual_current"] = json!(16);
        self.body["charge_state"]["minutes_to_full_charge"] = json!(45);
        self
    }

    /// Override any group field, e.g. `set("climate_state", "inside_temp", json!(null))`
    pub fn set(mut self, group: &str, field: &str, value: Value) -> Self {
        self.body[group][field] = value;
        self
    }

    /// Remove a whole group from the payload
    pub fn without_group(mut self, group: &str) -> Self {
        if let Some(obj) = self.body.as_object_mut() {
            obj.remove(group);
        }
        self
    }

    /// Snapshot document (the value of `response`)
    pub fn build(self) -> Value {
        self.body
    }

    /// Full API envelope `{ "response": ... }`
    pub fn envelope(self) -> Value {
        json!({ "response": self.body })
    }
}

/// `api/1/vehicles` body for the given ids
pub fn vehicle_list(ids: &[&str]) -> Value {
    let vehicles: Vec<Value> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            json!({
                "id": i + 1,
                "id_s": id,
                "display_name": format!("Vehicle {}", i + 1),
                "state": "online"
            })
        })
        .collect();

    json!({ "response": vehicles, "count": ids.len() })
}
