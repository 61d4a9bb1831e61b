//! InfluxDB v2 line protocol encoding
//!
//! `measurement,tag=value field=1i,other="text" 1700000000000`
//!
//! Timestamps are written in milliseconds; the sink requests `precision=ms`.

use super::{FieldValue, MetricPoint};

/// Encode one point; `None` when it has no writable fields
pub fn encode_point(point: &MetricPoint) -> Option<String> {
    let fields: Vec<String> = point
        .fields
        .iter()
        .filter_map(|(key, value)| encode_field(value).map(|v| format!("{}={}", escape_key(key), v)))
        .collect();

    if fields.is_empty() {
        return None;
    }

    let mut line = escape_measurement(&point.measurement);
    for (key, value) in &point.tags {
        // Influx drops empty tag values, skip them up front
        if value.is_empty() {
            continue;
        }
        line.push(',');
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&escape_key(value));
    }

    line.push(' ');
    line.push_str(&fields.join(","));
    line.push(' ');
    line.push_str(&point.timestamp.timestamp_millis().to_string());
    Some(line)
}

/// Encode a batch, one point per line. Returns the body and the number of skipped points.
pub fn encode_batch(points: &[MetricPoint]) -> (String, usize) {
    let mut skipped = 0;
    let lines: Vec<String> = points
        .iter()
        .filter_map(|point| {
            let line = encode_point(point);
            if line.is_none() {
                skipped += 1;
            }
            line
        })
        .collect();

    (lines.join("\n"), skipped)
}

fn encode_field(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Int(v) => Some(format!("{}i", v)),
        FieldValue::Float(v) if v.is_finite() => Some(format!("{}", v)),
        FieldValue::Float(_) => None,
        FieldValue::Str(v) => Some(format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\""))),
        FieldValue::Bool(v) => Some(v.to_string()),
    }
}

fn escape_measurement(name: &str) -> String {
    name.replace(',', "\\,").replace(' ', "\\ ")
}

// tag keys, tag values and field keys share the same rules
fn escape_key(key: &str) -> String {
    key.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(millis: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn test_encode_point() {
        let point = MetricPoint::new("drive_state", at(1_700_000_000_123))
            .tag("vehicle", "1001")
            .tag("vin", "5YJ3")
            .field("speed", 54i64)
            .field("latitude", 52.5)
            .field("shift_state", "D");

        assert_eq!(
            encode_point(&point).unwrap(),
            "drive_state,vehicle=1001,vin=5YJ3 latitude=52.5,shift_state=\"D\",speed=54i 1700000000123"
        );
    }

    #[test]
    fn test_escaping() {
        let point = MetricPoint::new("my measure,x", at(0))
            .tag("name", "Red Car=1")
            .field("note", "say \"hi\" \\o/")
            .field("on", true);

        assert_eq!(
            encode_point(&point).unwrap(),
            "my\\ measure\\,x,name=Red\\ Car\\=1 note=\"say \\\"hi\\\" \\\\o/\",on=true 0"
        );
    }

    #[test]
    fn test_point_without_fields_is_skipped() {
        let empty = MetricPoint::new("climate_state", at(0)).tag("vehicle", "1");
        let nan_only = MetricPoint::new("climate_state", at(0)).field("inside_temp", f64::NAN);
        let ok = MetricPoint::new("vehicle_data", at(5)).field("odometer", 10.0);

        assert!(encode_point(&empty).is_none());
        assert!(encode_point(&nan_only).is_none());

        let (body, skipped) = encode_batch(&[empty, ok, nan_only]);
        assert_eq!(body, "vehicle_data odometer=10 5");
        assert_eq!(skipped, 2);
    }
}
