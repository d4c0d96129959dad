//! Readings that arrive without a live connection: vendor app exports and
//! values typed in by hand.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use super::{WatchError, WatchResult};
use crate::models::{DeviceSource, DeviceType, HealthReading, ReadingType};

const IMPORT_MODEL: &str = "boAt Watch";
const IMPORT_DEVICE_ID: &str = "import";
const MANUAL_MODEL: &str = "boAt Watch (Manual)";
const MANUAL_DEVICE_ID: &str = "manual-entry";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WatchExport {
    #[serde(default)]
    health_data: Vec<ExportEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportEntry {
    #[serde(default)]
    heart_rate: Option<f64>,
    #[serde(default)]
    blood_pressure: Option<ExportPressure>,
    #[serde(default)]
    spo2: Option<f64>,
    #[serde(default)]
    steps: Option<f64>,
    #[serde(default)]
    timestamp: Option<ExportTimestamp>,
}

#[derive(Deserialize)]
struct ExportPressure {
    systolic: f64,
    diastolic: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExportTimestamp {
    Millis(i64),
    Text(DateTime<Utc>),
}

impl ExportTimestamp {
    fn resolve(&self) -> WatchResult<DateTime<Utc>> {
        match self {
            ExportTimestamp::Text(at) => Ok(*at),
            ExportTimestamp::Millis(ms) => Utc
                .timestamp_millis_opt(*ms)
                .single()
                .ok_or_else(|| WatchError::Import(format!("timestamp {} out of range", ms))),
        }
    }
}

// Zero means "not measured" in both the export and the form.
fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

/// Decode a vendor app export. Any malformed or out-of-range entry fails the
/// whole import.
pub fn parse_watch_export(json: &str) -> WatchResult<Vec<HealthReading>> {
    let export: WatchExport =
        serde_json::from_str(json).map_err(|e| WatchError::Import(e.to_string()))?;
    let source = DeviceSource::new(DeviceType::Other, IMPORT_MODEL, IMPORT_DEVICE_ID);
    let now = Utc::now();

    let mut readings = Vec::new();
    for entry in &export.health_data {
        let at = match &entry.timestamp {
            Some(ts) => ts.resolve()?,
            None => now,
        };

        if let Some(bpm) = present(entry.heart_rate) {
            readings.push(HealthReading::single(ReadingType::HeartRate, bpm, source.clone(), at)?);
        }
        if let Some(bp) = &entry.blood_pressure {
            readings.push(HealthReading::blood_pressure(
                bp.systolic,
                bp.diastolic,
                source.clone(),
                at,
            )?);
        }
        if let Some(spo2) = present(entry.spo2) {
            readings.push(HealthReading::single(ReadingType::Spo2, spo2, source.clone(), at)?);
        }
        if let Some(steps) = present(entry.steps) {
            readings.push(HealthReading::single(ReadingType::Steps, steps, source.clone(), at)?);
        }
    }

    if readings.is_empty() {
        return Err(WatchError::Import("No valid health data found in file".into()));
    }
    tracing::info!(count = readings.len(), "watch export parsed");
    Ok(readings)
}

/// Values typed into the manual entry form.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManualReadings {
    pub heart_rate: Option<f64>,
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
    pub spo2: Option<f64>,
    pub steps: Option<f64>,
}

impl ManualReadings {
    /// Validate the filled-in fields into readings stamped `at`. Blood
    /// pressure needs both halves.
    pub fn into_readings(self, at: DateTime<Utc>) -> WatchResult<Vec<HealthReading>> {
        let source = DeviceSource::new(DeviceType::Manual, MANUAL_MODEL, MANUAL_DEVICE_ID);
        let mut readings = Vec::new();

        if let Some(bpm) = present(self.heart_rate) {
            readings.push(HealthReading::single(ReadingType::HeartRate, bpm, source.clone(), at)?);
        }
        match (present(self.systolic), present(self.diastolic)) {
            (Some(sys), Some(dia)) => {
                readings.push(HealthReading::blood_pressure(sys, dia, source.clone(), at)?)
            }
            (None, None) => {}
            _ => {
                return Err(WatchError::Import(
                    "Please enter both systolic and diastolic pressure".into(),
                ))
            }
        }
        if let Some(spo2) = present(self.spo2) {
            readings.push(HealthReading::single(ReadingType::Spo2, spo2, source.clone(), at)?);
        }
        if let Some(steps) = present(self.steps) {
            readings.push(HealthReading::single(ReadingType::Steps, steps, source, at)?);
        }

        if readings.is_empty() {
            return Err(WatchError::Import(
                "Please enter at least one health metric".into(),
            ));
        }
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReadingError, ReadingValue};

    #[test]
    fn test_parse_export() {
        let json = r#"{"healthData":[
            {"heartRate":76,"bloodPressure":{"systolic":118,"diastolic":79},"timestamp":"2024-05-01T08:00:00Z"},
            {"spo2":97,"steps":4200,"timestamp":1714550400000},
            {"heartRate":0}
        ]}"#;
        let readings = parse_watch_export(json).unwrap();
        let types: Vec<_> = readings.iter().map(|r| r.reading_type).collect();
        assert_eq!(
            types,
            vec![
                ReadingType::HeartRate,
                ReadingType::BloodPressure,
                ReadingType::Spo2,
                ReadingType::Steps
            ]
        );
        assert!(readings
            .iter()
            .all(|r| r.source.device_id.as_deref() == Some("import")
                && r.source.device_type == DeviceType::Other));
        assert_eq!(readings[0].timestamp.to_rfc3339(), "2024-05-01T08:00:00+00:00");
        assert_eq!(readings[2].timestamp.timestamp_millis(), 1714550400000);
    }

    #[test]
    fn test_export_rejects_bad_input() {
        assert!(matches!(parse_watch_export("{not json"), Err(WatchError::Import(_))));
        assert!(matches!(parse_watch_export(r#"{"healthData":[]}"#), Err(WatchError::Import(_))));
        assert!(matches!(parse_watch_export("{}"), Err(WatchError::Import(_))));

        // One implausible value fails the whole file
        let json = r#"{"healthData":[{"heartRate":70},{"spo2":140}]}"#;
        assert!(matches!(
            parse_watch_export(json),
            Err(WatchError::Reading(ReadingError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_manual_readings() {
        let form = ManualReadings {
            heart_rate: Some(80.0),
            systolic: Some(130.0),
            diastolic: Some(85.0),
            spo2: Some(98.0),
            steps: None,
        };
        let readings = form.into_readings(Utc::now()).unwrap();
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].source.device_type, DeviceType::Manual);
        assert_eq!(readings[0].source.device_id.as_deref(), Some("manual-entry"));
        assert_eq!(readings[1].reading_type, ReadingType::BloodPressure);
        assert_eq!(readings[2].value, ReadingValue::Single { single: 98.0 });
    }

    #[test]
    fn test_manual_half_pressure_rejected() {
        let systolic_only = ManualReadings {
            heart_rate: Some(80.0),
            systolic: Some(130.0),
            ..ManualReadings::default()
        };
        let err = systolic_only.into_readings(Utc::now()).unwrap_err();
        assert!(matches!(&err, WatchError::Import(m) if m.contains("systolic and diastolic")));

        // A zero counts as not entered
        let form: ManualReadings =
            serde_json::from_str(r#"{"spo2":97,"systolic":0,"diastolic":82}"#).unwrap();
        assert!(matches!(form.into_readings(Utc::now()), Err(WatchError::Import(_))));
    }

    #[test]
    fn test_manual_requires_a_value() {
        assert!(matches!(
            ManualReadings::default().into_readings(Utc::now()),
            Err(WatchError::Import(_))
        ));

        let form: ManualReadings =
            serde_json::from_str(r#"{"systolic":80,"diastolic":120}"#).unwrap();
        assert!(matches!(
            form.into_readings(Utc::now()),
            Err(WatchError::Reading(ReadingError::InvertedPressure { .. }))
        ));
    }
}
