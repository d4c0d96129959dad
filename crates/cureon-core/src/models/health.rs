//! Health readings pushed from watches, imports and manual entry.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Kind of vital sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingType {
    HeartRate,
    BloodPressure,
    Spo2,
    Steps,
    Temperature,
}

impl ReadingType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadingType::HeartRate => "heart_rate",
            ReadingType::BloodPressure => "blood_pressure",
            ReadingType::Spo2 => "spo2",
            ReadingType::Steps => "steps",
            ReadingType::Temperature => "temperature",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "heart_rate" => Some(ReadingType::HeartRate),
            "blood_pressure" => Some(ReadingType::BloodPressure),
            "spo2" => Some(ReadingType::Spo2),
            "steps" => Some(ReadingType::Steps),
            "temperature" => Some(ReadingType::Temperature),
            _ => None,
        }
    }

    /// Plausible bounds for single-valued readings.
    fn bounds(self) -> (f64, f64) {
        match self {
            ReadingType::HeartRate => (20.0, 300.0),
            ReadingType::Spo2 => (0.0, 100.0),
            ReadingType::Steps => (0.0, 1_000_000.0),
            // Fahrenheit
            ReadingType::Temperature => (80.0, 115.0),
            ReadingType::BloodPressure => (20.0, 300.0),
        }
    }
}

/// Reading value; blood pressure is the only paired shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Pressure { systolic: f64, diastolic: f64 },
    Single { single: f64 },
}

/// Device family that produced a reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    AppleWatch,
    Fitbit,
    Garmin,
    SamsungGalaxyWatch,
    MiBand,
    #[default]
    Manual,
    Other,
}

impl From<cureon_gatt::WatchFamily> for DeviceType {
    fn from(family: cureon_gatt::WatchFamily) -> Self {
        use cureon_gatt::WatchFamily;
        match family {
            WatchFamily::AppleWatch => DeviceType::AppleWatch,
            WatchFamily::Fitbit => DeviceType::Fitbit,
            WatchFamily::SamsungGalaxyWatch => DeviceType::SamsungGalaxyWatch,
            WatchFamily::MiBand => DeviceType::MiBand,
            WatchFamily::Other => DeviceType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSource {
    pub device_type: DeviceType,
    #[serde(default)]
    pub device_model: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

impl DeviceSource {
    pub fn new(device_type: DeviceType, model: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            device_type,
            device_model: Some(model.into()),
            device_id: Some(id.into()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadingError {
    #[error("{0} expects a single value")]
    ExpectedSingle(&'static str),

    #[error("blood_pressure expects a systolic/diastolic pair")]
    ExpectedPair,

    #[error("{kind} value {value} outside {min}..={max}")]
    OutOfRange {
        kind: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("systolic {systolic} must exceed diastolic {diastolic}")]
    InvertedPressure { systolic: f64, diastolic: f64 },
}

/// A single timestamped vital sign. Append-only once uploaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReading {
    #[serde(rename = "type")]
    pub reading_type: ReadingType,
    pub value: ReadingValue,
    pub source: DeviceSource,
    pub timestamp: DateTime<Utc>,
}

impl HealthReading {
    /// Build a reading, checking the value shape and range against the type.
    pub fn new(
        reading_type: ReadingType,
        value: ReadingValue,
        source: DeviceSource,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ReadingError> {
        let kind = reading_type.as_str();
        let (min, max) = reading_type.bounds();
        let check = |value: f64| {
            if value.is_finite() && (min..=max).contains(&value) {
                Ok(())
            } else {
                Err(ReadingError::OutOfRange {
                    kind,
                    value,
                    min,
                    max,
                })
            }
        };

        match (reading_type, value) {
            (ReadingType::BloodPressure, ReadingValue::Pressure { systolic, diastolic }) => {
                check(systolic)?;
                check(diastolic)?;
                if systolic <= diastolic {
                    return Err(ReadingError::InvertedPressure {
                        systolic,
                        diastolic,
                    });
                }
            }
            (ReadingType::BloodPressure, ReadingValue::Single { .. }) => {
                return Err(ReadingError::ExpectedPair)
            }
            (_, ReadingValue::Single { single }) => check(single)?,
            (_, ReadingValue::Pressure { .. }) => return Err(ReadingError::ExpectedSingle(kind)),
        }

        Ok(Self {
            reading_type,
            value,
            source,
            timestamp,
        })
    }

    pub fn single(
        reading_type: ReadingType,
        value: f64,
        source: DeviceSource,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ReadingError> {
        Self::new(reading_type, ReadingValue::Single { single: value }, source, timestamp)
    }

    pub fn blood_pressure(
        systolic: f64,
        diastolic: f64,
        source: DeviceSource,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ReadingError> {
        Self::new(
            ReadingType::BloodPressure,
            ReadingValue::Pressure {
                systolic,
                diastolic,
            },
            source,
            timestamp,
        )
    }
}

// Stored readings go back through validation on load.
impl<'de> Deserialize<'de> for HealthReading {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Wire {
            #[serde(rename = "type")]
            reading_type: ReadingType,
            value: ReadingValue,
            source: DeviceSource,
            timestamp: DateTime<Utc>,
        }

        let wire = Wire::deserialize(deserializer)?;
        HealthReading::new(wire.reading_type, wire.value, wire.source, wire.timestamp)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Normal,
    Warning,
    Critical,
}

/// Alert raised by the backend for an abnormal reading in a bulk upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthAlert {
    #[serde(default)]
    pub reading_id: Option<String>,
    #[serde(rename = "type")]
    pub reading_type: ReadingType,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
}

// The bulk endpoint sends `null` rather than an empty list.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response of the bulk reading upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkSyncResponse {
    #[serde(default)]
    pub count: usize,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub alerts: Vec<HealthAlert>,
}

impl BulkSyncResponse {
    pub fn critical_alerts(&self) -> impl Iterator<Item = &HealthAlert> {
        self.alerts.iter().filter(|a| a.severity == Severity::Critical)
    }
}

/// How the backend escalated a single abnormal reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// Critical reading; emergency contacts were messaged.
    Sos,
    Notification,
}

/// Alert attached to the answer of a single reading upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingAlert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub sos_triggered: Option<bool>,
    #[serde(default)]
    pub contacts_notified: Option<u32>,
}

/// Stored value as the backend returns it. Fields depend on the type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordedValue {
    pub single: Option<f64>,
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
    /// Sleep duration in minutes
    pub duration: Option<f64>,
    pub quality: Option<String>,
}

/// A reading from the backend history. The backend also stores types this
/// client never records (sleep, ECG), so nothing is range-checked here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedReading {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub reading_type: String,
    #[serde(default)]
    pub value: RecordedValue,
    #[serde(default)]
    pub source: Option<DeviceSource>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_abnormal: bool,
    #[serde(default)]
    pub severity: Severity,
}

impl RecordedReading {
    pub fn known_type(&self) -> Option<ReadingType> {
        ReadingType::from_name(&self.reading_type)
    }
}

/// Filter for `GET /health/readings`. The backend returns 100 rows when `limit` is unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingQuery {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub reading_type: Option<ReadingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatPoint {
    #[serde(default)]
    pub value: RecordedValue,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_abnormal: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeStats {
    pub count: usize,
    pub abnormal_count: usize,
    pub values: Vec<StatPoint>,
}

/// Aggregates over the last N days from `GET /health/readings/stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadingStats {
    pub total_readings: usize,
    pub abnormal_count: usize,
    pub critical_count: usize,
    pub warning_count: usize,
    pub by_type: BTreeMap<String, TypeStats>,
}
