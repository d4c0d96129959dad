//! Cureon Client Core
//!
//! Device-side logic for the Cureon telemedicine app, shared by the mobile
//! shells through UniFFI.
//!
//! # Architecture
//!
//! ```text
//!   Camera ──frames──► QrScanner ──text──► DispenseDesk ──PUT dispense──┐
//!                                              │                        │
//!                                   local checks (no network)           │
//!                                                                       ▼
//!   Watch ──GATT──► SmartwatchSession ──readings──► outbox ──bulk──► ApiClient ──► REST backend
//!                                                  (SQLite)              │
//!                                                                        │
//!                              Stores (request lifecycle) ◄──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`api`]: authenticated HTTP client and per-area backend traits
//! - [`scanner`]: camera capture loop that decodes QR codes
//! - [`dispense`]: prescription QR payloads and the dispensing flow
//! - [`watch`]: smartwatch sessions, reading import and the upload outbox
//! - [`state`]: request lifecycle reducers and screen stores
//! - [`db`]: SQLite store for the session and the reading outbox
//! - [`models`]: domain types shared with the backend
//! - [`config`], [`logging`], [`cancel`]: ambient setup

pub mod api;
pub mod cancel;
pub mod config;
pub mod db;
pub mod dispense;
pub mod logging;
pub mod models;
pub mod scanner;
pub mod state;
pub mod watch;

// Re-export commonly used types
pub use api::{ApiClient, ApiError, SessionEvent};
pub use config::ClientConfig;
pub use db::Database;
pub use dispense::{DispenseDesk, DispenseError, PrescriptionQr};
pub use models::{HealthReading, Medicine, Prescription, StockShortfall};
pub use scanner::QrScanner;
pub use watch::{ReadingUploader, SmartwatchSession};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum CureonError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid QR code: {0}")]
    InvalidQr(String),

    #[error("Bad device data: {0}")]
    DeviceData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for CureonError {
    fn from(e: db::DbError) -> Self {
        CureonError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for CureonError {
    fn from(e: serde_json::Error) -> Self {
        CureonError::SerializationError(e.to_string())
    }
}

impl From<dispense::PayloadError> for CureonError {
    fn from(e: dispense::PayloadError) -> Self {
        CureonError::InvalidQr(e.to_string())
    }
}

impl From<cureon_gatt::GattParseError> for CureonError {
    fn from(e: cureon_gatt::GattParseError) -> Self {
        CureonError::DeviceData(e.to_string())
    }
}

impl From<watch::WatchError> for CureonError {
    fn from(e: watch::WatchError) -> Self {
        match e {
            watch::WatchError::Store(e) => e.into(),
            other => CureonError::InvalidInput(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for CureonError {
    fn from(e: config::ConfigError) -> Self {
        CureonError::InvalidInput(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for CureonError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        CureonError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Free Functions (exported to FFI)
// =========================================================================

/// Install the tracing subscriber. Returns false if one was already set.
#[uniffi::export]
pub fn init_logging(filter: Option<String>) -> bool {
    logging::init(filter.as_deref())
}

/// Validate a JSON client config and return it with defaults filled in.
#[uniffi::export]
pub fn normalize_config(json: String) -> Result<String, CureonError> {
    let config = ClientConfig::from_json(&json)?;
    Ok(serde_json::to_string(&config)?)
}

/// Decode scanned QR text into a prescription payload.
#[uniffi::export]
pub fn decode_prescription_qr(text: String) -> Result<FfiPrescriptionQr, CureonError> {
    Ok(dispense::decode_payload(&text)?.into())
}

/// Parse a raw Heart Rate Measurement notification.
#[uniffi::export]
pub fn parse_heart_rate(data: Vec<u8>) -> Result<FfiHeartRate, CureonError> {
    Ok(cureon_gatt::parse_heart_rate_measurement(&data)?.into())
}

/// Render the `insufficientStock` list of a rejected dispense, one line per
/// item.
#[uniffi::export]
pub fn format_insufficient_stock(body_json: String) -> Result<String, CureonError> {
    let body: serde_json::Value = serde_json::from_str(&body_json)?;
    let items: Vec<StockShortfall> = match body.get("insufficientStock") {
        Some(items) => serde_json::from_value(items.clone())?,
        None => {
            return Err(CureonError::InvalidInput(
                "response has no insufficientStock list".into(),
            ))
        }
    };
    Ok(dispense::render_shortfalls(&items))
}

/// Open or create the local store at the given path.
#[uniffi::export]
pub fn open_store(path: String) -> Result<Arc<CureonCore>, CureonError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(CureonCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

/// Create an in-memory store (for testing).
#[uniffi::export]
pub fn open_store_in_memory() -> Result<Arc<CureonCore>, CureonError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(CureonCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe local store for FFI.
#[derive(uniffi::Object)]
pub struct CureonCore {
    db: Arc<Mutex<Database>>,
}

impl CureonCore {
    /// Shared handle for Rust-side consumers such as [`ReadingUploader`].
    pub fn database(&self) -> Arc<Mutex<Database>> {
        self.db.clone()
    }

    fn enqueue(&self, readings: &[HealthReading]) -> Result<u32, CureonError> {
        let mut db = self.db.lock()?;
        let ids = db.enqueue_readings(readings)?;
        Ok(ids.len() as u32)
    }
}

#[uniffi::export]
impl CureonCore {
    // =========================================================================
    // Session
    // =========================================================================

    /// Persist the login token and user record.
    pub fn save_session(&self, token: String, user_json: String) -> Result<(), CureonError> {
        let user: serde_json::Value = serde_json::from_str(&user_json)?;
        let db = self.db.lock()?;
        db.save_session(&models::Session::new(token, user))?;
        Ok(())
    }

    pub fn load_session(&self) -> Result<Option<FfiSession>, CureonError> {
        let db = self.db.lock()?;
        let session = db.load_session()?;
        Ok(session.map(|s| s.into()))
    }

    /// Forget the session. Returns whether one was stored.
    pub fn clear_session(&self) -> Result<bool, CureonError> {
        let db = self.db.lock()?;
        Ok(db.clear_session()?)
    }

    // =========================================================================
    // Health Reading Outbox
    // =========================================================================

    /// Queue readings given as a JSON array in the backend's reading shape.
    pub fn queue_readings_json(&self, json: String) -> Result<u32, CureonError> {
        let readings: Vec<HealthReading> = serde_json::from_str(&json)?;
        self.enqueue(&readings)
    }

    /// Parse a vendor app export and queue its readings.
    pub fn import_watch_export(&self, json: String) -> Result<u32, CureonError> {
        let readings = watch::parse_watch_export(&json)?;
        self.enqueue(&readings)
    }

    /// Validate and queue manually entered values.
    pub fn record_manual_readings(&self, form: FfiManualReadings) -> Result<u32, CureonError> {
        let readings = watch::ManualReadings::from(form).into_readings(Utc::now())?;
        self.enqueue(&readings)
    }

    pub fn pending_reading_count(&self) -> Result<u32, CureonError> {
        let db = self.db.lock()?;
        Ok(db.pending_reading_count()? as u32)
    }

    /// Time of the last successful upload, RFC 3339.
    pub fn last_health_sync(&self) -> Result<Option<String>, CureonError> {
        let db = self.db.lock()?;
        Ok(db.last_health_sync()?.map(|at| at.to_rfc3339()))
    }

    /// Drop uploaded readings older than `days`.
    pub fn prune_uploaded_readings(&self, days: u32) -> Result<u32, CureonError> {
        let db = self.db.lock()?;
        let before = Utc::now() - Duration::days(i64::from(days));
        Ok(db.prune_uploaded_readings(before)? as u32)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe decoded prescription QR.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPrescriptionQr {
    pub id: String,
    pub number: Option<String>,
    pub patient: Option<String>,
    pub doctor: Option<String>,
    pub date: Option<String>,
    pub diagnosis: Option<String>,
    pub medications: Vec<FfiQrMedication>,
    pub status: Option<String>,
    pub dispensed_at: Option<String>,
    /// False when the code was generated after dispensing
    pub is_valid: Option<bool>,
    pub verify_url: Option<String>,
}

impl From<PrescriptionQr> for FfiPrescriptionQr {
    fn from(qr: PrescriptionQr) -> Self {
        Self {
            id: qr.id,
            number: qr.number,
            patient: qr.patient,
            doctor: qr.doctor,
            date: qr.date,
            diagnosis: qr.diagnosis,
            medications: qr.medications.into_iter().map(|m| m.into()).collect(),
            status: qr.status.map(|s| format!("{:?}", s).to_lowercase()),
            dispensed_at: qr.dispensed_at.map(|at| at.to_rfc3339()),
            is_valid: qr.is_valid,
            verify_url: qr.verify_url,
        }
    }
}

/// FFI-safe medication line from a QR payload.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiQrMedication {
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
}

impl From<dispense::QrMedication> for FfiQrMedication {
    fn from(m: dispense::QrMedication) -> Self {
        Self {
            name: m.name,
            dosage: m.dosage,
            frequency: m.frequency,
            duration: m.duration,
        }
    }
}

/// FFI-safe heart rate measurement.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiHeartRate {
    pub bpm: u16,
    pub sensor_contact: Option<bool>,
    pub energy_expended: Option<u16>,
    /// 1/1024 s units
    pub rr_intervals: Vec<u16>,
}

impl From<cureon_gatt::HeartRateMeasurement> for FfiHeartRate {
    fn from(m: cureon_gatt::HeartRateMeasurement) -> Self {
        Self {
            bpm: m.bpm,
            sensor_contact: m.sensor_contact,
            energy_expended: m.energy_expended,
            rr_intervals: m.rr_intervals,
        }
    }
}

/// FFI-safe stored session.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSession {
    pub token: String,
    pub user_json: String,
    pub role: Option<String>,
}

impl From<models::Session> for FfiSession {
    fn from(session: models::Session) -> Self {
        Self {
            role: session.role().map(str::to_string),
            user_json: session.user.to_string(),
            token: session.token,
        }
    }
}

/// FFI-safe manual entry form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiManualReadings {
    pub heart_rate: Option<f64>,
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
    pub spo2: Option<f64>,
    pub steps: Option<f64>,
}

impl From<FfiManualReadings> for watch::ManualReadings {
    fn from(form: FfiManualReadings) -> Self {
        watch::ManualReadings {
            heart_rate: form.heart_rate,
            systolic: form.systolic,
            diastolic: form.diastolic,
            spo2: form.spo2,
            steps: form.steps,
        }
    }
}
