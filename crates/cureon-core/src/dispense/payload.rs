//! Prescription QR payload: decoding scanned text and generating codes.

use chrono::{DateTime, Utc};
use qrcode::render::svg;
use qrcode::QrCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{PharmacyStatus, Prescription};

const ACTIVE_COLOR: &str = "#2563eb";
const DISPENSED_COLOR: &str = "#dc2626";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("QR code is not valid JSON: {0}")]
    NotJson(String),

    #[error("QR code does not contain a prescription")]
    NotAnObject,

    #[error("QR code has no prescription id")]
    MissingId,

    #[error("QR code has unexpected fields: {0}")]
    Invalid(String),

    #[error("Cannot encode QR code: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrMedication {
    pub name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
}

/// What a prescription QR code carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionQr {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub medications: Vec<QrMedication>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PharmacyStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispensed_at: Option<DateTime<Utc>>,
    /// False once the prescription was dispensed; absent on older codes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_url: Option<String>,
}

/// Decode scanned text into a prescription payload.
pub fn decode_payload(text: &str) -> Result<PrescriptionQr, PayloadError> {
    let value: serde_json::Value =
        serde_json::from_str(text.trim()).map_err(|e| PayloadError::NotJson(e.to_string()))?;

    let object = value.as_object().ok_or(PayloadError::NotAnObject)?;
    match object.get("id") {
        Some(serde_json::Value::String(id)) if !id.trim().is_empty() => {}
        Some(serde_json::Value::String(_)) | Some(serde_json::Value::Null) | None => {
            return Err(PayloadError::MissingId)
        }
        Some(other) => {
            return Err(PayloadError::Invalid(format!("id must be a string, got {}", other)))
        }
    }

    let mut payload: PrescriptionQr =
        serde_json::from_value(value).map_err(|e| PayloadError::Invalid(e.to_string()))?;
    payload.id = payload.id.trim().to_string();
    Ok(payload)
}

impl PrescriptionQr {
    /// Payload the patient app encodes for `prescription`.
    pub fn for_prescription(prescription: &Prescription, origin: &str) -> Self {
        Self {
            id: prescription.id.clone(),
            number: prescription.prescription_number.clone(),
            patient: prescription.patient.name.clone(),
            doctor: prescription.doctor.name.clone(),
            date: Some(prescription.created_at.format("%Y-%m-%d").to_string()),
            diagnosis: Some(prescription.diagnosis.clone()).filter(|d| !d.is_empty()),
            medications: prescription
                .medications
                .iter()
                .map(|m| QrMedication {
                    name: m.name.clone(),
                    dosage: Some(m.dosage.clone()),
                    frequency: Some(m.frequency.clone()),
                    duration: m.duration.clone(),
                })
                .collect(),
            status: Some(prescription.pharmacy_status),
            dispensed_at: prescription.dispensed_at,
            is_valid: Some(!prescription.is_dispensed()),
            verify_url: Some(format!(
                "{}/verify-prescription/{}",
                origin.trim_end_matches('/'),
                prescription.id
            )),
        }
    }

    /// Explicitly marked invalid by the generator.
    pub fn is_marked_invalid(&self) -> bool {
        self.is_valid == Some(false)
    }

    pub fn to_json(&self) -> Result<String, PayloadError> {
        serde_json::to_string(self).map_err(|e| PayloadError::Encode(e.to_string()))
    }

    /// SVG QR code, red once dispensed and blue while valid.
    pub fn render_svg(&self) -> Result<String, PayloadError> {
        let json = self.to_json()?;
        let code = QrCode::new(json.as_bytes()).map_err(|e| PayloadError::Encode(e.to_string()))?;
        let dark = if self.is_marked_invalid() {
            DISPENSED_COLOR
        } else {
            ACTIVE_COLOR
        };
        Ok(code
            .render::<svg::Color>()
            .min_dimensions(256, 256)
            .dark_color(svg::Color(dark))
            .light_color(svg::Color("#ffffff"))
            .build())
    }
}
