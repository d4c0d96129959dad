//! Prescription models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::PartyRef;

/// Pharmacy-side fulfilment status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PharmacyStatus {
    #[default]
    Pending,
    Dispensed,
}

/// A single medication line on a prescription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    /// Medicine name as written by the doctor
    pub name: String,
    /// Dosage (e.g., "500mg")
    pub dosage: String,
    /// Frequency (e.g., "twice daily")
    pub frequency: String,
    /// Course duration (e.g., "5 days")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Free-text instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Units to dispense; one pack when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

impl Medication {
    pub fn new(name: impl Into<String>, dosage: impl Into<String>, frequency: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dosage: dosage.into(),
            frequency: frequency.into(),
            duration: None,
            instructions: None,
            quantity: None,
        }
    }

    /// Units this line takes out of inventory.
    pub fn units_required(&self) -> u32 {
        self.quantity.unwrap_or(1)
    }
}

/// A prescription as seen by a pharmacy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    /// Backend document id
    #[serde(rename = "_id")]
    pub id: String,
    /// Human-readable prescription number
    #[serde(default)]
    pub prescription_number: Option<String>,
    pub patient: PartyRef,
    pub doctor: PartyRef,
    #[serde(default)]
    pub appointment: Option<PartyRef>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub pharmacy_status: PharmacyStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub dispensed_at: Option<DateTime<Utc>>,
    /// Pharmacist who dispensed
    #[serde(default)]
    pub dispensed_by: Option<PartyRef>,
}

/// Attempted a second pending→dispensed transition.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Prescription {id} already dispensed")]
pub struct AlreadyDispensed {
    pub id: String,
    pub dispensed_at: Option<DateTime<Utc>>,
}

impl Prescription {
    /// Create a pending prescription.
    pub fn new(id: impl Into<String>, patient: PartyRef, doctor: PartyRef) -> Self {
        Self {
            id: id.into(),
            prescription_number: None,
            patient,
            doctor,
            appointment: None,
            medications: Vec::new(),
            diagnosis: String::new(),
            pharmacy_status: PharmacyStatus::Pending,
            created_at: Utc::now(),
            dispensed_at: None,
            dispensed_by: None,
        }
    }

    pub fn is_dispensed(&self) -> bool {
        self.pharmacy_status == PharmacyStatus::Dispensed
    }

    /// Apply the one-time pending→dispensed transition.
    pub fn mark_dispensed(
        &mut self,
        at: DateTime<Utc>,
        by: Option<PartyRef>,
    ) -> Result<(), AlreadyDispensed> {
        if self.is_dispensed() {
            return Err(AlreadyDispensed {
                id: self.id.clone(),
                dispensed_at: self.dispensed_at,
            });
        }
        self.pharmacy_status = PharmacyStatus::Dispensed;
        self.dispensed_at = Some(at);
        self.dispensed_by = by;
        Ok(())
    }
}

/// Dashboard list filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrescriptionFilter {
    #[default]
    All,
    Pending,
    Dispensed,
}

impl PrescriptionFilter {
    pub fn matches(self, prescription: &Prescription) -> bool {
        match self {
            PrescriptionFilter::All => true,
            PrescriptionFilter::Pending => prescription.pharmacy_status == PharmacyStatus::Pending,
            PrescriptionFilter::Dispensed => prescription.is_dispensed(),
        }
    }

    pub fn apply<'a>(self, prescriptions: &'a [Prescription]) -> Vec<&'a Prescription> {
        prescriptions.iter().filter(|p| self.matches(p)).collect()
    }
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrescriptionCounts {
    pub pending: usize,
    pub dispensed: usize,
    pub total: usize,
}

impl PrescriptionCounts {
    pub fn of(prescriptions: &[Prescription]) -> Self {
        let dispensed = prescriptions.iter().filter(|p| p.is_dispensed()).count();
        Self {
            pending: prescriptions.len() - dispensed,
            dispensed,
            total: prescriptions.len(),
        }
    }
}
