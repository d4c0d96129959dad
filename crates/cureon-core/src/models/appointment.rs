//! Appointment models and booking-form validation.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::PartyRef;

const MAX_DESCRIPTION_CHARS: usize = 500;
const MAX_SYMPTOMS_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Missed,
}

impl AppointmentStatus {
    /// Terminal states accept no further transition requests.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::Missed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(rename = "_id")]
    pub id: String,
    pub doctor: PartyRef,
    pub patient: PartyRef,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub symptoms: Option<String>,
    /// Uploaded audio URL, when symptoms were recorded instead of typed
    #[serde(default)]
    pub symptoms_audio: Option<String>,
    /// YYYY-MM-DD
    pub day: String,
    /// HH:MM
    pub time: String,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    #[error("{0} is not a valid date format! Use YYYY-MM-DD")]
    InvalidDay(String),

    #[error("{0} is not a valid time format! Use HH:MM")]
    InvalidTime(String),

    #[error("Describe your symptoms or attach a recording")]
    MissingSymptoms,

    #[error("{field} cannot exceed {max} characters")]
    TooLong { field: &'static str, max: usize },
}

/// Booking form sent to `POST /appointment/new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    /// Doctor id
    pub doctor: String,
    pub day: String,
    pub time: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symptoms_audio: Option<String>,
}

impl NewAppointment {
    pub fn validate(&self) -> Result<(), BookingError> {
        let day_ok = self.day.len() == 10 && NaiveDate::parse_from_str(&self.day, "%Y-%m-%d").is_ok();
        if !day_ok {
            return Err(BookingError::InvalidDay(self.day.clone()));
        }
        if NaiveTime::parse_from_str(&self.time, "%H:%M").is_err() {
            return Err(BookingError::InvalidTime(self.time.clone()));
        }

        let has_text = self
            .symptoms
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false);
        let has_audio = self
            .symptoms_audio
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false);
        if !has_text && !has_audio {
            return Err(BookingError::MissingSymptoms);
        }

        if self.description.trim().chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(BookingError::TooLong {
                field: "Description",
                max: MAX_DESCRIPTION_CHARS,
            });
        }
        if self
            .symptoms
            .as_deref()
            .map(|s| s.trim().chars().count() > MAX_SYMPTOMS_CHARS)
            .unwrap_or(false)
        {
            return Err(BookingError::TooLong {
                field: "Symptoms",
                max: MAX_SYMPTOMS_CHARS,
            });
        }
        Ok(())
    }
}

/// Free slots for one doctor on one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlots {
    #[serde(default)]
    pub available_slots: Vec<String>,
}
