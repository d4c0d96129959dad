//! Prescription dispensing flow.
//!
//! A scanned payload goes through local checks first (shape, validity flag,
//! membership in the pharmacy's list, cached status). Only a prescription that
//! passes all of them reaches the backend, which dispenses and deducts
//! inventory in one transaction.

mod payload;
mod report;

pub use payload::*;
pub use report::*;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::api::{ApiError, ApiResult, PrescriptionApi};
use crate::models::{
    Prescription, PrescriptionCounts, PrescriptionFilter, StockShortfall, StockUpdate,
};

fn dispensed_on(at: &Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "an earlier date".to_string())
}

#[derive(Error, Debug)]
pub enum DispenseError {
    #[error(transparent)]
    MalformedPayload(#[from] PayloadError),

    #[error("Invalid QR code: prescription {id} was already dispensed and its QR code is no longer valid")]
    InvalidQr { id: String },

    #[error("Prescription {id} not found in your pharmacy")]
    NotFound { id: String },

    #[error("Already dispensed on {}. The QR code is no longer valid.", dispensed_on(.dispensed_at))]
    AlreadyDispensed {
        id: String,
        dispensed_at: Option<DateTime<Utc>>,
    },

    #[error("Insufficient stock:\n{}", render_shortfalls(.0))]
    InsufficientStock(Vec<StockShortfall>),

    #[error("Failed to dispense prescription: {0}")]
    Failed(#[source] ApiError),
}

impl DispenseError {
    /// Rejected before any network call.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            DispenseError::MalformedPayload(_)
                | DispenseError::InvalidQr { .. }
                | DispenseError::NotFound { .. }
                | DispenseError::AlreadyDispensed { .. }
        )
    }
}

pub type DispenseResult<T> = Result<T, DispenseError>;

/// Key sent with every dispense of the same prescription.
pub fn idempotency_key(prescription_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"dispense:");
    hasher.update(prescription_id.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispenseReceipt {
    pub prescription_id: String,
    pub stock_updates: Vec<StockUpdate>,
    /// Whether the follow-up list refresh succeeded
    pub refreshed: bool,
}

impl DispenseReceipt {
    pub fn summary(&self) -> String {
        render_stock_updates(&self.stock_updates)
    }
}

/// The pharmacy's prescription list plus the dispense action.
pub struct DispenseDesk<B> {
    backend: B,
    prescriptions: Vec<Prescription>,
}

impl<B: PrescriptionApi> DispenseDesk<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            prescriptions: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn prescriptions(&self) -> &[Prescription] {
        &self.prescriptions
    }

    pub fn filtered(&self, filter: PrescriptionFilter) -> Vec<&Prescription> {
        filter.apply(&self.prescriptions)
    }

    pub fn counts(&self) -> PrescriptionCounts {
        PrescriptionCounts::of(&self.prescriptions)
    }

    /// Re-fetch the visible list. Returns its new length.
    pub async fn refresh(&mut self) -> ApiResult<usize> {
        self.prescriptions = self.backend.list_prescriptions().await?;
        tracing::debug!(count = self.prescriptions.len(), "prescriptions loaded");
        Ok(self.prescriptions.len())
    }

    /// Handle one decoded QR payload.
    pub async fn handle_scan(&mut self, text: &str) -> DispenseResult<DispenseReceipt> {
        let payload = decode_payload(text).map_err(|e| {
            tracing::warn!(error = %e, "rejected QR payload");
            e
        })?;

        if payload.is_marked_invalid() {
            tracing::warn!(prescription = %payload.id, "QR marked invalid");
            return Err(DispenseError::InvalidQr { id: payload.id });
        }

        self.dispense_by_id(&payload.id).await
    }

    /// Manual-entry path: same checks minus payload decoding.
    pub async fn dispense_by_id(&mut self, id: &str) -> DispenseResult<DispenseReceipt> {
        let Some(prescription) = self.prescriptions.iter().find(|p| p.id == id) else {
            tracing::warn!(prescription = id, "not in pharmacy list");
            return Err(DispenseError::NotFound { id: id.to_string() });
        };

        if prescription.is_dispensed() {
            return Err(DispenseError::AlreadyDispensed {
                id: id.to_string(),
                dispensed_at: prescription.dispensed_at,
            });
        }

        let key = idempotency_key(id);
        let stock_updates = match self.backend.dispense(id, &key).await {
            Ok(updates) => updates,
            Err(err) => {
                return Err(match err.insufficient_stock() {
                    Some(items) => {
                        tracing::warn!(prescription = id, short = items.len(), "insufficient stock");
                        DispenseError::InsufficientStock(items)
                    }
                    None => DispenseError::Failed(err),
                });
            }
        };

        if let Some(p) = self.prescriptions.iter_mut().find(|p| p.id == id) {
            if let Err(e) = p.mark_dispensed(Utc::now(), None) {
                tracing::debug!(prescription = id, error = %e, "cached status not updated");
            }
        }

        let refreshed = match self.refresh().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "refresh after dispense failed");
                false
            }
        };

        Ok(DispenseReceipt {
            prescription_id: id.to_string(),
            stock_updates,
            refreshed,
        })
    }
}
