use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::Deserialize;

use super::{ApiClient, ApiResult};
use crate::models::{Prescription, StockUpdate};

/// Header carrying the per-prescription dispense key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Result of `GET /prescription/{id}/verify`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrescriptionVerification {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub prescription: Option<Prescription>,
}

#[async_trait]
pub trait PrescriptionApi: Send + Sync {
    /// Prescriptions visible to the current pharmacy.
    async fn list_prescriptions(&self) -> ApiResult<Vec<Prescription>>;

    /// Dispense and deduct inventory in one backend transaction.
    async fn dispense(&self, id: &str, idempotency_key: &str) -> ApiResult<Vec<StockUpdate>>;

    async fn verify(&self, id: &str) -> ApiResult<PrescriptionVerification>;

    /// Printable prescription as PDF bytes.
    async fn pdf(&self, id: &str) -> ApiResult<Vec<u8>>;
}

#[derive(Deserialize)]
struct PrescriptionList {
    #[serde(default)]
    prescriptions: Vec<Prescription>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DispenseResponse {
    #[serde(default)]
    stock_updates: Vec<StockUpdate>,
}

#[async_trait]
impl PrescriptionApi for ApiClient {
    async fn list_prescriptions(&self) -> ApiResult<Vec<Prescription>> {
        let list: PrescriptionList = self
            .send(self.request(Method::GET, "prescriptions"), "load prescriptions")
            .await?;
        Ok(list.prescriptions)
    }

    async fn dispense(&self, id: &str, idempotency_key: &str) -> ApiResult<Vec<StockUpdate>> {
        let request = self
            .request(Method::PUT, &format!("prescription/{}/dispense", id))
            .header(IDEMPOTENCY_HEADER, idempotency_key);
        let resp: DispenseResponse = self.send(request, "dispense prescription").await?;
        tracing::info!(prescription = id, updates = resp.stock_updates.len(), "dispensed");
        Ok(resp.stock_updates)
    }

    async fn verify(&self, id: &str) -> ApiResult<PrescriptionVerification> {
        self.send(
            self.request(Method::GET, &format!("prescription/{}/verify", id)),
            "verify prescription",
        )
        .await
    }

    async fn pdf(&self, id: &str) -> ApiResult<Vec<u8>> {
        let request = self
            .request(Method::GET, &format!("prescription/{}/pdf", id))
            .header(ACCEPT, "application/pdf");
        let bytes = self.send_bytes(request, "download prescription").await?;
        tracing::debug!(prescription = id, size = bytes.len(), "prescription pdf downloaded");
        Ok(bytes)
    }
}
