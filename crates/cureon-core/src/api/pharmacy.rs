use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{ApiClient, ApiResult};
use crate::models::{
    Medicine, MedicineDraft, MedicinePage, MedicineQuery, Pharmacy, PharmacyStats,
    StockAdjustment,
};

/// Pharmacy inventory endpoints, pharmacist role only.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    async fn my_pharmacy(&self) -> ApiResult<Pharmacy>;
    async fn pharmacy_stats(&self) -> ApiResult<PharmacyStats>;
    async fn search_medicines(&self, query: &MedicineQuery) -> ApiResult<MedicinePage>;
    async fn add_medicine(&self, draft: &MedicineDraft) -> ApiResult<Medicine>;
    async fn update_medicine(&self, id: &str, draft: &MedicineDraft) -> ApiResult<Medicine>;
    async fn delete_medicine(&self, id: &str) -> ApiResult<()>;
    async fn bulk_update_stock(&self, updates: &[StockAdjustment]) -> ApiResult<Vec<Medicine>>;
    async fn low_stock(&self) -> ApiResult<Vec<Medicine>>;
    async fn expiring(&self, days: u32) -> ApiResult<Vec<Medicine>>;
}

#[derive(Deserialize)]
struct PharmacyEnvelope {
    pharmacy: Pharmacy,
}

#[derive(Deserialize)]
struct StatsEnvelope {
    #[serde(default)]
    stats: PharmacyStats,
}

#[derive(Deserialize)]
struct MedicineEnvelope {
    medicine: Medicine,
}

#[derive(Deserialize)]
struct MedicineList {
    #[serde(default)]
    medicines: Vec<Medicine>,
}

#[derive(Deserialize)]
struct Ack {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkStockBody<'a> {
    stock_updates: &'a [StockAdjustment],
}

#[async_trait]
impl InventoryApi for ApiClient {
    async fn my_pharmacy(&self) -> ApiResult<Pharmacy> {
        let env: PharmacyEnvelope = self
            .send(self.request(Method::GET, "pharmacy/my"), "load pharmacy")
            .await?;
        Ok(env.pharmacy)
    }

    async fn pharmacy_stats(&self) -> ApiResult<PharmacyStats> {
        let env: StatsEnvelope = self
            .send(self.request(Method::GET, "pharmacy/stats"), "load pharmacy stats")
            .await?;
        Ok(env.stats)
    }

    async fn search_medicines(&self, query: &MedicineQuery) -> ApiResult<MedicinePage> {
        self.send(
            self.request(Method::GET, "pharmacy/medicines/search").query(query),
            "search medicines",
        )
        .await
    }

    async fn add_medicine(&self, draft: &MedicineDraft) -> ApiResult<Medicine> {
        let env: MedicineEnvelope = self
            .send(
                self.request(Method::POST, "pharmacy/medicines").json(draft),
                "add medicine",
            )
            .await?;
        tracing::info!(medicine = %env.medicine.name, "medicine added");
        Ok(env.medicine)
    }

    async fn update_medicine(&self, id: &str, draft: &MedicineDraft) -> ApiResult<Medicine> {
        let env: MedicineEnvelope = self
            .send(
                self.request(Method::PUT, &format!("pharmacy/medicine/{}", id)).json(draft),
                "update medicine",
            )
            .await?;
        Ok(env.medicine)
    }

    async fn delete_medicine(&self, id: &str) -> ApiResult<()> {
        let _: Ack = self
            .send(
                self.request(Method::DELETE, &format!("pharmacy/medicine/{}", id)),
                "delete medicine",
            )
            .await?;
        tracing::info!(medicine = id, "medicine deleted");
        Ok(())
    }

    async fn bulk_update_stock(&self, updates: &[StockAdjustment]) -> ApiResult<Vec<Medicine>> {
        let list: MedicineList = self
            .send(
                self.request(Method::PUT, "pharmacy/medicines/bulk-stock-update")
                    .json(&BulkStockBody {
                        stock_updates: updates,
                    }),
                "update stock",
            )
            .await?;
        Ok(list.medicines)
    }

    async fn low_stock(&self) -> ApiResult<Vec<Medicine>> {
        let list: MedicineList = self
            .send(
                self.request(Method::GET, "pharmacy/medicines/low-stock"),
                "load low stock",
            )
            .await?;
        Ok(list.medicines)
    }

    async fn expiring(&self, days: u32) -> ApiResult<Vec<Medicine>> {
        let list: MedicineList = self
            .send(
                self.request(Method::GET, "pharmacy/medicines/expiring")
                    .query(&[("days", days)]),
                "load expiring medicines",
            )
            .await?;
        Ok(list.medicines)
    }
}
