use std::sync::Arc;

use super::Resource;
use crate::api::{ApiResult, InventoryApi};
use crate::models::{
    Medicine, MedicineDraft, MedicinePage, MedicineQuery, Pharmacy, PharmacyStats,
    StockAdjustment,
};

/// Pharmacist dashboard and inventory screens.
pub struct PharmacyStore<A> {
    api: Arc<A>,
    pub pharmacy: Resource<Pharmacy>,
    pub stats: Resource<PharmacyStats>,
    pub medicines: Resource<MedicinePage>,
    pub low_stock: Resource<Vec<Medicine>>,
    pub expiring: Resource<Vec<Medicine>>,
    /// Last add/update/delete/stock change
    pub mutation: Resource<()>,
    query: MedicineQuery,
}

impl<A: InventoryApi> PharmacyStore<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            pharmacy: Resource::default(),
            stats: Resource::default(),
            medicines: Resource::default(),
            low_stock: Resource::default(),
            expiring: Resource::default(),
            mutation: Resource::default(),
            query: MedicineQuery::default(),
        }
    }

    /// Query used for the medicine list and its re-fetches.
    pub fn query(&self) -> &MedicineQuery {
        &self.query
    }

    pub async fn load_pharmacy(&mut self) -> ApiResult<()> {
        self.pharmacy.dispatch(self.api.my_pharmacy()).await
    }

    pub async fn load_stats(&mut self) -> ApiResult<()> {
        self.stats.dispatch(self.api.pharmacy_stats()).await
    }

    pub async fn search(&mut self, query: MedicineQuery) -> ApiResult<()> {
        self.query = query;
        self.refresh_medicines().await
    }

    pub async fn refresh_medicines(&mut self) -> ApiResult<()> {
        self.medicines.dispatch(self.api.search_medicines(&self.query)).await
    }

    pub async fn load_low_stock(&mut self) -> ApiResult<()> {
        self.low_stock.dispatch(self.api.low_stock()).await
    }

    pub async fn load_expiring(&mut self, days: u32) -> ApiResult<()> {
        self.expiring.dispatch(self.api.expiring(days)).await
    }

    pub async fn add_medicine(&mut self, draft: &MedicineDraft) -> ApiResult<()> {
        let api = self.api.clone();
        self.mutate(async move { api.add_medicine(draft).await.map(|_| ()) })
            .await
    }

    pub async fn update_medicine(&mut self, id: &str, draft: &MedicineDraft) -> ApiResult<()> {
        let api = self.api.clone();
        self.mutate(async move { api.update_medicine(id, draft).await.map(|_| ()) })
            .await
    }

    pub async fn delete_medicine(&mut self, id: &str) -> ApiResult<()> {
        let api = self.api.clone();
        self.mutate(async move { api.delete_medicine(id).await }).await
    }

    pub async fn update_stock(&mut self, updates: &[StockAdjustment]) -> ApiResult<()> {
        let api = self.api.clone();
        self.mutate(async move { api.bulk_update_stock(updates).await.map(|_| ()) })
            .await
    }

    // A failed re-fetch shows up in `medicines`; the mutation itself stands.
    async fn mutate<F>(&mut self, request: F) -> ApiResult<()>
    where
        F: std::future::Future<Output = ApiResult<()>>,
    {
        self.mutation.dispatch(request).await?;
        if let Err(e) = self.refresh_medicines().await {
            tracing::warn!(error = %e, "medicine list re-fetch failed");
        }
        Ok(())
    }
}
