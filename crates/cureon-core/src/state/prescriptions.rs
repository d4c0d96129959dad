use std::sync::Arc;

use super::Resource;
use crate::api::{ApiResult, PrescriptionApi};
use crate::models::{Prescription, PrescriptionCounts, PrescriptionFilter};

/// Prescription list for doctors and patients.
pub struct PrescriptionStore<A> {
    api: Arc<A>,
    pub prescriptions: Resource<Vec<Prescription>>,
}

impl<A: PrescriptionApi> PrescriptionStore<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            prescriptions: Resource::default(),
        }
    }

    pub async fn load(&mut self) -> ApiResult<()> {
        self.prescriptions.dispatch(self.api.list_prescriptions()).await
    }

    pub fn filtered(&self, filter: PrescriptionFilter) -> Vec<&Prescription> {
        self.prescriptions
            .data()
            .map(|all| filter.apply(all))
            .unwrap_or_default()
    }

    pub fn counts(&self) -> PrescriptionCounts {
        self.prescriptions
            .data()
            .map(|all| PrescriptionCounts::of(all))
            .unwrap_or_default()
    }
}
