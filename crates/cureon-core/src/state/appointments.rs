use std::sync::Arc;

use super::Resource;
use crate::api::{AppointmentApi, ApiResult};
use crate::models::{Appointment, AppointmentStatus, NewAppointment};

/// Patient and doctor appointment screens.
pub struct AppointmentStore<A> {
    api: Arc<A>,
    pub appointments: Resource<Vec<Appointment>>,
    pub slots: Resource<Vec<String>>,
    /// Last booking or status change
    pub mutation: Resource<Appointment>,
}

impl<A: AppointmentApi> AppointmentStore<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            appointments: Resource::default(),
            slots: Resource::default(),
            mutation: Resource::default(),
        }
    }

    pub async fn load_mine(&mut self) -> ApiResult<()> {
        self.appointments.dispatch(self.api.my_appointments()).await
    }

    pub async fn load_slots(&mut self, doctor_id: &str, day: &str) -> ApiResult<()> {
        self.slots.dispatch(self.api.available_slots(doctor_id, day)).await
    }

    pub async fn book(&mut self, form: &NewAppointment) -> ApiResult<()> {
        self.mutation.dispatch(self.api.book(form)).await?;
        self.refetch().await;
        Ok(())
    }

    pub async fn update_status(&mut self, id: &str, status: AppointmentStatus) -> ApiResult<()> {
        self.mutation
            .dispatch(self.api.update_status(id, status))
            .await?;
        self.refetch().await;
        Ok(())
    }

    async fn refetch(&mut self) {
        if let Err(e) = self.load_mine().await {
            tracing::warn!(error = %e, "appointment list re-fetch failed");
        }
    }
}
