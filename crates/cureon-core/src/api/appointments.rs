use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{ApiClient, ApiError, ApiResult};
use crate::models::{Appointment, AppointmentStatus, AvailableSlots, NewAppointment};

#[async_trait]
pub trait AppointmentApi: Send + Sync {
    async fn book(&self, form: &NewAppointment) -> ApiResult<Appointment>;
    async fn my_appointments(&self) -> ApiResult<Vec<Appointment>>;
    /// Free slots for `doctor_id` on `day` (YYYY-MM-DD).
    async fn available_slots(&self, doctor_id: &str, day: &str) -> ApiResult<Vec<String>>;
    /// Request a status transition; the backend decides.
    async fn update_status(&self, id: &str, status: AppointmentStatus) -> ApiResult<Appointment>;
}

#[derive(Deserialize)]
struct AppointmentEnvelope {
    appointment: Appointment,
}

#[derive(Deserialize)]
struct AppointmentList {
    #[serde(default)]
    appointments: Vec<Appointment>,
}

#[derive(Serialize)]
struct StatusBody {
    status: AppointmentStatus,
}

#[async_trait]
impl AppointmentApi for ApiClient {
    async fn book(&self, form: &NewAppointment) -> ApiResult<Appointment> {
        form.validate().map_err(|e| ApiError::Validation(e.to_string()))?;

        let env: AppointmentEnvelope = self
            .send(
                self.request(Method::POST, "appointment/new").json(form),
                "book appointment",
            )
            .await?;
        tracing::info!(appointment = %env.appointment.id, day = %form.day, time = %form.time, "appointment booked");
        Ok(env.appointment)
    }

    async fn my_appointments(&self) -> ApiResult<Vec<Appointment>> {
        let list: AppointmentList = self
            .send(self.request(Method::GET, "appointment/my"), "load appointments")
            .await?;
        Ok(list.appointments)
    }

    async fn available_slots(&self, doctor_id: &str, day: &str) -> ApiResult<Vec<String>> {
        let slots: AvailableSlots = self
            .send(
                self.request(Method::GET, &format!("appointment/slots/{}/{}", doctor_id, day)),
                "load available slots",
            )
            .await?;
        Ok(slots.available_slots)
    }

    async fn update_status(&self, id: &str, status: AppointmentStatus) -> ApiResult<Appointment> {
        let env: AppointmentEnvelope = self
            .send(
                self.request(Method::PUT, &format!("appointment/{}/status", id))
                    .json(&StatusBody { status }),
                "update appointment status",
            )
            .await?;
        Ok(env.appointment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    #[tokio::test]
    async fn test_invalid_booking_never_sent() {
        // Nothing listens on this port
        let config = ClientConfig {
            api_base_url: "http://127.0.0.1:9".into(),
            ..ClientConfig::default()
        };
        let client = ApiClient::new(&config).unwrap();
        let form = NewAppointment {
            doctor: "d1".into(),
            day: "2024-13-40".into(),
            time: "10:00".into(),
            description: String::new(),
            symptoms: Some("fever".into()),
            symptoms_audio: None,
        };

        let err = client.book(&form).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(err.status(), None);
    }
}
