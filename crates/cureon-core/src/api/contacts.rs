use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;

use super::{ApiClient, ApiError, ApiResult};
use crate::models::{EmergencyContact, EmergencyContactForm, FamilyMember, FamilyMemberForm};

/// Emergency contacts of the signed-in patient. Every call answers with the
/// full updated list.
#[async_trait]
pub trait EmergencyContactApi: Send + Sync {
    async fn emergency_contacts(&self) -> ApiResult<Vec<EmergencyContact>>;
    async fn add_emergency_contact(
        &self,
        form: &EmergencyContactForm,
    ) -> ApiResult<Vec<EmergencyContact>>;
    async fn update_emergency_contact(
        &self,
        id: &str,
        form: &EmergencyContactForm,
    ) -> ApiResult<Vec<EmergencyContact>>;
    async fn remove_emergency_contact(&self, id: &str) -> ApiResult<Vec<EmergencyContact>>;
}

/// Family members of the signed-in patient, same list-returning shape.
#[async_trait]
pub trait FamilyApi: Send + Sync {
    async fn family_members(&self) -> ApiResult<Vec<FamilyMember>>;
    async fn add_family_member(&self, form: &FamilyMemberForm) -> ApiResult<Vec<FamilyMember>>;
    async fn update_family_member(
        &self,
        id: &str,
        form: &FamilyMemberForm,
    ) -> ApiResult<Vec<FamilyMember>>;
    async fn remove_family_member(&self, id: &str) -> ApiResult<Vec<FamilyMember>>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContactList {
    #[serde(default)]
    emergency_contacts: Vec<EmergencyContact>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FamilyList {
    #[serde(default)]
    family_members: Vec<FamilyMember>,
}

#[async_trait]
impl EmergencyContactApi for ApiClient {
    async fn emergency_contacts(&self) -> ApiResult<Vec<EmergencyContact>> {
        let list: ContactList = self
            .send(self.request(Method::GET, "emergency-contacts"), "load emergency contacts")
            .await?;
        Ok(list.emergency_contacts)
    }

    async fn add_emergency_contact(
        &self,
        form: &EmergencyContactForm,
    ) -> ApiResult<Vec<EmergencyContact>> {
        form.validate().map_err(|e| ApiError::Validation(e.to_string()))?;
        let list: ContactList = self
            .send(
                self.request(Method::POST, "emergency-contacts").json(form),
                "add emergency contact",
            )
            .await?;
        tracing::info!(contacts = list.emergency_contacts.len(), "emergency contact added");
        Ok(list.emergency_contacts)
    }

    async fn update_emergency_contact(
        &self,
        id: &str,
        form: &EmergencyContactForm,
    ) -> ApiResult<Vec<EmergencyContact>> {
        form.validate().map_err(|e| ApiError::Validation(e.to_string()))?;
        let list: ContactList = self
            .send(
                self.request(Method::PUT, &format!("emergency-contacts/{}", id)).json(form),
                "update emergency contact",
            )
            .await?;
        Ok(list.emergency_contacts)
    }

    async fn remove_emergency_contact(&self, id: &str) -> ApiResult<Vec<EmergencyContact>> {
        let list: ContactList = self
            .send(
                self.request(Method::DELETE, &format!("emergency-contacts/{}", id)),
                "remove emergency contact",
            )
            .await?;
        Ok(list.emergency_contacts)
    }
}

#[async_trait]
impl FamilyApi for ApiClient {
    async fn family_members(&self) -> ApiResult<Vec<FamilyMember>> {
        let list: FamilyList = self
            .send(self.request(Method::GET, "family-members"), "load family members")
            .await?;
        Ok(list.family_members)
    }

    async fn add_family_member(&self, form: &FamilyMemberForm) -> ApiResult<Vec<FamilyMember>> {
        form.validate().map_err(|e| ApiError::Validation(e.to_string()))?;
        let list: FamilyList = self
            .send(
                self.request(Method::POST, "family-members").json(form),
                "add family member",
            )
            .await?;
        Ok(list.family_members)
    }

    async fn update_family_member(
        &self,
        id: &str,
        form: &FamilyMemberForm,
    ) -> ApiResult<Vec<FamilyMember>> {
        form.validate().map_err(|e| ApiError::Validation(e.to_string()))?;
        let list: FamilyList = self
            .send(
                self.request(Method::PUT, &format!("family-members/{}", id)).json(form),
                "update family member",
            )
            .await?;
        Ok(list.family_members)
    }

    async fn remove_family_member(&self, id: &str) -> ApiResult<Vec<FamilyMember>> {
        let list: FamilyList = self
            .send(
                self.request(Method::DELETE, &format!("family-members/{}", id)),
                "remove family member",
            )
            .await?;
        Ok(list.family_members)
    }
}
