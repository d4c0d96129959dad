//! People attached to a patient account: emergency contacts messaged on an
//! SOS, and family members managed from the same profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_AGE: u8 = 150;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    #[error("Name is required")]
    MissingName,

    #[error("Please enter a valid 10-digit phone number")]
    InvalidPhone,

    #[error("Age must be between 0 and 150")]
    InvalidAge,
}

fn valid_phone(phone: &str) -> bool {
    phone.len() == 10 && phone.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactRelationship {
    #[default]
    Spouse,
    Parent,
    Child,
    Sibling,
    Friend,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub relationship: ContactRelationship,
    pub phone: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

/// Add/edit form for an emergency contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContactForm {
    pub name: String,
    pub relationship: ContactRelationship,
    pub phone: String,
    #[serde(default)]
    pub is_primary: bool,
}

impl EmergencyContactForm {
    pub fn validate(&self) -> Result<(), ContactError> {
        if self.name.trim().is_empty() {
            return Err(ContactError::MissingName);
        }
        if !valid_phone(&self.phone) {
            return Err(ContactError::InvalidPhone);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyRelationship {
    #[default]
    Spouse,
    Parent,
    Child,
    Sibling,
    Grandparent,
    Grandchild,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub relationship: FamilyRelationship,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub medical_conditions: Option<String>,
}

/// Add/edit form for a family member. Everything but name and relationship
/// is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMemberForm {
    pub name: String,
    pub relationship: FamilyRelationship,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_conditions: Option<String>,
}

impl FamilyMemberForm {
    pub fn validate(&self) -> Result<(), ContactError> {
        if self.name.trim().is_empty() {
            return Err(ContactError::MissingName);
        }
        if self.age.is_some_and(|age| age > MAX_AGE) {
            return Err(ContactError::InvalidAge);
        }
        match self.phone.as_deref() {
            Some(phone) if !phone.is_empty() && !valid_phone(phone) => {
                Err(ContactError::InvalidPhone)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_validation() {
        let mut form = EmergencyContactForm {
            name: "Ravi".into(),
            relationship: ContactRelationship::Sibling,
            phone: "9876543210".into(),
            is_primary: true,
        };
        assert_eq!(form.validate(), Ok(()));

        form.phone = "+91 98765".into();
        assert_eq!(form.validate(), Err(ContactError::InvalidPhone));

        form.name = "  ".into();
        assert_eq!(form.validate(), Err(ContactError::MissingName));
    }

    #[test]
    fn test_family_member_validation() {
        let mut form = FamilyMemberForm {
            name: "Meena".into(),
            relationship: FamilyRelationship::Grandparent,
            age: Some(78),
            ..FamilyMemberForm::default()
        };
        assert_eq!(form.validate(), Ok(()));

        // Blank phone is allowed, malformed is not
        form.phone = Some(String::new());
        assert_eq!(form.validate(), Ok(()));
        form.phone = Some("12345".into());
        assert_eq!(form.validate(), Err(ContactError::InvalidPhone));

        form.phone = None;
        form.age = Some(151);
        assert_eq!(form.validate(), Err(ContactError::InvalidAge));
    }

    #[test]
    fn test_contact_wire_shape() {
        let json = r#"{"_id":"c1","name":"Ravi","relationship":"friend",
            "phone":"9876543210","isPrimary":true,"addedAt":"2024-02-01T10:00:00.000Z"}"#;
        let contact: EmergencyContact = serde_json::from_str(json).unwrap();
        assert!(contact.is_primary);
        assert_eq!(contact.relationship, ContactRelationship::Friend);

        let form = FamilyMemberForm {
            name: "Asha".into(),
            relationship: FamilyRelationship::Child,
            gender: Some(Gender::Female),
            ..FamilyMemberForm::default()
        };
        let value = serde_json::to_value(&form).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"name": "Asha", "relationship": "child", "gender": "female"})
        );
    }
}
