//! Domain models for the Cureon client.

mod appointment;
mod contacts;
mod health;
mod inventory;
mod prescription;
mod session;

pub use appointment::*;
pub use contacts::*;
pub use health::*;
pub use inventory::*;
pub use prescription::*;
pub use session::*;

use serde::{Deserialize, Deserializer, Serialize};

/// Reference to a user record (doctor, patient, pharmacist).
///
/// The backend sends either a bare id or a populated `{ _id, name }` object.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PartyRef {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PartyRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PartyRefWire {
    Id(String),
    Populated {
        #[serde(rename = "_id")]
        id: String,
        #[serde(default)]
        name: Option<String>,
    },
}

impl<'de> Deserialize<'de> for PartyRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match PartyRefWire::deserialize(deserializer)? {
            PartyRefWire::Id(id) => PartyRef { id, name: None },
            PartyRefWire::Populated { id, name } => PartyRef { id, name },
        })
    }
}
