use serde::{Deserialize, Serialize};

/// Authenticated session: bearer token plus the user record returned at login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    /// Opaque to the client core
    #[serde(default)]
    pub user: serde_json::Value,
}

impl Session {
    pub fn new(token: impl Into<String>, user: serde_json::Value) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }

    /// Role string from the user blob, if present.
    pub fn role(&self) -> Option<&str> {
        self.user.get("role").and_then(|r| r.as_str())
    }
}
