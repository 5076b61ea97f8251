// common/src/models/presence.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity a connection announces on `join`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub contact: Option<String>,
}

impl Identity {
    /// Placeholder identity derived from the connection id
    pub fn anonymous(session_id: Uuid) -> Self {
        Self {
            id: default_user_id(session_id),
            display_name: "Anonymous".to_string(),
            contact: None,
        }
    }

    /// Build an identity from optional join fields, falling back to placeholders.
    /// Empty strings count as absent.
    pub fn from_parts(
        session_id: Uuid,
        id: Option<String>,
        name: Option<String>,
        email: Option<String>,
    ) -> Self {
        let id = non_empty(id).unwrap_or_else(|| default_user_id(session_id));
        let email = non_empty(email);
        let display_name = non_empty(name)
            .or_else(|| email.clone())
            .unwrap_or_else(|| "Anonymous".to_string());

        Self {
            id,
            display_name,
            contact: email,
        }
    }
}

/// First `len` hex characters of a session id
pub fn session_fragment(session_id: Uuid, len: usize) -> String {
    session_id.simple().to_string().chars().take(len).collect()
}

fn default_user_id(session_id: Uuid) -> String {
    format!("u_{}", session_fragment(session_id, 6))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
