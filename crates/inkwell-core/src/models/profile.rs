use chrono::{DateTime, Utc};
use serde_json::Value;

use super::value_utils::{id_field, str_field, timestamp_field};
use crate::constants::fields;

/// Member profile from the `profiles` collection
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn from_value(record: &Value) -> Option<Self> {
        Some(Self {
            id: id_field(record, fields::ID)?,
            username: str_field(record, "username")?.to_string(),
            full_name: str_field(record, "full_name")
                .filter(|n| !n.trim().is_empty())
                .map(str::to_string),
            bio: str_field(record, "bio").map(str::to_string),
            created_at: timestamp_field(record, fields::CREATED_AT)?,
        })
    }

    /// Full name when set, otherwise the username
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.username)
    }
}
