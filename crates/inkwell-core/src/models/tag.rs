use chrono::{DateTime, Utc};
use serde_json::Value;

use super::value_utils::{id_field, str_field, timestamp_field};
use crate::constants::fields;

/// Topic tag from the `tags` collection
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub post_count: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    pub fn from_value(record: &Value) -> Option<Self> {
        Some(Self {
            id: id_field(record, fields::ID)?,
            name: str_field(record, "name")?.to_string(),
            post_count: record.get("post_count").and_then(Value::as_u64),
            created_at: timestamp_field(record, fields::CREATED_AT)?,
        })
    }
}
