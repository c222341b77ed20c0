use chrono::{DateTime, Utc};
use serde_json::Value;

use super::value_utils::{bool_field, id_field, str_field, timestamp_field};
use crate::constants::fields;

/// System notice from the `notices` collection.
///
/// This is the only feed source whose schema carries a persisted `read` column.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemNotice {
    pub id: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl SystemNotice {
    pub fn from_value(record: &Value) -> Option<Self> {
        Some(Self {
            id: id_field(record, fields::ID)?,
            title: str_field(record, "title").unwrap_or("Notice").to_string(),
            message: str_field(record, "message").unwrap_or_default().to_string(),
            read: bool_field(record, fields::READ).unwrap_or(false),
            created_at: timestamp_field(record, fields::CREATED_AT)?,
        })
    }
}
