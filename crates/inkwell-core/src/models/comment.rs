use chrono::{DateTime, Utc};
use serde_json::Value;

use super::value_utils::{id_field, nested_str, str_field, timestamp_field};
use crate::constants::fields;

/// Comment on a post, from the `comments` collection
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn from_value(record: &Value) -> Option<Self> {
        Some(Self {
            id: id_field(record, fields::ID)?,
            post_id: id_field(record, "post_id")?,
            author_id: id_field(record, "author_id")?,
            author_name: nested_str(record, "author", "username").map(str::to_string),
            content: str_field(record, "content").unwrap_or_default().to_string(),
            created_at: timestamp_field(record, fields::CREATED_AT)?,
        })
    }
}
