use chrono::{DateTime, Utc};
use serde_json::Value;

use super::text::reading_time_mins;
use super::value_utils::{id_field, nested_str, str_field, timestamp_field};
use crate::constants::fields;

/// Blog post from the `posts` collection
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    /// Display name from the embedded `author` profile, when the query joined it
    pub author_name: Option<String>,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn from_value(record: &Value) -> Option<Self> {
        let author_name = nested_str(record, "author", "full_name")
            .or_else(|| nested_str(record, "author", "username"))
            .map(str::to_string);

        Some(Self {
            id: id_field(record, fields::ID)?,
            author_id: id_field(record, "author_id")?,
            author_name,
            title: str_field(record, "title")
                .filter(|t| !t.trim().is_empty())
                .unwrap_or("Untitled")
                .to_string(),
            content: str_field(record, "content").unwrap_or_default().to_string(),
            created_at: timestamp_field(record, fields::CREATED_AT)?,
        })
    }

    pub fn reading_time_mins(&self) -> u32 {
        reading_time_mins(&self.content)
    }
}
