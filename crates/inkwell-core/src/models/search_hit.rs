use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Post,
    Comment,
    Profile,
    Tag,
    Notice,
}

/// One search result, normalized from a source collection row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub entity_type: EntityType,
    pub id: String,
    pub display_text: String,
    pub subtitle: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
