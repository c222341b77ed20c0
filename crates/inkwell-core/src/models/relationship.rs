use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::value_utils::{id_field, timestamp_field};
use crate::constants::{collections, fields};

/// Category of actor -> target edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Bookmark,
    Like,
    Follow,
    CommentLike,
}

impl RelationshipKind {
    pub const ALL: [RelationshipKind; 4] = [
        RelationshipKind::Bookmark,
        RelationshipKind::Like,
        RelationshipKind::Follow,
        RelationshipKind::CommentLike,
    ];

    /// Remote collection holding edges of this kind
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Bookmark => collections::BOOKMARKS,
            Self::Like => collections::LIKES,
            Self::Follow => collections::FOLLOWS,
            Self::CommentLike => collections::COMMENT_LIKES,
        }
    }

    /// Column naming the actor in this kind's collection
    pub fn actor_field(&self) -> &'static str {
        match self {
            Self::Follow => "follower_id",
            _ => "user_id",
        }
    }

    /// Column naming the target in this kind's collection
    pub fn target_field(&self) -> &'static str {
        match self {
            Self::Bookmark | Self::Like => "post_id",
            Self::Follow => "following_id",
            Self::CommentLike => "comment_id",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bookmark => "bookmark",
            Self::Like => "like",
            Self::Follow => "follow",
            Self::CommentLike => "comment_like",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An edge such as "actor bookmarked target".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub id: String,
    pub actor_id: String,
    pub target_id: String,
    pub kind: RelationshipKind,
    pub created_at: DateTime<Utc>,
}

impl RelationshipRecord {
    /// Parse a record from the kind's collection.
    /// Returns `None` if the id, actor, target or timestamp is missing.
    pub fn from_value(kind: RelationshipKind, record: &Value) -> Option<Self> {
        Some(Self {
            id: id_field(record, fields::ID)?,
            actor_id: id_field(record, kind.actor_field())?,
            target_id: id_field(record, kind.target_field())?,
            kind,
            created_at: timestamp_field(record, fields::CREATED_AT)?,
        })
    }

    /// Row to insert for a new edge. The store assigns `id` and `created_at`.
    pub fn insert_payload(kind: RelationshipKind, actor_id: &str, target_id: &str) -> Value {
        let mut row = Map::new();
        row.insert(kind.actor_field().to_string(), json!(actor_id));
        row.insert(kind.target_field().to_string(), json!(target_id));
        Value::Object(row)
    }
}
