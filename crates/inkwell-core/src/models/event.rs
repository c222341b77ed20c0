use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::collections;

/// Source kind of a feed [`Event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NewPost,
    NewComment,
    NewLike,
    NewFollow,
    NewMember,
    SystemNotice,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewPost => "new_post",
            Self::NewComment => "new_comment",
            Self::NewLike => "new_like",
            Self::NewFollow => "new_follow",
            Self::NewMember => "new_member",
            Self::SystemNotice => "system_notice",
        }
    }

    /// Collection whose `read` column backs this kind's read flag.
    ///
    /// Only system notices have one. Read state for every other kind lives
    /// in the session and is lost when the session ends.
    pub fn persisted_read_collection(&self) -> Option<&'static str> {
        match self {
            Self::SystemNotice => Some(collections::NOTICES),
            _ => None,
        }
    }
}

/// Who caused an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSummary {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

/// Normalized feed entry built from one heterogeneous source record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Feed-unique id: `<kind>:<source_id>`
    pub id: String,
    pub kind: EventKind,
    /// Id of the record this event was built from
    pub source_id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub message: String,
    pub actor: ActorSummary,
    pub read: bool,
    pub metadata: Map<String, Value>,
}

impl Event {
    pub fn new(kind: EventKind, source_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let source_id = source_id.into();
        Self {
            id: format!("{}:{}", kind.as_str(), source_id),
            kind,
            source_id,
            created_at,
            title: String::new(),
            message: String::new(),
            actor: ActorSummary::default(),
            read: false,
            metadata: Map::new(),
        }
    }

    /// Feed order: newest first, ties broken by ascending id.
    pub fn feed_order(a: &Event, b: &Event) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    }
}
