//! Per-kind feed normalizers.
//!
//! Each function turns one raw row from its source collection into an
//! [`Event`]. They are pure: no I/O, no clock. Rows missing an id or a
//! timestamp are skipped.

use serde_json::{json, Value};

use crate::constants::collections;
use crate::models::text::excerpt;
use crate::models::value_utils::{nested_str, str_field};
use crate::models::{
    ActorSummary, Comment, Event, EventKind, Post, Profile, RelationshipKind, RelationshipRecord,
    SystemNotice,
};

/// Row -> event. The second argument is the excerpt length in chars.
pub type EventNormalizer = fn(&Value, usize) -> Option<Event>;

#[derive(Debug, Clone)]
pub struct FeedSource {
    pub kind: EventKind,
    pub collection: String,
    pub normalize: EventNormalizer,
}

impl FeedSource {
    pub fn new(kind: EventKind, collection: &str, normalize: EventNormalizer) -> Self {
        Self {
            kind,
            collection: collection.to_string(),
            normalize,
        }
    }
}

/// The platform's activity sources
pub fn default_sources() -> Vec<FeedSource> {
    vec![
        FeedSource::new(EventKind::NewPost, collections::POSTS, post_event),
        FeedSource::new(EventKind::NewComment, collections::COMMENTS, comment_event),
        FeedSource::new(EventKind::NewLike, collections::LIKES, like_event),
        FeedSource::new(EventKind::NewFollow, collections::FOLLOWS, follow_event),
        FeedSource::new(EventKind::NewMember, collections::PROFILES, member_event),
        FeedSource::new(EventKind::SystemNotice, collections::NOTICES, notice_event),
    ]
}

/// Embedded `full_name`, falling back to `username`
fn embedded_name(record: &Value, object: &str) -> Option<String> {
    nested_str(record, object, "full_name")
        .filter(|n| !n.trim().is_empty())
        .or_else(|| nested_str(record, object, "username"))
        .map(str::to_string)
}

pub fn post_event(record: &Value, excerpt_chars: usize) -> Option<Event> {
    let post = Post::from_value(record)?;
    let mut event = Event::new(EventKind::NewPost, post.id.as_str(), post.created_at);
    event.title = post.title.clone();
    event.message = excerpt(&post.content, excerpt_chars);
    event.actor = ActorSummary {
        id: Some(post.author_id.clone()),
        display_name: post.author_name.clone(),
    };
    event
        .metadata
        .insert("reading_time_mins".to_string(), json!(post.reading_time_mins()));
    event.metadata.insert("post_id".to_string(), json!(post.id));
    Some(event)
}

pub fn comment_event(record: &Value, excerpt_chars: usize) -> Option<Event> {
    let comment = Comment::from_value(record)?;
    let mut event = Event::new(EventKind::NewComment, comment.id.as_str(), comment.created_at);
    event.title = match &comment.author_name {
        Some(author) => format!("{} commented", author),
        None => "New comment".to_string(),
    };
    event.message = excerpt(&comment.content, excerpt_chars);
    event.actor = ActorSummary {
        id: Some(comment.author_id),
        display_name: comment.author_name,
    };
    event.metadata.insert("post_id".to_string(), json!(comment.post_id));
    Some(event)
}

pub fn like_event(record: &Value, _excerpt_chars: usize) -> Option<Event> {
    let like = RelationshipRecord::from_value(RelationshipKind::Like, record)?;
    let actor = embedded_name(record, "user");
    let mut event = Event::new(EventKind::NewLike, like.id.as_str(), like.created_at);
    event.title = "New like".to_string();
    event.message = match nested_str(record, "post", "title") {
        Some(title) => format!("{} liked \"{}\"", actor.as_deref().unwrap_or("Someone"), title),
        None => format!("{} liked a post", actor.as_deref().unwrap_or("Someone")),
    };
    event.actor = ActorSummary {
        id: Some(like.actor_id),
        display_name: actor,
    };
    event.metadata.insert("post_id".to_string(), json!(like.target_id));
    Some(event)
}

pub fn follow_event(record: &Value, _excerpt_chars: usize) -> Option<Event> {
    let follow = RelationshipRecord::from_value(RelationshipKind::Follow, record)?;
    let follower = embedded_name(record, "follower");
    let following = embedded_name(record, "following");
    let mut event = Event::new(EventKind::NewFollow, follow.id.as_str(), follow.created_at);
    event.title = "New follower".to_string();
    event.message = format!(
        "{} followed {}",
        follower.as_deref().unwrap_or("Someone"),
        following.as_deref().unwrap_or("a member")
    );
    event.actor = ActorSummary {
        id: Some(follow.actor_id),
        display_name: follower,
    };
    event
        .metadata
        .insert("following_id".to_string(), json!(follow.target_id));
    Some(event)
}

pub fn member_event(record: &Value, excerpt_chars: usize) -> Option<Event> {
    let profile = Profile::from_value(record)?;
    let mut event = Event::new(EventKind::NewMember, profile.id.as_str(), profile.created_at);
    event.title = format!("{} joined", profile.display_name());
    event.message = profile
        .bio
        .as_deref()
        .map(|bio| excerpt(bio, excerpt_chars))
        .unwrap_or_default();
    event.actor = ActorSummary {
        display_name: Some(profile.display_name().to_string()),
        id: Some(profile.id),
    };
    event
        .metadata
        .insert("username".to_string(), json!(profile.username));
    Some(event)
}

/// Notices carry the only persisted read flag.
pub fn notice_event(record: &Value, excerpt_chars: usize) -> Option<Event> {
    let notice = SystemNotice::from_value(record)?;
    let mut event = Event::new(EventKind::SystemNotice, notice.id.as_str(), notice.created_at);
    event.title = notice.title;
    event.message = excerpt(&notice.message, excerpt_chars);
    event.read = notice.read;
    if let Some(level) = str_field(record, "level") {
        event.metadata.insert("level".to_string(), json!(level));
    }
    Some(event)
}
