//! Per-collection search normalizers.
//!
//! Each [`SearchSource`] names a collection, the text columns the query
//! runs against, and a pure function turning one row into a [`SearchHit`].

use serde_json::Value;

use crate::constants::collections;
use crate::models::text::excerpt;
use crate::models::{Comment, EntityType, Post, Profile, SearchHit, SystemNotice, Tag};

/// Row -> hit. The second argument is the excerpt length in chars.
pub type HitNormalizer = fn(&Value, usize) -> Option<SearchHit>;

#[derive(Debug, Clone)]
pub struct SearchSource {
    pub collection: String,
    /// Columns every query term is matched against
    pub fields: Vec<String>,
    pub normalize: HitNormalizer,
}

impl SearchSource {
    pub fn new(collection: &str, fields: &[&str], normalize: HitNormalizer) -> Self {
        Self {
            collection: collection.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            normalize,
        }
    }
}

/// The platform's searchable collections, in result-grouping order
pub fn default_sources() -> Vec<SearchSource> {
    vec![
        SearchSource::new(collections::POSTS, &["title", "content"], post_hit),
        SearchSource::new(collections::PROFILES, &["username", "full_name"], profile_hit),
        SearchSource::new(collections::TAGS, &["name"], tag_hit),
        SearchSource::new(collections::COMMENTS, &["content"], comment_hit),
        SearchSource::new(collections::NOTICES, &["title", "message"], notice_hit),
    ]
}

pub fn post_hit(record: &Value, excerpt_chars: usize) -> Option<SearchHit> {
    let post = Post::from_value(record)?;
    let subtitle = match &post.author_name {
        Some(author) => format!("by {} · {} min read", author, post.reading_time_mins()),
        None => format!("{} min read", post.reading_time_mins()),
    };
    Some(SearchHit {
        entity_type: EntityType::Post,
        id: post.id,
        display_text: excerpt(&post.title, excerpt_chars),
        subtitle: Some(subtitle),
        created_at: Some(post.created_at),
    })
}

pub fn profile_hit(record: &Value, _excerpt_chars: usize) -> Option<SearchHit> {
    let profile = Profile::from_value(record)?;
    Some(SearchHit {
        entity_type: EntityType::Profile,
        display_text: profile.display_name().to_string(),
        subtitle: Some(format!("@{}", profile.username)),
        id: profile.id,
        created_at: Some(profile.created_at),
    })
}

pub fn tag_hit(record: &Value, _excerpt_chars: usize) -> Option<SearchHit> {
    let tag = Tag::from_value(record)?;
    Some(SearchHit {
        entity_type: EntityType::Tag,
        id: tag.id,
        display_text: format!("#{}", tag.name),
        subtitle: tag.post_count.map(|n| format!("{} posts", n)),
        created_at: Some(tag.created_at),
    })
}

pub fn comment_hit(record: &Value, excerpt_chars: usize) -> Option<SearchHit> {
    let comment = Comment::from_value(record)?;
    let subtitle = match &comment.author_name {
        Some(author) => format!("Comment by {}", author),
        None => "Comment".to_string(),
    };
    Some(SearchHit {
        entity_type: EntityType::Comment,
        id: comment.id,
        display_text: excerpt(&comment.content, excerpt_chars),
        subtitle: Some(subtitle),
        created_at: Some(comment.created_at),
    })
}

pub fn notice_hit(record: &Value, excerpt_chars: usize) -> Option<SearchHit> {
    let notice = SystemNotice::from_value(record)?;
    Some(SearchHit {
        entity_type: EntityType::Notice,
        id: notice.id,
        display_text: notice.title,
        subtitle: Some(excerpt(&notice.message, excerpt_chars)).filter(|s| !s.is_empty()),
        created_at: Some(notice.created_at),
    })
}
