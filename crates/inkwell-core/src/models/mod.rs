pub mod comment;
pub mod event;
pub mod notice;
pub mod post;
pub mod profile;
pub mod relationship;
pub mod search_hit;
pub mod tag;
pub mod text;
pub mod value_utils;

pub use comment::Comment;
pub use event::{ActorSummary, Event, EventKind};
pub use notice::SystemNotice;
pub use post::Post;
pub use profile::Profile;
pub use relationship::{RelationshipKind, RelationshipRecord};
pub use search_hit::{EntityType, SearchHit};
pub use tag::Tag;
