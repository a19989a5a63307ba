//! Invalidation tags provided by cached queries.

use super::{CachedData, Endpoint};
use crate::models::Record;

/// Kind of entity a tag refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Post,
    MyPosts,
    BestPractice,
    Thread,
}

/// A label attached to cache slots; invalidating it marks the slots stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheTag {
    /// Every listing of this kind
    List(TagKind),
    /// One record of this kind
    Item(TagKind, String),
}

impl CacheTag {
    pub fn item(kind: TagKind, id: impl Into<String>) -> Self {
        CacheTag::Item(kind, id.into())
    }
}

/// Tags a slot provides given its endpoint and current data.
pub fn provided_tags(endpoint: Endpoint, data: &CachedData) -> Vec<CacheTag> {
    match (endpoint, data) {
        (Endpoint::Posts, CachedData::Posts(listing)) => {
            let mut tags = vec![CacheTag::List(TagKind::Post)];
            tags.extend(
                listing
                    .items
                    .iter()
                    .map(|p| CacheTag::item(TagKind::Post, p.record_id())),
            );
            tags
        }
        (Endpoint::MyPosts, CachedData::Posts(listing)) => {
            let mut tags = vec![CacheTag::List(TagKind::MyPosts)];
            tags.extend(
                listing
                    .items
                    .iter()
                    .map(|p| CacheTag::item(TagKind::Post, p.record_id())),
            );
            tags
        }
        (Endpoint::BestPractices, _) => vec![CacheTag::List(TagKind::BestPractice)],
        (Endpoint::Thread, CachedData::Thread(thread)) => vec![
            CacheTag::item(TagKind::Thread, thread.post.id.clone()),
            CacheTag::item(TagKind::Post, thread.post.id.clone()),
        ],
        (endpoint, _) => {
            tracing::debug!("No tags for {} with mismatched data", endpoint);
            Vec::new()
        }
    }
}
