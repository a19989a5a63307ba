//! Reply model: a recursive comment tree under a post.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Author, Post, Record, VoteTally};

/// Deepest level at which the UI still offers a reply action.
pub const MAX_REPLY_DEPTH: usize = 6;

/// A reply with its nested children.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub content: String,
    pub author: Author,
    #[serde(flatten)]
    pub votes: VoteTally,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

impl Record for Reply {
    fn record_id(&self) -> &str {
        &self.id
    }
}

/// A post together with its reply tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostThread {
    pub post: Post,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

impl PostThread {
    /// Total number of replies at every depth.
    pub fn reply_total(&self) -> usize {
        count_replies(&self.replies)
    }
}

/// Whether a reply at `depth` (0 = top level) may receive children.
pub fn can_reply_at(depth: usize) -> bool {
    depth + 1 < MAX_REPLY_DEPTH
}

/// Depth-first search for a reply by id.
pub fn find_reply<'a>(replies: &'a [Reply], id: &str) -> Option<&'a Reply> {
    for reply in replies {
        if reply.id == id {
            return Some(reply);
        }
        if let Some(found) = find_reply(&reply.replies, id) {
            return Some(found);
        }
    }
    None
}

/// Mutable depth-first search for a reply by id.
pub fn find_reply_mut<'a>(replies: &'a mut [Reply], id: &str) -> Option<&'a mut Reply> {
    for reply in replies.iter_mut() {
        if reply.id == id {
            return Some(reply);
        }
        if let Some(found) = find_reply_mut(&mut reply.replies, id) {
            return Some(found);
        }
    }
    None
}

/// Count replies at every depth using an explicit stack.
pub fn count_replies(replies: &[Reply]) -> usize {
    let mut stack: Vec<&Reply> = replies.iter().collect();
    let mut total = 0;
    while let Some(reply) = stack.pop() {
        total += 1;
        stack.extend(reply.replies.iter());
    }
    total
}
