//! Post model matching the discussion feed payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Record;

/// Direction of a vote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Upvote => "upvote",
            VoteType::Downvote => "downvote",
        }
    }
}

/// Vote counters plus the viewer's own vote.
///
/// `user_vote` only ever reflects the authenticated viewer; `None` means the
/// viewer has not voted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoteTally {
    #[serde(default)]
    pub upvotes: u32,
    #[serde(default)]
    pub downvotes: u32,
    #[serde(default)]
    pub user_vote: Option<VoteType>,
    /// Ids of users known to have upvoted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upvoted_by: Vec<String>,
    /// Ids of users known to have downvoted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downvoted_by: Vec<String>,
}

impl VoteTally {
    pub fn new(upvotes: u32, downvotes: u32) -> Self {
        Self {
            upvotes,
            downvotes,
            ..Self::default()
        }
    }

    pub fn score(&self) -> i64 {
        i64::from(self.upvotes) - i64::from(self.downvotes)
    }
}

/// Author summary embedded in posts and replies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Reputation level label, e.g. "Expert"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default)]
    pub points: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Tag attached to a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PostTag {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A discussion post as returned by the listing endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub author: Author,
    #[serde(default)]
    pub tags: Vec<PostTag>,
    #[serde(flatten)]
    pub votes: VoteTally,
    #[serde(default)]
    pub reply_count: u32,
    /// Image URLs in display order
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(default)]
    pub is_market_post: bool,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default)]
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    /// Emission time of the newest realtime vote event applied locally
    #[serde(default, skip_serializing)]
    pub last_vote_event_at: Option<DateTime<Utc>>,
}

impl Record for Post {
    fn record_id(&self) -> &str {
        &self.id
    }
}

/// A curated best-practice article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BestPractice {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for BestPractice {
    fn record_id(&self) -> &str {
        &self.id
    }
}
