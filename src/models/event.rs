//! Realtime vote event pushed outside the request/response cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::VoteType;

/// Added/removed voter ids for each direction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoterDiff {
    #[serde(default)]
    pub upvoters_added: Vec<String>,
    #[serde(default)]
    pub upvoters_removed: Vec<String>,
    #[serde(default)]
    pub downvoters_added: Vec<String>,
    #[serde(default)]
    pub downvoters_removed: Vec<String>,
}

/// Authoritative vote counts for a post after some user voted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteEvent {
    pub post_id: String,
    /// User whose action produced the event
    #[serde(alias = "actingUserId")]
    pub user_id: String,
    /// The acting user's new vote, `None` when the vote was withdrawn
    #[serde(default)]
    pub vote_type: Option<VoteType>,
    pub upvotes: u32,
    pub downvotes: u32,
    /// Viewer vote, sent when the actor is the receiving viewer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_vote: Option<VoteType>,
    /// Full upvoter snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upvoted_by: Option<Vec<String>>,
    /// Full downvoter snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downvoted_by: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_diff: Option<VoterDiff>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_points: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_level: Option<String>,
}

impl VoteEvent {
    /// Event carrying only the required fields.
    pub fn counts(
        post_id: impl Into<String>,
        user_id: impl Into<String>,
        upvotes: u32,
        downvotes: u32,
    ) -> Self {
        Self {
            post_id: post_id.into(),
            user_id: user_id.into(),
            vote_type: None,
            upvotes,
            downvotes,
            user_vote: None,
            upvoted_by: None,
            downvoted_by: None,
            voter_diff: None,
            emitted_at: None,
            author_points: None,
            author_level: None,
        }
    }
}
