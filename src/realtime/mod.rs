//! Realtime vote reconciliation.
//!
//! Vote events pushed by the server carry authoritative counts. They are
//! merged into every cached copy of the post without a refetch. Events older
//! than the last one applied to a record are discarded.

mod channel;

pub use channel::*;

use serde::Deserialize;

use crate::cache::{Endpoint, QueryCache};
use crate::errors::ClientError;
use crate::models::{Post, VoteEvent};

/// Endpoints whose slots may contain the post of a vote event.
const RECONCILED_ENDPOINTS: [Endpoint; 3] = [Endpoint::Posts, Endpoint::MyPosts, Endpoint::Thread];

/// Merge `event` into one cached post. Returns `false` for a stale event.
pub fn apply_vote_event(post: &mut Post, event: &VoteEvent, viewer_id: Option<&str>) -> bool {
    if let (Some(seen), Some(emitted)) = (post.last_vote_event_at, event.emitted_at) {
        if seen > emitted {
            return false;
        }
    }

    let tally = &mut post.votes;
    tally.upvotes = event.upvotes;
    tally.downvotes = event.downvotes;

    // Another user's vote never touches the viewer's own vote.
    if viewer_id.is_some_and(|viewer| viewer == event.user_id) {
        tally.user_vote = event.user_vote.or(event.vote_type);
    }

    if event.upvoted_by.is_some() || event.downvoted_by.is_some() {
        if let Some(upvoted_by) = &event.upvoted_by {
            tally.upvoted_by = upvoted_by.clone();
        }
        if let Some(downvoted_by) = &event.downvoted_by {
            tally.downvoted_by = downvoted_by.clone();
        }
    } else if let Some(diff) = &event.voter_diff {
        for id in &diff.upvoters_removed {
            tally.upvoted_by.retain(|v| v != id);
        }
        for id in &diff.downvoters_removed {
            tally.downvoted_by.retain(|v| v != id);
        }
        for id in &diff.upvoters_added {
            insert_voter(&mut tally.upvoted_by, id);
        }
        for id in &diff.downvoters_added {
            insert_voter(&mut tally.downvoted_by, id);
        }
    }

    if let Some(points) = event.author_points {
        post.author.points = points;
    }
    if let Some(level) = &event.author_level {
        post.author.level = Some(level.clone());
    }

    if let Some(emitted) = event.emitted_at {
        post.last_vote_event_at = Some(post.last_vote_event_at.map_or(emitted, |seen| seen.max(emitted)));
    }
    true
}

fn insert_voter(voters: &mut Vec<String>, id: &str) {
    if !voters.iter().any(|v| v == id) {
        voters.push(id.to_string());
    }
}

/// Merge `event` into every cached copy of its post.
///
/// Returns the number of records updated. Posts absent from the cache are
/// ignored.
pub fn reconcile_vote_event(
    cache: &mut QueryCache,
    event: &VoteEvent,
    viewer_id: Option<&str>,
) -> usize {
    let mut applied = 0;

    for (key, entry) in cache.entries_for_mut(&RECONCILED_ENDPOINTS) {
        let Some(post) = entry
            .data
            .as_mut()
            .and_then(|data| data.find_post_mut(&event.post_id))
        else {
            continue;
        };
        if apply_vote_event(post, event, viewer_id) {
            applied += 1;
        } else {
            tracing::debug!("Discarded stale vote event for {} in {}", event.post_id, key);
        }
    }

    applied
}

/// Frame received on the realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeMessage {
    PostVote(VoteEvent),
    Ping,
    /// Frame type this client does not handle
    Unknown(String),
}

#[derive(Deserialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Parse a text frame of the form `{"type": ..., "payload": ...}`.
pub fn parse_frame(text: &str) -> Result<RealtimeMessage, ClientError> {
    let frame: Frame = serde_json::from_str(text)?;
    match frame.kind.as_str() {
        "post_vote" | "vote_update" => Ok(RealtimeMessage::PostVote(serde_json::from_value(
            frame.payload,
        )?)),
        "ping" => Ok(RealtimeMessage::Ping),
        _ => Ok(RealtimeMessage::Unknown(frame.kind)),
    }
}
