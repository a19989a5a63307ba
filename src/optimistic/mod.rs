//! Optimistic patches with an undo log.
//!
//! A patch is applied synchronously to every cached copy of a record before
//! the network call. The returned [`UndoLog`] holds the pre-patch snapshots
//! and restores them if the call fails.

use crate::cache::{CacheKey, Endpoint, QueryCache};
use crate::models::{Post, Reply, VoteTally, VoteType};

/// Endpoints whose slots may hold a copy of a post.
pub const POST_ENDPOINTS: [Endpoint; 3] = [Endpoint::Posts, Endpoint::MyPosts, Endpoint::Thread];

/// Apply the viewer's vote toggle to a tally.
///
/// | current | requested | result |
/// |---|---|---|
/// | none | up | up, +1 up |
/// | none | down | down, +1 down |
/// | up | up | none, -1 up |
/// | down | down | none, -1 down |
/// | up | down | down, -1 up, +1 down |
/// | down | up | up, -1 down, +1 up |
///
/// With a known viewer id the local voter sets follow the same transition.
pub fn apply_vote(tally: &mut VoteTally, requested: VoteType, viewer_id: Option<&str>) {
    let previous = tally.user_vote;

    match previous {
        Some(VoteType::Upvote) => tally.upvotes = tally.upvotes.saturating_sub(1),
        Some(VoteType::Downvote) => tally.downvotes = tally.downvotes.saturating_sub(1),
        None => {}
    }

    let next = if previous == Some(requested) {
        None
    } else {
        Some(requested)
    };

    match next {
        Some(VoteType::Upvote) => tally.upvotes += 1,
        Some(VoteType::Downvote) => tally.downvotes += 1,
        None => {}
    }
    tally.user_vote = next;

    if let Some(viewer) = viewer_id {
        tally.upvoted_by.retain(|id| id != viewer);
        tally.downvoted_by.retain(|id| id != viewer);
        match next {
            Some(VoteType::Upvote) => tally.upvoted_by.push(viewer.to_string()),
            Some(VoteType::Downvote) => tally.downvoted_by.push(viewer.to_string()),
            None => {}
        }
    }
}

#[derive(Debug, Clone)]
enum Snapshot {
    Post { key: CacheKey, before: Post },
    Reply { key: CacheKey, before: Reply },
}

impl Snapshot {
    fn key(&self) -> &CacheKey {
        match self {
            Snapshot::Post { key, .. } => key,
            Snapshot::Reply { key, .. } => key,
        }
    }
}

/// Pre-patch snapshots of every record touched by one mutation.
#[derive(Debug, Clone, Default)]
pub struct UndoLog {
    snapshots: Vec<Snapshot>,
}

impl UndoLog {
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Slots that were patched.
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self.snapshots.iter().map(|s| s.key().clone()).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Restore every snapshot. Returns the number of records restored.
    ///
    /// Each record goes back to exactly its pre-patch state, so counts or
    /// author points written by a realtime event or a refetch while the
    /// mutation was pending are reverted too. Slots evicted since the patch
    /// are skipped.
    pub fn rollback(self, cache: &mut QueryCache) -> usize {
        let mut restored = 0;

        for snapshot in self.snapshots.into_iter().rev() {
            match snapshot {
                Snapshot::Post { key, before } => {
                    let target = cache
                        .entry_mut(&key)
                        .and_then(|entry| entry.data.as_mut())
                        .and_then(|data| data.find_post_mut(&before.id));
                    match target {
                        Some(post) => {
                            *post = before;
                            restored += 1;
                        }
                        None => tracing::debug!("Post {} no longer cached in {}", before.id, key),
                    }
                }
                Snapshot::Reply { key, before } => {
                    let target = cache
                        .entry_mut(&key)
                        .and_then(|entry| entry.data.as_mut())
                        .and_then(|data| data.find_reply_mut(&before.id));
                    match target {
                        Some(reply) => {
                            *reply = before;
                            restored += 1;
                        }
                        None => tracing::debug!("Reply {} no longer cached in {}", before.id, key),
                    }
                }
            }
        }

        restored
    }
}

/// Patch every cached copy of post `post_id`.
pub fn patch_post(
    cache: &mut QueryCache,
    post_id: &str,
    mut patch: impl FnMut(&mut Post),
) -> UndoLog {
    let mut log = UndoLog::default();

    for (key, entry) in cache.entries_for_mut(&POST_ENDPOINTS) {
        let Some(post) = entry
            .data
            .as_mut()
            .and_then(|data| data.find_post_mut(post_id))
        else {
            continue;
        };
        log.snapshots.push(Snapshot::Post {
            key: key.clone(),
            before: post.clone(),
        });
        patch(post);
    }

    log
}

/// Patch every cached copy of reply `reply_id`.
pub fn patch_reply(
    cache: &mut QueryCache,
    reply_id: &str,
    mut patch: impl FnMut(&mut Reply),
) -> UndoLog {
    let mut log = UndoLog::default();

    for (key, entry) in cache.entries_for_mut(&[Endpoint::Thread]) {
        let Some(reply) = entry
            .data
            .as_mut()
            .and_then(|data| data.find_reply_mut(reply_id))
        else {
            continue;
        };
        log.snapshots.push(Snapshot::Reply {
            key: key.clone(),
            before: reply.clone(),
        });
        patch(reply);
    }

    log
}
