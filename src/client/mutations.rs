//! Mutations: optimistic patches with rollback, and tag invalidation.

use uuid::Uuid;

use super::{CacheEvent, ForumClient};
use crate::cache::{CacheTag, TagKind};
use crate::errors::ClientError;
use crate::models::{
    ModerationDecision, NewPost, NewReply, Post, PostEdit, Reply, VoteResponse, VoteType,
};
use crate::optimistic::{self, apply_vote, UndoLog};

/// Mutation kinds reported in change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    VotePost,
    VoteReply,
    UpdatePost,
    DeletePost,
    CreatePost,
    CreateReply,
    ModeratePost,
}

impl ForumClient {
    /// Toggle the viewer's vote on a post.
    ///
    /// Every cached copy of the post is patched before the request and
    /// restored if it fails.
    pub async fn vote_post(
        &self,
        post_id: &str,
        vote: VoteType,
    ) -> Result<VoteResponse, ClientError> {
        let mutation_id = Uuid::new_v4();
        let viewer = self.viewer_id.clone();
        let undo = self.store.with(|cache| {
            optimistic::patch_post(cache, post_id, |post| {
                apply_vote(&mut post.votes, vote, viewer.as_deref())
            })
        });
        tracing::debug!(
            %mutation_id,
            "Optimistic {} on post {} patched {} records",
            vote.as_str(),
            post_id,
            undo.len()
        );
        let pending = self.pending(mutation_id, undo, MutationKind::VotePost);

        let result = self.api.vote_post(post_id, vote).await;
        pending.settle(result.as_ref().err());
        result
    }

    /// Toggle the viewer's vote on a reply at any depth of a cached thread.
    pub async fn vote_reply(
        &self,
        reply_id: &str,
        vote: VoteType,
    ) -> Result<VoteResponse, ClientError> {
        let mutation_id = Uuid::new_v4();
        let viewer = self.viewer_id.clone();
        let undo = self.store.with(|cache| {
            optimistic::patch_reply(cache, reply_id, |reply| {
                apply_vote(&mut reply.votes, vote, viewer.as_deref())
            })
        });
        tracing::debug!(
            %mutation_id,
            "Optimistic {} on reply {} patched {} records",
            vote.as_str(),
            reply_id,
            undo.len()
        );
        let pending = self.pending(mutation_id, undo, MutationKind::VoteReply);

        let result = self.api.vote_reply(reply_id, vote).await;
        pending.settle(result.as_ref().err());
        result
    }

    /// Edit a post in place across the feed, the viewer's posts and its thread.
    pub async fn update_post(&self, post_id: &str, edit: &PostEdit) -> Result<(), ClientError> {
        let mutation_id = Uuid::new_v4();
        let undo = self
            .store
            .with(|cache| optimistic::patch_post(cache, post_id, |post| edit.apply_to(post)));
        tracing::debug!(%mutation_id, "Optimistic edit of post {} patched {} records", post_id, undo.len());
        let pending = self.pending(mutation_id, undo, MutationKind::UpdatePost);

        let result = self.api.update_post(post_id, &edit.to_request()).await;
        pending.settle(result.as_ref().err());
        result
    }

    /// Delete a post, then refetch every listing that contained it.
    pub async fn delete_post(&self, post_id: &str) -> Result<(), ClientError> {
        self.api
            .delete_post(post_id)
            .await
            .map_err(|err| self.failed(MutationKind::DeletePost, err))?;

        tracing::info!("Deleted post {}", post_id);
        self.invalidate_tags(&[
            CacheTag::item(TagKind::Post, post_id),
            CacheTag::List(TagKind::Post),
            CacheTag::List(TagKind::MyPosts),
        ])
        .await;
        Ok(())
    }

    pub async fn create_post(&self, new_post: &NewPost) -> Result<Post, ClientError> {
        let created = self
            .api
            .create_post(new_post)
            .await
            .map_err(|err| self.failed(MutationKind::CreatePost, err))?;

        tracing::info!("Created post {}", created.id);
        self.invalidate_tags(&[
            CacheTag::List(TagKind::Post),
            CacheTag::List(TagKind::MyPosts),
        ])
        .await;
        Ok(created)
    }

    /// Reply to a post, or to a reply when `parent_reply_id` is set.
    pub async fn create_reply(
        &self,
        post_id: &str,
        new_reply: &NewReply,
    ) -> Result<Reply, ClientError> {
        let created = self
            .api
            .create_reply(post_id, new_reply)
            .await
            .map_err(|err| self.failed(MutationKind::CreateReply, err))?;

        self.invalidate_tags(&[
            CacheTag::item(TagKind::Thread, post_id),
            CacheTag::item(TagKind::Post, post_id),
        ])
        .await;
        Ok(created)
    }

    pub async fn approve_post(&self, post_id: &str) -> Result<(), ClientError> {
        self.moderate_post(post_id, ModerationDecision::Approve).await
    }

    pub async fn reject_post(&self, post_id: &str) -> Result<(), ClientError> {
        self.moderate_post(post_id, ModerationDecision::Reject).await
    }

    async fn moderate_post(
        &self,
        post_id: &str,
        decision: ModerationDecision,
    ) -> Result<(), ClientError> {
        self.api
            .moderate_post(post_id, decision)
            .await
            .map_err(|err| self.failed(MutationKind::ModeratePost, err))?;

        tracing::info!("Moderated post {}: {}", post_id, decision.as_path());
        self.invalidate_tags(&[
            CacheTag::item(TagKind::Post, post_id),
            CacheTag::List(TagKind::Post),
        ])
        .await;
        Ok(())
    }

    /// Announce an optimistic patch and hold its undo log until the request
    /// settles.
    fn pending(&self, mutation_id: Uuid, undo: UndoLog, mutation: MutationKind) -> PendingPatch<'_> {
        if !undo.is_empty() {
            self.emit(CacheEvent::Patched {
                keys: undo.keys(),
                mutation,
            });
        }
        PendingPatch {
            client: self,
            mutation_id,
            mutation,
            undo: Some(undo),
        }
    }

    fn roll_back(&self, undo: UndoLog, mutation: MutationKind) -> usize {
        let keys = undo.keys();
        let restored = self.store.with(|cache| undo.rollback(cache));
        if !keys.is_empty() {
            self.emit(CacheEvent::RolledBack { keys, mutation });
        }
        restored
    }

    fn failed(&self, mutation: MutationKind, err: ClientError) -> ClientError {
        tracing::warn!("{:?} failed: {}", mutation, err);
        self.emit(CacheEvent::MutationFailed {
            mutation,
            error: err.clone(),
        });
        err
    }
}

/// Optimistic patch awaiting its server response.
///
/// Dropped without [`PendingPatch::settle`], the request outcome is unknown and
/// the patch is rolled back.
struct PendingPatch<'a> {
    client: &'a ForumClient,
    mutation_id: Uuid,
    mutation: MutationKind,
    undo: Option<UndoLog>,
}

impl PendingPatch<'_> {
    /// Keep the patch on success, roll it back on `error`.
    fn settle(mut self, error: Option<&ClientError>) {
        let Some(undo) = self.undo.take() else {
            return;
        };
        let Some(err) = error else {
            return;
        };

        let restored = self.client.roll_back(undo, self.mutation);
        tracing::warn!(
            mutation_id = %self.mutation_id,
            "{:?} failed, restored {} records: {}",
            self.mutation,
            restored,
            err
        );
        self.client.emit(CacheEvent::MutationFailed {
            mutation: self.mutation,
            error: err.clone(),
        });
    }
}

impl Drop for PendingPatch<'_> {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take() {
            let restored = self.client.roll_back(undo, self.mutation);
            tracing::warn!(
                mutation_id = %self.mutation_id,
                "{:?} cancelled before a response, restored {} records",
                self.mutation,
                restored
            );
        }
    }
}
