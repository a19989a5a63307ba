//! Request and response bodies of the mutation endpoints.

use serde::{Deserialize, Serialize};

use super::{Post, PostTag, VoteType};

/// Body of the vote endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub vote_type: VoteType,
}

/// Authoritative counts returned after a vote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub upvotes: u32,
    pub downvotes: u32,
    #[serde(default)]
    pub user_vote: Option<VoteType>,
}

/// Request body for creating a new post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    #[serde(default)]
    pub is_market_post: bool,
    #[serde(default)]
    pub is_available: bool,
}

/// Edit of an existing post. Only `Some` fields change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<PostTag>>,
    pub is_market_post: Option<bool>,
    pub is_available: Option<bool>,
    /// Image URLs to drop from the post
    pub remove_images: Vec<String>,
    /// Video URLs to drop from the post
    pub remove_videos: Vec<String>,
}

impl PostEdit {
    /// Overwrite the edited fields of `post` and drop removed media.
    pub fn apply_to(&self, post: &mut Post) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(content) = &self.content {
            post.content = content.clone();
        }
        if let Some(tags) = &self.tags {
            post.tags = tags.clone();
        }
        if let Some(flag) = self.is_market_post {
            post.is_market_post = flag;
        }
        if let Some(flag) = self.is_available {
            post.is_available = flag;
        }
        if !self.remove_images.is_empty() {
            post.images.retain(|url| !self.remove_images.contains(url));
        }
        if post
            .video
            .as_ref()
            .is_some_and(|url| self.remove_videos.contains(url))
        {
            post.video = None;
        }
    }

    /// Wire body of `PUT /discussions/posts/{id}`.
    pub fn to_request(&self) -> UpdatePostRequest {
        UpdatePostRequest {
            title: self.title.clone(),
            content: self.content.clone(),
            tag_ids: self
                .tags
                .as_ref()
                .map(|tags| tags.iter().map(|t| t.id.clone()).collect()),
            is_market_post: self.is_market_post,
            is_available: self.is_available,
            remove_images: self.remove_images.clone(),
            remove_videos: self.remove_videos.clone(),
        }
    }
}

/// Wire body for updating a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_market_post: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_available: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_videos: Vec<String>,
}

/// Request body for replying to a post or to another reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReply {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_reply_id: Option<String>,
}

/// Moderator verdict on a pending post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationDecision {
    Approve,
    Reject,
}

impl ModerationDecision {
    pub fn as_path(&self) -> &'static str {
        match self {
            ModerationDecision::Approve => "approve",
            ModerationDecision::Reject => "reject",
        }
    }
}
