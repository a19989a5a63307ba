//! REST API seam.
//!
//! [`DiscussionApi`] is the contract the cache and mutation layers talk to;
//! [`HttpApi`] implements it over HTTP.

mod http;

pub use http::*;

use async_trait::async_trait;

use crate::cache::Endpoint;
use crate::errors::ClientError;
use crate::models::{
    BestPractice, ListingPage, ModerationDecision, NewPost, NewReply, Post, PostThread,
    QueryArgs, Reply, UpdatePostRequest, VoteResponse, VoteType,
};

/// Request paths relative to the API base URL.
pub mod paths {
    pub const POSTS: &str = "/discussions/posts";
    pub const MY_POSTS: &str = "/discussions/my-posts";
    pub const REPLIES: &str = "/discussions/replies";
    pub const BEST_PRACTICES: &str = "/best-practices";
}

/// Operations of the discussion backend used by the client.
#[async_trait]
pub trait DiscussionApi: Send + Sync {
    /// GET one page of the general feed or of the viewer's own posts.
    async fn list_posts(
        &self,
        endpoint: Endpoint,
        args: &QueryArgs,
    ) -> Result<ListingPage<Post>, ClientError>;

    /// GET one page of best-practice articles.
    async fn list_best_practices(
        &self,
        args: &QueryArgs,
    ) -> Result<ListingPage<BestPractice>, ClientError>;

    /// GET a post with its reply tree.
    async fn get_thread(&self, post_id: &str) -> Result<PostThread, ClientError>;

    async fn vote_post(&self, post_id: &str, vote: VoteType) -> Result<VoteResponse, ClientError>;

    async fn vote_reply(&self, reply_id: &str, vote: VoteType)
        -> Result<VoteResponse, ClientError>;

    async fn create_post(&self, post: &NewPost) -> Result<Post, ClientError>;

    async fn update_post(
        &self,
        post_id: &str,
        update: &UpdatePostRequest,
    ) -> Result<(), ClientError>;

    async fn delete_post(&self, post_id: &str) -> Result<(), ClientError>;

    async fn create_reply(&self, post_id: &str, reply: &NewReply) -> Result<Reply, ClientError>;

    async fn moderate_post(
        &self,
        post_id: &str,
        decision: ModerationDecision,
    ) -> Result<(), ClientError>;
}
