//! HTTP implementation of [`DiscussionApi`] on reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use super::{paths, DiscussionApi};
use crate::cache::Endpoint;
use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::models::{
    BestPractice, BestPracticesResponse, ListingPage, ModerationDecision, NewPost, NewReply, Post,
    PostThread, PostsResponse, QueryArgs, Reply, UpdatePostRequest, VoteRequest, VoteResponse,
    VoteType,
};

/// REST client for the discussion backend.
#[derive(Clone)]
pub struct HttpApi {
    base_url: String,
    client: Client,
}

impl HttpApi {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url = sanitize_base_url(base_url.into())?;

        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ClientError::Config("API token is not a valid header".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(
            config.api_base_url.clone(),
            config.api_token.as_deref(),
            config.request_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_response(status.as_u16(), &body));
        }
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_response(status.as_u16(), &body));
        }
        Ok(())
    }
}

#[async_trait]
impl DiscussionApi for HttpApi {
    async fn list_posts(
        &self,
        endpoint: Endpoint,
        args: &QueryArgs,
    ) -> Result<ListingPage<Post>, ClientError> {
        let path = match endpoint {
            Endpoint::MyPosts => paths::MY_POSTS,
            _ => paths::POSTS,
        };
        tracing::debug!("GET {} cursor={:?}", path, args.cursor);

        let request = self.client.get(self.url(path)).query(&args.to_query_pairs());
        let response: PostsResponse = self.send_json(request).await?;
        Ok(response.into())
    }

    async fn list_best_practices(
        &self,
        args: &QueryArgs,
    ) -> Result<ListingPage<BestPractice>, ClientError> {
        let request = self
            .client
            .get(self.url(paths::BEST_PRACTICES))
            .query(&args.to_query_pairs());
        let response: BestPracticesResponse = self.send_json(request).await?;
        Ok(response.into())
    }

    async fn get_thread(&self, post_id: &str) -> Result<PostThread, ClientError> {
        let request = self
            .client
            .get(self.url(&format!("{}/{}", paths::POSTS, post_id)));
        self.send_json(request).await
    }

    async fn vote_post(&self, post_id: &str, vote: VoteType) -> Result<VoteResponse, ClientError> {
        let request = self
            .client
            .post(self.url(&format!("{}/{}/vote", paths::POSTS, post_id)))
            .json(&VoteRequest { vote_type: vote });
        self.send_json(request).await
    }

    async fn vote_reply(
        &self,
        reply_id: &str,
        vote: VoteType,
    ) -> Result<VoteResponse, ClientError> {
        let request = self
            .client
            .post(self.url(&format!("{}/{}/vote", paths::REPLIES, reply_id)))
            .json(&VoteRequest { vote_type: vote });
        self.send_json(request).await
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post, ClientError> {
        let request = self.client.post(self.url(paths::POSTS)).json(post);
        self.send_json(request).await
    }

    async fn update_post(
        &self,
        post_id: &str,
        update: &UpdatePostRequest,
    ) -> Result<(), ClientError> {
        let request = self
            .client
            .put(self.url(&format!("{}/{}", paths::POSTS, post_id)))
            .json(update);
        self.send_empty(request).await
    }

    async fn delete_post(&self, post_id: &str) -> Result<(), ClientError> {
        let request = self
            .client
            .delete(self.url(&format!("{}/{}", paths::POSTS, post_id)));
        self.send_empty(request).await
    }

    async fn create_reply(&self, post_id: &str, reply: &NewReply) -> Result<Reply, ClientError> {
        let request = self
            .client
            .post(self.url(&format!("{}/{}/replies", paths::POSTS, post_id)))
            .json(reply);
        self.send_json(request).await
    }

    async fn moderate_post(
        &self,
        post_id: &str,
        decision: ModerationDecision,
    ) -> Result<(), ClientError> {
        let request = self.client.patch(self.url(&format!(
            "{}/{}/{}",
            paths::POSTS,
            post_id,
            decision.as_path()
        )));
        self.send_empty(request).await
    }
}

fn sanitize_base_url(mut base: String) -> Result<String, ClientError> {
    if !base.starts_with("http://") && !base.starts_with("https://") {
        base = format!("http://{base}");
    }
    while base.ends_with('/') {
        base.pop();
    }
    Url::parse(&base).map_err(|e| ClientError::Config(format!("Invalid API URL: {}", e)))?;
    Ok(base)
}
