//! Cursor-paginated listing payloads and request arguments.

use serde::{Deserialize, Serialize};

use super::{BestPractice, Post};

/// A record with a stable opaque id.
pub trait Record {
    fn record_id(&self) -> &str;
}

/// Pagination metadata attached to every listing page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

/// Accumulated records of one listing plus the latest pagination state.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
    /// Aggregate counts for filter chips, passed through verbatim
    pub facets: Option<serde_json::Value>,
}

impl<T> ListingPage<T> {
    pub fn new(items: Vec<T>, pagination: Pagination) -> Self {
        Self {
            items,
            pagination,
            facets: None,
        }
    }

    pub fn total_count(&self) -> u64 {
        self.pagination
            .count
            .unwrap_or_else(|| self.items.len() as u64)
    }
}

/// Wire shape of `GET /discussions/posts` and `GET /discussions/my-posts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsResponse {
    pub posts: Vec<Post>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facets: Option<serde_json::Value>,
}

impl From<PostsResponse> for ListingPage<Post> {
    fn from(response: PostsResponse) -> Self {
        Self {
            items: response.posts,
            pagination: response.pagination,
            facets: response.facets,
        }
    }
}

/// Wire shape of `GET /best-practices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestPracticesResponse {
    pub best_practices: Vec<BestPractice>,
    #[serde(default)]
    pub pagination: Pagination,
}

impl From<BestPracticesResponse> for ListingPage<BestPractice> {
    fn from(response: BestPracticesResponse) -> Self {
        Self::new(response.best_practices, response.pagination)
    }
}

/// Arguments of a cached query.
///
/// `cursor` is empty for the first page. Every other field is a filter and
/// takes part in the cache key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueryArgs {
    #[serde(default)]
    pub cursor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_market_post: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
}

impl QueryArgs {
    pub fn first_page(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Arguments of the thread query for one post.
    pub fn thread(post_id: impl Into<String>) -> Self {
        Self {
            post_id: Some(post_id.into()),
            ..Self::default()
        }
    }

    pub fn with_cursor(&self, cursor: impl Into<String>) -> Self {
        Self {
            cursor: cursor.into(),
            ..self.clone()
        }
    }

    pub fn is_first_page(&self) -> bool {
        self.cursor.is_empty()
    }

    /// URL query parameters in the backend's snake_case naming.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("cursor", self.cursor.clone())];
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        let optional = [
            ("search", &self.search),
            ("tag", &self.tag),
            ("sort", &self.sort),
            ("user_id", &self.user_id),
        ];
        for (name, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                pairs.push((name, value.to_string()));
            }
        }
        if let Some(flag) = self.is_market_post {
            pairs.push(("is_market_post", flag.to_string()));
        }
        pairs
    }
}
