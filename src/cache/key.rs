//! Endpoint names and cache keys.

use serde::Serialize;

use crate::models::QueryArgs;

/// Cached query endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    /// General discussion feed
    Posts,
    /// Posts authored by the viewer
    MyPosts,
    /// Best-practice articles
    BestPractices,
    /// One post with its reply tree
    Thread,
}

impl Endpoint {
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Posts => "getPosts",
            Endpoint::MyPosts => "getMyPosts",
            Endpoint::BestPractices => "getBestPractices",
            Endpoint::Thread => "getPostThread",
        }
    }

    /// Whether results accumulate page by page.
    pub fn is_paginated(&self) -> bool {
        !matches!(self, Endpoint::Thread)
    }

    /// Whether cached data of this endpoint contains votable posts.
    pub fn holds_posts(&self) -> bool {
        matches!(self, Endpoint::Posts | Endpoint::MyPosts | Endpoint::Thread)
    }

    /// Serialize the arguments that identify a cache slot.
    ///
    /// The cursor never takes part, so all pages of one listing share a slot.
    pub fn serialize_query_args(&self, args: &QueryArgs) -> String {
        let key = match self {
            Endpoint::Thread => SlotArgs {
                post_id: args.post_id.as_deref(),
                ..SlotArgs::default()
            },
            _ => SlotArgs {
                limit: args.limit,
                search: args.search.as_deref(),
                tag: args.tag.as_deref(),
                sort: args.sort.as_deref(),
                is_market_post: args.is_market_post,
                user_id: args.user_id.as_deref(),
                post_id: None,
            },
        };
        serde_json::to_string(&key).unwrap_or_default()
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct SlotArgs<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_market_post: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    post_id: Option<&'a str>,
}

/// Identity of one cache slot: endpoint plus serialized filter arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub endpoint: Endpoint,
    pub args: String,
}

impl CacheKey {
    pub fn new(endpoint: Endpoint, args: &QueryArgs) -> Self {
        Self {
            endpoint,
            args: endpoint.serialize_query_args(args),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.endpoint, self.args)
    }
}
