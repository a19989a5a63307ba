//! Cursor pagination over a cached listing.
//!
//! A [`FeedPager`] holds one subscription to a listing slot. Pages of the same
//! filters accumulate in that slot; changing a filter moves the pager to a new
//! slot and starts again from the first page.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cache::{CacheKey, CachedData, Endpoint, FetchPlan};
use crate::client::{ForumClient, Subscription};
use crate::errors::ClientError;
use crate::models::{BestPractice, ListingPage, Post, QueryArgs, Record};

/// Records that can be listed by a [`FeedPager`].
pub trait ListingRecord: Record + Clone {
    /// The listing of this record type held by a slot, if any.
    fn listing(data: &CachedData) -> Option<&ListingPage<Self>>;
}

impl ListingRecord for Post {
    fn listing(data: &CachedData) -> Option<&ListingPage<Self>> {
        match data {
            CachedData::Posts(listing) => Some(listing),
            _ => None,
        }
    }
}

impl ListingRecord for BestPractice {
    fn listing(data: &CachedData) -> Option<&ListingPage<Self>> {
        match data {
            CachedData::BestPractices(listing) => Some(listing),
            _ => None,
        }
    }
}

/// Why [`FeedPager::load_more`] sent nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoNextPage,
    InFlight,
    MissingCursor,
    /// The server returned the cursor already in use
    CursorNotAdvanced,
}

/// Result of a pager operation.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// A request was sent and its page stored
    Fetched,
    /// The cache already satisfied the request
    Cached,
    Skipped(SkipReason),
    Failed(ClientError),
}

impl LoadOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, LoadOutcome::Failed(_))
    }
}

/// Snapshot of a pager for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedView<T> {
    /// Accumulated items, first occurrence of each id only
    pub items: Vec<T>,
    pub has_next_page: bool,
    pub next_cursor: Option<String>,
    /// No data yet and not refreshing
    pub is_loading: bool,
    pub is_fetching: bool,
    pub is_refreshing: bool,
    pub total_count: u64,
    pub facets: Option<serde_json::Value>,
    pub error: Option<ClientError>,
}

/// Infinite-scroll controller for one listing endpoint.
pub struct FeedPager<T: ListingRecord> {
    client: ForumClient,
    endpoint: Endpoint,
    filters: QueryArgs,
    current_cursor: String,
    is_refreshing: AtomicBool,
    subscription: Subscription,
    _record: PhantomData<fn() -> T>,
}

impl FeedPager<Post> {
    /// Pager over the general discussion feed.
    pub fn posts(client: &ForumClient, filters: QueryArgs) -> Self {
        Self::new(client, Endpoint::Posts, filters)
    }

    /// Pager over the viewer's own posts.
    pub fn my_posts(client: &ForumClient, filters: QueryArgs) -> Self {
        Self::new(client, Endpoint::MyPosts, filters)
    }
}

impl FeedPager<BestPractice> {
    pub fn best_practices(client: &ForumClient, filters: QueryArgs) -> Self {
        Self::new(client, Endpoint::BestPractices, filters)
    }
}

impl<T: ListingRecord> FeedPager<T> {
    fn new(client: &ForumClient, endpoint: Endpoint, filters: QueryArgs) -> Self {
        let filters = filters.with_cursor("");
        let subscription = client.watch(CacheKey::new(endpoint, &filters));
        Self {
            client: client.clone(),
            endpoint,
            filters,
            current_cursor: String::new(),
            is_refreshing: AtomicBool::new(false),
            subscription,
            _record: PhantomData,
        }
    }

    pub fn key(&self) -> &CacheKey {
        self.subscription.key()
    }

    pub fn filters(&self) -> &QueryArgs {
        &self.filters
    }

    pub fn current_cursor(&self) -> &str {
        &self.current_cursor
    }

    fn request_args(&self) -> QueryArgs {
        self.filters.with_cursor(self.current_cursor.clone())
    }

    async fn run(&self, force: bool) -> LoadOutcome {
        match self
            .client
            .query(self.endpoint, &self.request_args(), force)
            .await
        {
            Ok(FetchPlan::Fetch) => LoadOutcome::Fetched,
            Ok(FetchPlan::Cached) | Ok(FetchPlan::InFlight) => LoadOutcome::Cached,
            Err(err) => LoadOutcome::Failed(err),
        }
    }

    /// Load the page at the current cursor unless cached.
    pub async fn load(&mut self) -> LoadOutcome {
        self.run(false).await
    }

    /// Advance to the next page.
    ///
    /// Sends nothing when there is no next page, a request is in flight, the
    /// cursor is missing, or the server answered the last stored page with
    /// that page's own cursor. The cursor is read from the slot, so a
    /// refetch from the first page by invalidation or by another pager on the
    /// same slot rewinds this pager too.
    pub async fn load_more(&mut self) -> LoadOutcome {
        let state = self.client.store().with(|cache| {
            cache.entry(self.subscription.key()).map(|entry| {
                let pagination = entry
                    .data
                    .as_ref()
                    .and_then(T::listing)
                    .map(|listing| listing.pagination.clone())
                    .unwrap_or_default();
                let stored_cursor = entry
                    .last_args
                    .as_ref()
                    .map(|args| args.cursor.clone())
                    .unwrap_or_default();
                (pagination, stored_cursor, entry.is_fetching())
            })
        });
        let Some((pagination, stored_cursor, fetching)) = state else {
            return LoadOutcome::Skipped(SkipReason::NoNextPage);
        };

        if !pagination.has_next_page {
            return LoadOutcome::Skipped(SkipReason::NoNextPage);
        }
        if fetching {
            return LoadOutcome::Skipped(SkipReason::InFlight);
        }
        let Some(next) = pagination.next_cursor.filter(|c| !c.is_empty()) else {
            return LoadOutcome::Skipped(SkipReason::MissingCursor);
        };
        if next == stored_cursor {
            tracing::debug!("{} returned cursor {} again", self.key(), next);
            return LoadOutcome::Skipped(SkipReason::CursorNotAdvanced);
        }

        tracing::debug!("{} advancing to cursor {}", self.key(), next);
        self.current_cursor = next;
        self.run(false).await
    }

    /// Refetch from the first page, replacing the accumulated items.
    ///
    /// The refreshing flag is cleared however the call ends, including when
    /// the returned future is dropped.
    pub async fn refresh(&mut self) -> LoadOutcome {
        self.current_cursor.clear();
        let _refreshing = Refreshing::start(&self.is_refreshing);
        self.run(true).await
    }

    pub fn is_refreshing(&self) -> bool {
        self.is_refreshing.load(Ordering::Acquire)
    }

    /// Apply new filters and load.
    ///
    /// When the filters differ from the current ones the cursor resets and
    /// the pager moves to the slot of the new filters.
    pub async fn set_filters(&mut self, filters: QueryArgs) -> LoadOutcome {
        let filters = filters.with_cursor("");
        let key = CacheKey::new(self.endpoint, &filters);
        if &key != self.subscription.key() {
            tracing::debug!("Filters changed: {} -> {}", self.subscription.key(), key);
            self.subscription = self.client.watch(key);
            self.current_cursor.clear();
        }
        self.filters = filters;
        self.run(false).await
    }

    pub fn view(&self) -> FeedView<T> {
        let is_refreshing = self.is_refreshing();
        self.client.store().with(|cache| {
            let entry = cache.entry(self.subscription.key());
            let listing = entry.and_then(|e| e.data.as_ref()).and_then(T::listing);

            FeedView {
                items: listing.map(|l| dedupe(&l.items)).unwrap_or_default(),
                has_next_page: listing.is_some_and(|l| l.pagination.has_next_page),
                next_cursor: listing.and_then(|l| l.pagination.next_cursor.clone()),
                is_loading: listing.is_none()
                    && !is_refreshing
                    && entry.map_or(true, |e| e.error.is_none()),
                is_fetching: entry.is_some_and(|e| e.is_fetching()),
                is_refreshing,
                total_count: listing.map_or(0, |l| l.total_count()),
                facets: listing.and_then(|l| l.facets.clone()),
                error: entry.and_then(|e| e.error.clone()),
            }
        })
    }
}

/// Holds a pager's refreshing flag up while alive.
struct Refreshing<'a>(&'a AtomicBool);

impl<'a> Refreshing<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for Refreshing<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn dedupe<T: ListingRecord>(items: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(item.record_id().to_string()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures_util::FutureExt;

    use super::*;
    use crate::cache::{CacheTag, TagKind};
    use crate::models::Pagination;
    use crate::testing::{page, post, practice, ScriptedApi};

    fn ids(view: &FeedView<Post>) -> Vec<&str> {
        view.items.iter().map(|p| p.id.as_str()).collect()
    }

    fn client(api: &Arc<ScriptedApi>) -> ForumClient {
        ForumClient::new(api.clone(), Some("viewer".into()))
    }

    #[tokio::test]
    async fn test_pages_accumulate() {
        let api = Arc::new(ScriptedApi::new());
        api.push_posts(
            Endpoint::Posts,
            "",
            Ok(page(vec![post("A", 0, 0), post("B", 0, 0)], Some("c1"))),
        );
        api.push_posts(Endpoint::Posts, "c1", Ok(page(vec![post("C", 0, 0)], None)));
        let client = client(&api);
        let mut pager = FeedPager::posts(&client, QueryArgs::first_page(2));

        assert_eq!(pager.load().await, LoadOutcome::Fetched);
        let view = pager.view();
        assert_eq!(ids(&view), vec!["A", "B"]);
        assert!(view.has_next_page);

        assert_eq!(pager.load_more().await, LoadOutcome::Fetched);
        let view = pager.view();
        assert_eq!(ids(&view), vec!["A", "B", "C"]);
        assert!(!view.has_next_page);
        assert_eq!(pager.current_cursor(), "c1");

        assert_eq!(
            pager.load_more().await,
            LoadOutcome::Skipped(SkipReason::NoNextPage)
        );
        assert_eq!(api.count_calls("getPosts"), 2);
    }

    #[tokio::test]
    async fn test_first_load_then_load_more_with_timestamp_cursor() {
        let cursor = "2024-01-01T00:00:00Z";
        let api = Arc::new(ScriptedApi::new());
        let mut first = page(
            vec![post("p1", 0, 0), post("p2", 0, 0), post("p3", 0, 0)],
            Some(cursor),
        );
        first.pagination.count = Some(3);
        api.push_posts(Endpoint::Posts, "", Ok(first));
        api.push_posts(
            Endpoint::Posts,
            cursor,
            Ok(page(vec![post("p4", 0, 0), post("p5", 0, 0)], None)),
        );
        let client = client(&api);
        let mut pager = FeedPager::posts(&client, QueryArgs::first_page(3));

        pager.load().await;
        let view = pager.view();
        assert_eq!(ids(&view), vec!["p1", "p2", "p3"]);
        assert!(view.has_next_page);
        assert_eq!(view.total_count, 3);

        pager.load_more().await;
        let view = pager.view();
        assert_eq!(ids(&view), vec!["p1", "p2", "p3", "p4", "p5"]);
        assert!(!view.has_next_page);

        for _ in 0..3 {
            assert_eq!(
                pager.load_more().await,
                LoadOutcome::Skipped(SkipReason::NoNextPage)
            );
        }
        assert_eq!(
            api.calls(),
            vec!["getPosts cursor=", format!("getPosts cursor={}", cursor).as_str()]
        );
    }

    #[tokio::test]
    async fn test_failed_page_keeps_items() {
        let api = Arc::new(ScriptedApi::new());
        api.push_posts(
            Endpoint::Posts,
            "",
            Ok(page(vec![post("A", 0, 0), post("B", 0, 0)], Some("c1"))),
        );
        api.push_posts(
            Endpoint::Posts,
            "c1",
            Err(ClientError::Transport("timed out".into())),
        );
        let client = client(&api);
        let mut pager = FeedPager::posts(&client, QueryArgs::first_page(2));
        pager.load().await;

        assert!(pager.load_more().await.is_failed());

        let view = pager.view();
        assert_eq!(ids(&view), vec!["A", "B"]);
        assert!(view.has_next_page);
        assert!(matches!(view.error, Some(ClientError::Transport(_))));
        assert!(!view.is_loading);

        assert!(pager.load_more().await.is_failed());
        assert_eq!(api.count_calls("getPosts cursor=c1"), 2);
    }

    #[tokio::test]
    async fn test_repeated_cursor_stops_loading() {
        let api = Arc::new(ScriptedApi::new());
        api.push_posts(Endpoint::Posts, "", Ok(page(vec![post("A", 0, 0)], Some("c1"))));
        api.push_posts(Endpoint::Posts, "c1", Ok(page(vec![post("B", 0, 0)], Some("c1"))));
        let client = client(&api);
        let mut pager = FeedPager::posts(&client, QueryArgs::first_page(1));
        pager.load().await;

        assert_eq!(pager.load_more().await, LoadOutcome::Fetched);
        assert_eq!(
            pager.load_more().await,
            LoadOutcome::Skipped(SkipReason::CursorNotAdvanced)
        );
        assert_eq!(api.count_calls("getPosts"), 2);
    }

    #[tokio::test]
    async fn test_missing_cursor_is_skipped() {
        let api = Arc::new(ScriptedApi::new());
        let mut broken = page(vec![post("A", 0, 0)], None);
        broken.pagination = Pagination {
            has_next_page: true,
            next_cursor: None,
            count: None,
        };
        api.push_posts(Endpoint::Posts, "", Ok(broken));
        let client = client(&api);
        let mut pager = FeedPager::posts(&client, QueryArgs::first_page(1));
        pager.load().await;

        assert_eq!(
            pager.load_more().await,
            LoadOutcome::Skipped(SkipReason::MissingCursor)
        );
    }

    #[tokio::test]
    async fn test_load_more_before_first_page_is_skipped() {
        let api = Arc::new(ScriptedApi::new());
        let client = client(&api);
        let mut pager = FeedPager::posts(&client, QueryArgs::first_page(1));

        assert!(pager.view().is_loading);
        assert_eq!(
            pager.load_more().await,
            LoadOutcome::Skipped(SkipReason::NoNextPage)
        );
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_filter_change_resets_cursor() {
        let api = Arc::new(ScriptedApi::new());
        api.push_posts(Endpoint::Posts, "", Ok(page(vec![post("A", 0, 0)], Some("c1"))));
        api.push_posts(Endpoint::Posts, "c1", Ok(page(vec![post("B", 0, 0)], Some("c2"))));
        let client = client(&api);
        let mut pager = FeedPager::posts(&client, QueryArgs::first_page(1));
        pager.load().await;
        pager.load_more().await;
        let old_key = pager.key().clone();

        api.reset_posts(Endpoint::Posts, "", Ok(page(vec![post("Z", 0, 0)], None)));
        let filtered = QueryArgs {
            tag: Some("irrigation".into()),
            ..QueryArgs::first_page(1)
        };
        assert_eq!(pager.set_filters(filtered).await, LoadOutcome::Fetched);

        assert_eq!(pager.current_cursor(), "");
        assert_ne!(pager.key(), &old_key);
        assert_eq!(ids(&pager.view()), vec!["Z"]);
        assert!(client.store().with(|c| c.entry(&old_key).is_none()));
    }

    #[tokio::test]
    async fn test_same_filters_keep_cursor() {
        let api = Arc::new(ScriptedApi::new());
        api.push_posts(Endpoint::Posts, "", Ok(page(vec![post("A", 0, 0)], Some("c1"))));
        api.push_posts(Endpoint::Posts, "c1", Ok(page(vec![post("B", 0, 0)], None)));
        let client = client(&api);
        let mut pager = FeedPager::posts(&client, QueryArgs::first_page(1));
        pager.load().await;
        pager.load_more().await;

        let outcome = pager.set_filters(QueryArgs::first_page(1)).await;

        assert_eq!(outcome, LoadOutcome::Cached);
        assert_eq!(pager.current_cursor(), "c1");
    }

    #[tokio::test]
    async fn test_refresh_replaces_items() {
        let api = Arc::new(ScriptedApi::new());
        api.push_posts(Endpoint::Posts, "", Ok(page(vec![post("A", 0, 0)], Some("c1"))));
        api.push_posts(Endpoint::Posts, "", Ok(page(vec![post("N", 0, 0)], Some("c9"))));
        api.push_posts(Endpoint::Posts, "c1", Ok(page(vec![post("B", 0, 0)], Some("c2"))));
        let client = client(&api);
        let mut pager = FeedPager::posts(&client, QueryArgs::first_page(1));
        pager.load().await;
        pager.load_more().await;

        assert_eq!(pager.refresh().await, LoadOutcome::Fetched);

        let view = pager.view();
        assert_eq!(ids(&view), vec!["N"]);
        assert_eq!(view.next_cursor.as_deref(), Some("c9"));
        assert!(!view.is_refreshing);
        assert_eq!(pager.current_cursor(), "");
    }

    #[tokio::test]
    async fn test_duplicate_ids_render_once() {
        let api = Arc::new(ScriptedApi::new());
        api.push_posts(
            Endpoint::Posts,
            "",
            Ok(page(vec![post("A", 0, 0), post("B", 0, 0)], Some("c1"))),
        );
        api.push_posts(
            Endpoint::Posts,
            "c1",
            Ok(page(vec![post("B", 9, 9), post("C", 0, 0)], None)),
        );
        let client = client(&api);
        let mut pager = FeedPager::posts(&client, QueryArgs::first_page(2));
        pager.load().await;
        pager.load_more().await;

        let view = pager.view();
        assert_eq!(ids(&view), vec!["A", "B", "C"]);
        assert_eq!(view.items[1].votes.upvotes, 0);
    }

    #[tokio::test]
    async fn test_load_more_after_invalidation() {
        let api = Arc::new(ScriptedApi::new());
        api.push_posts(
            Endpoint::Posts,
            "",
            Ok(page(vec![post("A", 0, 0), post("B", 0, 0)], Some("c1"))),
        );
        api.push_posts(Endpoint::Posts, "c1", Ok(page(vec![post("C", 0, 0)], Some("c2"))));
        let client = client(&api);
        let mut pager = FeedPager::posts(&client, QueryArgs::first_page(2));
        pager.load().await;
        pager.load_more().await;

        client
            .invalidate_tags(&[CacheTag::List(TagKind::Post)])
            .await;
        assert_eq!(ids(&pager.view()), vec!["A", "B"]);

        assert_eq!(pager.load_more().await, LoadOutcome::Fetched);
        assert_eq!(ids(&pager.view()), vec!["A", "B", "C"]);
        assert_eq!(
            api.calls(),
            vec![
                "getPosts cursor=",
                "getPosts cursor=c1",
                "getPosts cursor=",
                "getPosts cursor=c1"
            ]
        );
    }

    #[tokio::test]
    async fn test_refresh_by_another_pager_rewinds_shared_slot() {
        let api = Arc::new(ScriptedApi::new());
        api.push_posts(Endpoint::Posts, "", Ok(page(vec![post("A", 0, 0)], Some("c1"))));
        api.push_posts(Endpoint::Posts, "c1", Ok(page(vec![post("B", 0, 0)], Some("c2"))));
        let client = client(&api);
        let mut scrolled = FeedPager::posts(&client, QueryArgs::first_page(1));
        scrolled.load().await;
        scrolled.load_more().await;

        let mut other = FeedPager::posts(&client, QueryArgs::first_page(1));
        assert_eq!(other.refresh().await, LoadOutcome::Fetched);

        assert_eq!(scrolled.load_more().await, LoadOutcome::Fetched);
        assert_eq!(ids(&scrolled.view()), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_dropped_load_more_does_not_block_the_next() {
        let api = Arc::new(ScriptedApi::new());
        api.push_posts(Endpoint::Posts, "", Ok(page(vec![post("A", 0, 0)], Some("c1"))));
        api.push_posts(Endpoint::Posts, "c1", Ok(page(vec![post("B", 0, 0)], None)));
        let client = client(&api);
        let mut pager = FeedPager::posts(&client, QueryArgs::first_page(1));
        pager.load().await;

        assert!(pager.load_more().now_or_never().is_none());
        assert!(!pager.view().is_fetching);

        assert_eq!(pager.load_more().await, LoadOutcome::Fetched);
        assert_eq!(ids(&pager.view()), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_dropped_refresh_clears_flag() {
        let api = Arc::new(ScriptedApi::new());
        api.push_posts(Endpoint::Posts, "", Ok(page(vec![post("A", 0, 0)], None)));
        let client = client(&api);
        let mut pager = FeedPager::posts(&client, QueryArgs::first_page(1));
        pager.load().await;

        assert!(pager.refresh().now_or_never().is_none());

        let view = pager.view();
        assert!(!view.is_refreshing);
        assert!(!view.is_fetching);
        assert!(!pager.is_refreshing());
        assert_eq!(pager.refresh().await, LoadOutcome::Fetched);
    }

    #[tokio::test]
    async fn test_late_page_after_refresh_renders_once() {
        let api = Arc::new(ScriptedApi::new());
        api.push_posts(
            Endpoint::Posts,
            "",
            Ok(page(vec![post("A", 0, 0), post("B", 0, 0)], Some("c1"))),
        );
        let client = client(&api);
        let mut pager = FeedPager::posts(&client, QueryArgs::first_page(2));
        pager.load().await;

        let key = pager.key().clone();
        let first = pager.filters().clone();
        let next = first.with_cursor("c1");
        client.store().with(|cache| {
            assert_eq!(cache.plan_fetch(&key, &next, false), FetchPlan::Fetch);
            assert_eq!(cache.plan_fetch(&key, &first, true), FetchPlan::Fetch);
            cache.complete_fetch(
                &key,
                &first,
                Ok(CachedData::Posts(page(
                    vec![post("N", 0, 0), post("A", 0, 0)],
                    Some("c1"),
                ))),
            );
            cache.complete_fetch(
                &key,
                &next,
                Ok(CachedData::Posts(page(
                    vec![post("A", 0, 0), post("C", 0, 0)],
                    None,
                ))),
            );
        });

        let view = pager.view();
        assert_eq!(ids(&view), vec!["N", "A", "C"]);
        assert!(!view.is_fetching);
        assert!(!view.has_next_page);
    }

    #[tokio::test]
    async fn test_dropping_pager_evicts_slot() {
        let api = Arc::new(ScriptedApi::new());
        api.push_practices("", Ok(page(vec![practice("bp1")], None)));
        let client = client(&api);

        let mut pager = FeedPager::best_practices(&client, QueryArgs::first_page(5));
        pager.load().await;
        assert_eq!(pager.view().items.len(), 1);
        assert_eq!(pager.view().total_count, 1);

        drop(pager);
        assert!(client.store().with(|c| c.is_empty()));
    }
}
