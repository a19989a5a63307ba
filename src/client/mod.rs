//! Forum client: query orchestration over the shared cache.
//!
//! [`ForumClient`] owns the API handle, the cache store and the change
//! broadcast. Queries lock the cache only to plan and to store results;
//! the request itself runs unlocked.

mod mutations;

pub use mutations::*;

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::api::{DiscussionApi, HttpApi};
use crate::cache::{CacheKey, CacheStore, CacheTag, CachedData, Endpoint, FetchPlan};
use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::models::{PostThread, QueryArgs, VoteEvent};
use crate::realtime;

/// Capacity of the change broadcast; slow receivers see `Lagged`.
const CHANGE_CAPACITY: usize = 256;

/// Change notifications emitted after the cache was touched.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    Fetched(CacheKey),
    FetchFailed { key: CacheKey, error: ClientError },
    Patched { keys: Vec<CacheKey>, mutation: MutationKind },
    RolledBack { keys: Vec<CacheKey>, mutation: MutationKind },
    Invalidated(Vec<CacheKey>),
    Reconciled { post_id: String, records: usize },
    Evicted(CacheKey),
    MutationFailed { mutation: MutationKind, error: ClientError },
}

/// Handle to the discussion backend and its client-side cache.
#[derive(Clone)]
pub struct ForumClient {
    api: Arc<dyn DiscussionApi>,
    store: CacheStore,
    viewer_id: Option<String>,
    changes: broadcast::Sender<CacheEvent>,
}

impl ForumClient {
    pub fn new(api: Arc<dyn DiscussionApi>, viewer_id: Option<String>) -> Self {
        Self::with_store(api, CacheStore::new(), viewer_id)
    }

    /// Client over an existing store. Clients sharing a store share slots.
    pub fn with_store(
        api: Arc<dyn DiscussionApi>,
        store: CacheStore,
        viewer_id: Option<String>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            api,
            store,
            viewer_id,
            changes,
        }
    }

    /// HTTP-backed client from configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let api = HttpApi::from_config(config)?;
        tracing::info!("Forum client using API at {}", api.base_url());
        Ok(Self::new(Arc::new(api), config.viewer_id.clone()))
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn api(&self) -> &dyn DiscussionApi {
        self.api.as_ref()
    }

    pub fn viewer_id(&self) -> Option<&str> {
        self.viewer_id.as_deref()
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<CacheEvent> {
        self.changes.subscribe()
    }

    pub(crate) fn emit(&self, event: CacheEvent) {
        // No receivers is fine.
        let _ = self.changes.send(event);
    }

    /// Keep slot `key` alive until the returned guard is dropped.
    pub fn watch(&self, key: CacheKey) -> Subscription {
        let count = self.store.with(|cache| cache.subscribe(&key));
        tracing::trace!("Subscribed to {} ({} subscribers)", key, count);
        Subscription {
            client: self.clone(),
            key,
        }
    }

    fn release(&self, key: &CacheKey) {
        if self.store.with(|cache| cache.unsubscribe(key)) {
            self.emit(CacheEvent::Evicted(key.clone()));
        }
    }

    /// Run a query for slot `(endpoint, args)`.
    ///
    /// Returns the plan taken. A failed request leaves the slot's data at its
    /// last good state and records the error on the slot.
    pub async fn query(
        &self,
        endpoint: Endpoint,
        args: &QueryArgs,
        force: bool,
    ) -> Result<FetchPlan, ClientError> {
        let key = CacheKey::new(endpoint, args);
        self.query_key(&key, args, force).await
    }

    async fn query_key(
        &self,
        key: &CacheKey,
        args: &QueryArgs,
        force: bool,
    ) -> Result<FetchPlan, ClientError> {
        let plan = self.store.with(|cache| cache.plan_fetch(key, args, force));
        if plan != FetchPlan::Fetch {
            tracing::trace!("{} served without request ({:?})", key, plan);
            return Ok(plan);
        }

        tracing::debug!("Fetching {} cursor={:?}", key, args.cursor);
        let mut pending = PendingFetch {
            store: &self.store,
            key,
            args,
            done: false,
        };
        let result = fetch_data(self.api.as_ref(), key.endpoint, args).await;
        pending.done = true;

        match result {
            Ok(data) => {
                if self
                    .store
                    .with(|cache| cache.complete_fetch(key, args, Ok(data)))
                {
                    self.emit(CacheEvent::Fetched(key.clone()));
                }
                Ok(FetchPlan::Fetch)
            }
            Err(err) => {
                tracing::warn!("Query {} failed: {}", key, err);
                self.store
                    .with(|cache| cache.complete_fetch(key, args, Err(err.clone())));
                self.emit(CacheEvent::FetchFailed {
                    key: key.clone(),
                    error: err.clone(),
                });
                Err(err)
            }
        }
    }

    /// Invalidate `tags` and refetch every subscribed slot from its first page.
    ///
    /// Returns the number of slots refetched. Refetch failures are recorded on
    /// the slots.
    pub async fn invalidate_tags(&self, tags: &[CacheTag]) -> usize {
        let refetch = self.store.with(|cache| cache.invalidate(tags));
        if refetch.is_empty() {
            return 0;
        }

        tracing::debug!("Invalidated {} slots for {:?}", refetch.len(), tags);
        self.emit(CacheEvent::Invalidated(
            refetch.iter().map(|(key, _)| key.clone()).collect(),
        ));

        for (key, args) in &refetch {
            if let Err(err) = self.query_key(key, args, true).await {
                tracing::debug!("Refetch of {} failed: {}", key, err);
            }
        }
        refetch.len()
    }

    /// Subscribe to the thread of `post_id`.
    pub fn watch_thread(&self, post_id: &str) -> Subscription {
        self.watch(CacheKey::new(Endpoint::Thread, &QueryArgs::thread(post_id)))
    }

    /// Fetch the thread of `post_id` unless cached.
    pub async fn load_thread(&self, post_id: &str, force: bool) -> Result<FetchPlan, ClientError> {
        self.query(Endpoint::Thread, &QueryArgs::thread(post_id), force)
            .await
    }

    /// Cached thread of `post_id`.
    pub fn thread(&self, post_id: &str) -> Result<PostThread, ClientError> {
        let key = CacheKey::new(Endpoint::Thread, &QueryArgs::thread(post_id));
        self.store.with(|cache| match cache.entry(&key).and_then(|e| e.data.as_ref()) {
            Some(CachedData::Thread(thread)) => Ok(thread.clone()),
            _ => Err(ClientError::NotCached(format!("thread {}", post_id))),
        })
    }

    /// Reconcile a pushed vote event into every cached copy of its post.
    pub fn apply_vote_event(&self, event: &VoteEvent) -> usize {
        let viewer = self.viewer_id.as_deref();
        let records = self
            .store
            .with(|cache| realtime::reconcile_vote_event(cache, event, viewer));
        if records > 0 {
            self.emit(CacheEvent::Reconciled {
                post_id: event.post_id.clone(),
                records,
            });
        }
        records
    }
}

/// Live subscription to one cache slot. Dropping it unsubscribes.
pub struct Subscription {
    client: ForumClient,
    key: CacheKey,
}

impl Subscription {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.client.release(&self.key);
    }
}

/// Request in flight for a slot. Dropped before completion, it releases the
/// slot's in-flight marker so later queries are not blocked.
struct PendingFetch<'a> {
    store: &'a CacheStore,
    key: &'a CacheKey,
    args: &'a QueryArgs,
    done: bool,
}

impl Drop for PendingFetch<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.store
                .with(|cache| cache.abandon_fetch(self.key, self.args));
        }
    }
}

async fn fetch_data(
    api: &dyn DiscussionApi,
    endpoint: Endpoint,
    args: &QueryArgs,
) -> Result<CachedData, ClientError> {
    match endpoint {
        Endpoint::Posts | Endpoint::MyPosts => {
            api.list_posts(endpoint, args).await.map(CachedData::Posts)
        }
        Endpoint::BestPractices => api
            .list_best_practices(args)
            .await
            .map(CachedData::BestPractices),
        Endpoint::Thread => {
            let post_id = args
                .post_id
                .as_deref()
                .ok_or_else(|| ClientError::Config("thread query without post id".to_string()))?;
            api.get_thread(post_id).await.map(CachedData::Thread)
        }
    }
}
