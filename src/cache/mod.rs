//! Query cache: request results keyed by endpoint and normalized arguments.
//!
//! The cache is the only shared mutable state of the client. It is mutated
//! through two paths only: merging fetched pages, and optimistic
//! patch/rollback. Both run inside short synchronous critical sections of
//! [`CacheStore::with`], never across an await.

mod key;
mod merge;
mod tags;

pub use key::*;
pub use merge::*;
pub use tags::*;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::errors::ClientError;
use crate::models::{
    find_reply_mut, BestPractice, ListingPage, Post, PostThread, QueryArgs, Reply,
};

/// Data held by one cache slot.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedData {
    Posts(ListingPage<Post>),
    BestPractices(ListingPage<BestPractice>),
    Thread(PostThread),
}

impl CachedData {
    /// The post with `id`, in a listing or as a thread root.
    pub fn find_post_mut(&mut self, id: &str) -> Option<&mut Post> {
        match self {
            CachedData::Posts(listing) => listing.items.iter_mut().find(|p| p.id == id),
            CachedData::Thread(thread) if thread.post.id == id => Some(&mut thread.post),
            _ => None,
        }
    }

    /// The reply with `id` anywhere in a thread's tree.
    pub fn find_reply_mut(&mut self, id: &str) -> Option<&mut Reply> {
        match self {
            CachedData::Thread(thread) => find_reply_mut(&mut thread.replies, id),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CachedData::Posts(listing) => listing.items.is_empty(),
            CachedData::BestPractices(listing) => listing.items.is_empty(),
            CachedData::Thread(_) => false,
        }
    }
}

/// One cache slot and its request state.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    pub data: Option<CachedData>,
    /// Arguments of the last successful fetch
    pub last_args: Option<QueryArgs>,
    /// Arguments of the request currently in flight
    pub in_flight: Option<QueryArgs>,
    pub stale: bool,
    /// Last failure; the data stays at its last good state
    pub error: Option<ClientError>,
    pub tags: Vec<CacheTag>,
    pub subscribers: usize,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }
}

/// Decision taken before issuing a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    /// Request must be sent; the slot now records it as in flight
    Fetch,
    /// Cached data satisfies the arguments
    Cached,
    /// The same request is already in flight
    InFlight,
}

/// Store of cache slots.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<CacheKey, CacheEntry>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn entry_mut(&mut self, key: &CacheKey) -> Option<&mut CacheEntry> {
        self.entries.get_mut(key)
    }

    /// Iterate over every slot of the given endpoints.
    pub fn entries_for_mut<'a>(
        &'a mut self,
        endpoints: &'a [Endpoint],
    ) -> impl Iterator<Item = (&'a CacheKey, &'a mut CacheEntry)> + 'a {
        self.entries
            .iter_mut()
            .filter(move |(key, _)| endpoints.contains(&key.endpoint))
    }

    /// Register a subscriber, creating the slot on first subscription.
    pub fn subscribe(&mut self, key: &CacheKey) -> usize {
        let entry = self.entries.entry(key.clone()).or_default();
        entry.subscribers += 1;
        entry.subscribers
    }

    /// Drop a subscriber. Returns `true` when the slot was evicted.
    pub fn unsubscribe(&mut self, key: &CacheKey) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.subscribers = entry.subscribers.saturating_sub(1);
        if entry.subscribers == 0 {
            self.entries.remove(key);
            tracing::debug!("Evicted cache slot {}", key);
            return true;
        }
        false
    }

    /// Decide whether `args` need a network request for slot `key`.
    pub fn plan_fetch(&mut self, key: &CacheKey, args: &QueryArgs, force: bool) -> FetchPlan {
        let entry = self.entries.entry(key.clone()).or_default();

        if entry.in_flight.as_ref() == Some(args) {
            return FetchPlan::InFlight;
        }

        let needed = force
            || entry.data.is_none()
            || entry.stale
            || force_refetch(args, entry.last_args.as_ref());
        if !needed {
            return FetchPlan::Cached;
        }

        entry.in_flight = Some(args.clone());
        FetchPlan::Fetch
    }

    /// Store the outcome of a request issued with `args`.
    ///
    /// Returns `false` when the result was dropped: the slot was evicted while
    /// the request was in flight, or nobody subscribes to it.
    pub fn complete_fetch(
        &mut self,
        key: &CacheKey,
        args: &QueryArgs,
        result: Result<CachedData, ClientError>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            tracing::debug!("Dropping result for evicted slot {}", key);
            return false;
        };

        if entry.in_flight.as_ref() == Some(args) {
            entry.in_flight = None;
        }
        if entry.subscribers == 0 {
            tracing::debug!("Dropping result for unsubscribed slot {}", key);
            self.remove_idle(key);
            return false;
        }

        match result {
            Ok(data) => {
                let merged = merge_data(entry.data.take(), data, args);
                entry.tags = provided_tags(key.endpoint, &merged);
                entry.data = Some(merged);
                entry.last_args = Some(args.clone());
                entry.stale = false;
                entry.error = None;
                entry.fetched_at = Some(Utc::now());
            }
            Err(err) => {
                tracing::debug!("Fetch for {} failed: {}", key, err);
                entry.error = Some(err);
            }
        }
        true
    }

    /// Forget a request that will never complete.
    ///
    /// Clears the in-flight marker if it still belongs to `args`. A slot left
    /// without subscribers is removed.
    pub fn abandon_fetch(&mut self, key: &CacheKey, args: &QueryArgs) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        if entry.in_flight.as_ref() == Some(args) {
            tracing::debug!("Abandoned fetch for {} cursor={:?}", key, args.cursor);
            entry.in_flight = None;
        }
        if entry.subscribers == 0 {
            self.remove_idle(key);
        }
    }

    /// Remove an unsubscribed slot once no request is pending on it.
    fn remove_idle(&mut self, key: &CacheKey) {
        if self
            .entries
            .get(key)
            .is_some_and(|e| e.subscribers == 0 && e.in_flight.is_none())
        {
            self.entries.remove(key);
        }
    }

    /// Mark every subscribed slot providing one of `tags` stale.
    ///
    /// Returns the slots to refetch, each with first-page arguments.
    /// Unsubscribed slots never hold data, so nothing else is affected.
    pub fn invalidate(&mut self, tags: &[CacheTag]) -> Vec<(CacheKey, QueryArgs)> {
        let mut refetch = Vec::new();

        for (key, entry) in self.entries.iter_mut() {
            if entry.subscribers == 0 || !entry.tags.iter().any(|tag| tags.contains(tag)) {
                continue;
            }
            entry.stale = true;
            if let Some(args) = &entry.last_args {
                refetch.push((key.clone(), args.with_cursor("")));
            }
        }

        refetch.sort_by(|a, b| a.0.cmp(&b.0));
        refetch
    }
}

/// Shared handle to a [`QueryCache`].
///
/// Cloning shares the store; [`CacheStore::new`] creates an isolated one.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    inner: Arc<Mutex<QueryCache>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the cache.
    pub fn with<R>(&self, f: impl FnOnce(&mut QueryCache) -> R) -> R {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}
