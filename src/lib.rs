//! FarmForum client
//!
//! Client-side data layer for the FarmForum discussion API: a keyed query
//! cache with cursor pagination, optimistic votes and edits with rollback,
//! and realtime vote reconciliation.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod optimistic;
pub mod pagination;
pub mod realtime;

pub use client::{CacheEvent, ForumClient, MutationKind, Subscription};
pub use errors::ClientError;
pub use pagination::{FeedPager, FeedView, LoadOutcome, SkipReason};
pub use realtime::RealtimeChannel;

#[cfg(test)]
mod testing;
