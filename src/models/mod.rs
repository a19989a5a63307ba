//! Data models for the FarmForum discussion API.
//!
//! Field names follow the camelCase JSON contract of the REST backend.

mod event;
mod listing;
mod mutation;
mod post;
mod reply;

pub use event::*;
pub use listing::*;
pub use mutation::*;
pub use post::*;
pub use reply::*;
