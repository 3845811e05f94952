//! Query/cache layer.
//!
//! Deduplicates concurrent reads, caches results under composite keys, and
//! exposes explicit invalidation as the consistency mechanism between
//! mutations and cached views.
//!
//! # Submodules
//!
//! - `key` - ordered, hashable cache key tuples
//! - `cache` - the keyed cache with dedup, retries, and invalidation

pub mod cache;
pub mod key;

pub use cache::{
    QueryCache, QuerySnapshot, QueryStatus, SubscriptionId, DEFAULT_GC_IDLE, DEFAULT_RETRIES,
};
pub use key::{KeyPart, QueryKey};
