//! Client library for the DeveloperHub collaboration platform.
//!
//! Provides the session, networking, and data layers a frontend needs to
//! talk to a DeveloperHub server: a persistent session store, an HTTP
//! pipeline with global authentication-failure handling, typed resource
//! access functions, a deduplicating query cache with invalidation, form
//! validation schemas, and a navigation guard over the routing table.
//!
//! [`AppContext`] wires the pieces together; each layer is also usable on
//! its own.

pub mod api;
pub mod config;
pub mod context;
pub mod http;
pub mod query;
pub mod routes;
pub mod session;
pub mod storage;
pub mod validate;

pub use context::AppContext;
