//! Resource access functions.
//!
//! One async function per remote operation: typed request in, typed
//! response out, pipeline errors re-thrown unchanged so the calling view
//! decides messaging. No business logic lives here beyond shape mapping
//! and default parameter substitution.
//!
//! # Submodules
//!
//! - `auth` - login, registration, account recovery
//! - `projects` - project CRUD and filtered listings
//! - `comments` - project comments
//! - `tags` - technology tags
//! - `users` - profiles and roles
//! - `github` - external repository provider (import flow)

pub mod auth;
pub mod comments;
pub mod github;
pub mod projects;
pub mod tags;
pub mod users;

use serde::{Deserialize, Serialize};

/// First page, used when a caller passes no page number.
pub const DEFAULT_PAGE: u32 = 1;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Server-side paged list shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub page_number: u32,
    pub page_size: u32,
}

pub(crate) fn resolve_page(page: Option<u32>, size: Option<u32>) -> (u32, u32) {
    (
        page.unwrap_or(DEFAULT_PAGE),
        size.unwrap_or(DEFAULT_PAGE_SIZE),
    )
}
