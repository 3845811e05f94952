//! Navigation guard.
//!
//! Gates traversal to protected views. The guard only reads the session
//! store; it performs no network calls and keeps no state of its own. An
//! unauthenticated attempt at a protected path redirects to the login
//! entry view, discarding the attempted destination.

use std::sync::Arc;

use crate::session::SessionStore;

/// The unauthenticated entry view.
pub const LOGIN_PATH: &str = "/login";

/// Views reachable without a session.
const PUBLIC_PATHS: &[&str] = &[
    "/",
    "/login",
    "/register",
    "/forgot-password",
    "/reset-password",
    "/auth/verification-sent",
    "/auth/resend-verification",
    "/auth/verify-email",
];

/// Root paths of the protected area. Nested paths (`/projects/42/edit`)
/// inherit protection from their root.
const PROTECTED_PATHS: &[&str] = &[
    "/dashboard",
    "/explore",
    "/projects",
    "/profile",
    "/settings",
    "/import/github",
    "/auth/github/callback",
];

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Traversal may proceed.
    Allow,
    /// Traversal is denied; navigate to the given path instead.
    Redirect(&'static str),
    /// The path matches no known view.
    NotFound,
}

fn path_matches(path: &str, root: &str) -> bool {
    path == root || (root != "/" && path.starts_with(root) && path.as_bytes()[root.len()] == b'/')
}

/// True iff `path` belongs to the protected area.
pub fn is_protected(path: &str) -> bool {
    PROTECTED_PATHS.iter().any(|root| path_matches(path, root))
}

/// True iff `path` is reachable without a session.
pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.iter().any(|root| path_matches(path, root))
}

/// Access gate over the routing table.
pub struct NavigationGuard {
    session: Arc<SessionStore>,
}

impl NavigationGuard {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }

    /// Decides whether the current session may traverse to `path`.
    pub fn check(&self, path: &str) -> GuardDecision {
        if is_public(path) {
            return GuardDecision::Allow;
        }
        if is_protected(path) {
            if self.session.is_authenticated() {
                return GuardDecision::Allow;
            }
            return GuardDecision::Redirect(LOGIN_PATH);
        }
        GuardDecision::NotFound
    }
}
