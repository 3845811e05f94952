//! HTTP client pipeline.
//!
//! Uniform request dispatch with session-aware headers and centralized
//! failure translation. Every outbound call picks up the bearer token from
//! the session store; every failing response is classified into the
//! [`ApiError`] taxonomy. Authentication rejection is handled globally:
//! exactly one "session expired" notification, one logout, and one redirect
//! to the login route, no matter how many in-flight requests fail together.
//!
//! The pipeline never retries; the only retry policy in the crate lives in
//! the query cache and applies to reads.

pub mod transport;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::routes::LOGIN_PATH;
use crate::session::SessionStore;

pub use transport::ReqwestTransport;

/// Notification shown when the server rejects the session.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please sign in again";

/// Boxed future used at the transport seam.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors surfaced to callers of the pipeline and of the resource access
/// functions. Cloneable so the query cache can hand the settled failure to
/// multiple waiters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// The session is invalid or has expired (HTTP 401).
    #[error("session is invalid or has expired")]
    Unauthorized,

    /// The server rejected the request with field-level errors.
    #[error("validation failed: {message}")]
    ValidationFailed {
        message: String,
        field_errors: HashMap<String, Vec<String>>,
    },

    /// The requested resource does not exist (HTTP 404).
    #[error("resource not found")]
    NotFound,

    /// Transport-level failure; no response was received.
    #[error("network failure: {0}")]
    Network(String),

    /// Repository import invoked without a required credential. Raised
    /// locally, before any network call.
    #[error("missing credential for repository import: {0}")]
    ExternalCredentialMissing(&'static str),

    /// Fallback for anything else. Status 0 marks a client-side
    /// encode/decode failure rather than a server response.
    #[error("request failed ({status}): {message}")]
    Unknown { status: u16, message: String },
}

impl ApiError {
    pub(crate) fn malformed(context: &str, err: impl std::fmt::Display) -> Self {
        ApiError::Unknown {
            status: 0,
            message: format!("{context}: {err}"),
        }
    }
}

/// HTTP method for an [`ApiRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A fully described outbound request, independent of the transport.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Resource path relative to the API base URL, e.g. `/projects/42`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Bearer credential attached by the pipeline when a session exists.
    pub bearer: Option<String>,
}

/// Raw response handed back by a transport.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `Value::Null` when the body was empty, a JSON
    /// string when the server replied with non-JSON text.
    pub body: Value,
}

/// Seam between the pipeline and the wire.
///
/// Production code uses [`ReqwestTransport`]; tests script responses.
pub trait Transport: Send + Sync {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, ApiError>>;
}

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Non-blocking notification sink (a toast, in the reference UI).
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Navigation sink used for the forced redirect on session expiry.
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Notifier that drops all notifications.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _level: NoticeLevel, _message: &str) {}
}

/// Navigator that ignores redirects.
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn redirect(&self, _path: &str) {}
}

/// Structured error payload returned by the remote API.
///
/// The backend is inconsistent about casing, so both spellings are accepted.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "Message")]
    message: Option<String>,
    #[serde(alias = "Errors")]
    errors: Option<HashMap<String, Vec<String>>>,
}

/// Session-aware HTTP client.
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl HttpClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<SessionStore>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            transport,
            session,
            notifier,
            navigator,
        }
    }

    /// The session store this client reads its bearer token from.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Dispatches one request and returns the raw success body.
    ///
    /// This is the single choke point: bearer injection on the way out,
    /// failure classification on the way back.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let request = ApiRequest {
            method,
            path: path.to_string(),
            query,
            body,
            bearer: self.session.token(),
        };

        tracing::debug!(method = %request.method, path = %request.path, "dispatching request");
        let response = self.transport.send(request).await?;

        if (200..300).contains(&response.status) {
            return Ok(response.body);
        }
        Err(self.classify_failure(response))
    }

    /// Translates a non-2xx response into the error taxonomy, performing
    /// the global side effects (notification, logout, redirect) on the way.
    fn classify_failure(&self, response: ApiResponse) -> ApiError {
        if response.status == 401 {
            // expire() returns true for exactly one caller per session, so
            // concurrent 401s produce one notification and one redirect.
            if self.session.expire() {
                self.notifier.notify(NoticeLevel::Error, SESSION_EXPIRED_MESSAGE);
                self.navigator.redirect(LOGIN_PATH);
            }
            return ApiError::Unauthorized;
        }

        let parsed = serde_json::from_value::<ErrorBody>(response.body.clone()).ok();
        let message = parsed.as_ref().and_then(|body| body.message.clone());

        if let Some(message) = &message {
            self.notifier.notify(NoticeLevel::Error, message);
        }

        match response.status {
            404 => ApiError::NotFound,
            400 | 422 => ApiError::ValidationFailed {
                message: message.unwrap_or_else(|| "request validation failed".to_string()),
                field_errors: parsed.and_then(|body| body.errors).unwrap_or_default(),
            },
            status => {
                tracing::warn!(status, "unclassified server failure");
                ApiError::Unknown {
                    status,
                    message: message.unwrap_or_else(|| "unexpected server error".to_string()),
                }
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.execute(Method::Get, path, Vec::new(), None).await?;
        decode(value)
    }

    pub async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, ApiError> {
        let value = self.execute(Method::Get, path, query, None).await?;
        decode(value)
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = encode(body)?;
        let value = self.execute(Method::Post, path, Vec::new(), Some(body)).await?;
        decode(value)
    }

    /// POST with query parameters and no body, used by the provider import
    /// endpoint.
    pub async fn post_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, ApiError> {
        let value = self.execute(Method::Post, path, query, None).await?;
        decode(value)
    }

    /// POST where the response body is irrelevant to the caller.
    pub async fn post_unit<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let body = encode(body)?;
        self.execute(Method::Post, path, Vec::new(), Some(body)).await?;
        Ok(())
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = encode(body)?;
        let value = self.execute(Method::Put, path, Vec::new(), Some(body)).await?;
        decode(value)
    }

    /// PUT where the response body is irrelevant to the caller.
    pub async fn put_unit<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        let body = encode(body)?;
        self.execute(Method::Put, path, Vec::new(), Some(body)).await?;
        Ok(())
    }

    pub async fn delete_unit(&self, path: &str) -> Result<(), ApiError> {
        self.execute(Method::Delete, path, Vec::new(), None).await?;
        Ok(())
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|err| ApiError::malformed("failed to encode request body", err))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|err| ApiError::malformed("malformed response body", err))
}
