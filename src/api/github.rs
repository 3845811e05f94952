//! External repository provider (GitHub) endpoints.
//!
//! The import flow needs two independent credentials: the platform session
//! token and a provider access token obtained through an authorization-code
//! exchange. Every function here checks its preconditions locally and
//! fails with [`ApiError::ExternalCredentialMissing`] before any network
//! call when a credential is absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http::{ApiError, HttpClient};
use crate::session::SessionStore;

use super::projects::Project;

/// Repository metadata as the provider reports it. Field names follow the
/// provider's snake_case wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoDto {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stargazers_count: i64,
    pub forks_count: i64,
}

/// Result of the out-of-band authorization-code exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResponse {
    pub access_token: String,
    pub username: String,
}

fn require_external(session: &SessionStore) -> Result<String, ApiError> {
    session
        .external_token()
        .ok_or(ApiError::ExternalCredentialMissing("external provider token"))
}

/// Exchanges an authorization code for a provider access token. Persisting
/// the token is the caller's concern (see `AppContext::connect_github`).
pub async fn exchange_code(http: &HttpClient, code: &str) -> Result<ExchangeResponse, ApiError> {
    http.post("/auth/github/exchange-code", &json!({ "code": code }))
        .await
}

/// Lists the repositories visible to the connected provider account.
pub async fn list_repos(
    http: &HttpClient,
    session: &SessionStore,
) -> Result<Vec<RepoDto>, ApiError> {
    let token = require_external(session)?;
    http.get_query("/auth/github/repos", vec![("token".to_string(), token)])
        .await
}

/// Fetches one repository's metadata.
pub async fn get_repo(
    http: &HttpClient,
    session: &SessionStore,
    owner: &str,
    repo_name: &str,
) -> Result<RepoDto, ApiError> {
    let token = require_external(session)?;
    http.get_query(
        "/auth/github/repo",
        vec![
            ("owner".to_string(), owner.to_string()),
            ("repoName".to_string(), repo_name.to_string()),
            ("token".to_string(), token),
        ],
    )
    .await
}

/// Imports a repository as a new project.
///
/// Requires both credentials; checked in session-then-provider order so
/// the caller gets the most actionable error first.
pub async fn import_repo(
    http: &HttpClient,
    session: &SessionStore,
    owner: &str,
    repo_name: &str,
) -> Result<Project, ApiError> {
    if !session.is_authenticated() {
        return Err(ApiError::ExternalCredentialMissing("platform session token"));
    }
    let token = require_external(session)?;

    http.post_query(
        "/auth/github/import",
        vec![
            ("owner".to_string(), owner.to_string()),
            ("repoName".to_string(), repo_name.to_string()),
            ("token".to_string(), token),
        ],
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_dto_deserialize() {
        let json = r#"{
            "id": 42,
            "name": "devhub",
            "full_name": "org/devhub",
            "description": null,
            "html_url": "https://github.com/org/devhub",
            "language": "Rust",
            "topics": ["web", "collaboration"],
            "created_at": "2023-01-01T00:00:00Z",
            "updated_at": "2024-06-01T00:00:00Z",
            "stargazers_count": 120,
            "forks_count": 7
        }"#;

        let repo: RepoDto = serde_json::from_str(json).unwrap();
        assert_eq!(repo.full_name, "org/devhub");
        assert_eq!(repo.language.as_deref(), Some("Rust"));
        assert_eq!(repo.stargazers_count, 120);
    }

    #[test]
    fn test_repo_dto_missing_topics_default_to_empty() {
        let json = r#"{
            "id": 1,
            "name": "r",
            "full_name": "o/r",
            "description": null,
            "html_url": "https://github.com/o/r",
            "language": null,
            "created_at": "2023-01-01T00:00:00Z",
            "updated_at": "2023-01-01T00:00:00Z",
            "stargazers_count": 0,
            "forks_count": 0
        }"#;

        let repo: RepoDto = serde_json::from_str(json).unwrap();
        assert!(repo.topics.is_empty());
    }

    #[test]
    fn test_exchange_response_deserialize() {
        let json = r#"{"accessToken":"gh-token","username":"ada"}"#;
        let response: ExchangeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "gh-token");
        assert_eq!(response.username, "ada");
    }
}
