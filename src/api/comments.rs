//! Comment endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http::{ApiError, HttpClient};

/// A comment on a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub user_id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Posts a comment on a project.
pub async fn create(
    http: &HttpClient,
    project_id: &str,
    content: &str,
) -> Result<Comment, ApiError> {
    http.post(
        &format!("/comments/project/{project_id}"),
        &json!({ "content": content }),
    )
    .await
}

/// Lists every comment a user has written.
pub async fn list_by_user(http: &HttpClient, user_id: &str) -> Result<Vec<Comment>, ApiError> {
    http.get(&format!("/comments/user/{user_id}")).await
}
