//! Project endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::http::{ApiError, HttpClient};

use super::comments::Comment;
use super::{resolve_page, Page};

/// A project with its full detail, including comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: String,
    pub git_hub_url: String,
    pub discord_url: Option<String>,
    pub owner_id: String,
    pub owner_username: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// Compact project shape used in listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub owner_id: String,
    pub owner_username: String,
    pub owner_profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub comment_count: i64,
    pub tags: Vec<String>,
}

/// Body for project creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub git_hub_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord_url: Option<String>,
    pub tags: Vec<String>,
}

/// Partial update body; absent fields are left untouched by the server.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_hub_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Search and tag filters for the explore listing.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilters {
    pub search: Option<String>,
    pub tags: Vec<String>,
}

/// Lists projects with pagination and optional filters. Tags are sent as a
/// single comma-joined parameter.
pub async fn list(
    http: &HttpClient,
    page: Option<u32>,
    size: Option<u32>,
    filters: &ProjectFilters,
) -> Result<Page<ProjectListItem>, ApiError> {
    let (page, size) = resolve_page(page, size);
    let mut query = vec![
        ("page".to_string(), page.to_string()),
        ("size".to_string(), size.to_string()),
    ];
    if let Some(search) = filters.search.as_deref().filter(|s| !s.is_empty()) {
        query.push(("search".to_string(), search.to_string()));
    }
    if !filters.tags.is_empty() {
        query.push(("tags".to_string(), filters.tags.join(",")));
    }
    http.get_query("/projects", query).await
}

pub async fn get(http: &HttpClient, id: &str) -> Result<Project, ApiError> {
    http.get(&format!("/projects/{id}")).await
}

pub async fn create(http: &HttpClient, project: &NewProject) -> Result<Project, ApiError> {
    http.post("/projects", project).await
}

pub async fn update(http: &HttpClient, id: &str, patch: &ProjectPatch) -> Result<(), ApiError> {
    http.put_unit(&format!("/projects/{id}"), patch).await
}

pub async fn delete(http: &HttpClient, id: &str) -> Result<(), ApiError> {
    http.delete_unit(&format!("/projects/{id}")).await
}

/// Lists the projects owned by one user.
pub async fn list_by_user(
    http: &HttpClient,
    user_id: &str,
    page: Option<u32>,
    size: Option<u32>,
) -> Result<Vec<ProjectListItem>, ApiError> {
    let (page, size) = resolve_page(page, size);
    http.get_query(
        &format!("/projects/user/{user_id}"),
        vec![
            ("pageNumber".to_string(), page.to_string()),
            ("pageSize".to_string(), size.to_string()),
        ],
    )
    .await
}

/// Lists the projects carrying one tag.
pub async fn list_by_tag(
    http: &HttpClient,
    tag_name: &str,
    page: Option<u32>,
    size: Option<u32>,
) -> Result<Vec<ProjectListItem>, ApiError> {
    let (page, size) = resolve_page(page, size);
    http.get_query(
        &format!("/projects/tag/{tag_name}"),
        vec![
            ("pageNumber".to_string(), page.to_string()),
            ("pageSize".to_string(), size.to_string()),
        ],
    )
    .await
}
