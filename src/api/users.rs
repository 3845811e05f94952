//! User profile endpoints.

use serde::Serialize;
use serde_json::json;

use crate::http::{ApiError, HttpClient};

use super::auth::User;
use super::{resolve_page, Page};

/// Partial profile update; absent fields are left untouched. The role is
/// sent as the server's numeric code, not the display name.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_hub_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<u8>,
}

pub async fn list(
    http: &HttpClient,
    page: Option<u32>,
    size: Option<u32>,
) -> Result<Page<User>, ApiError> {
    let (page, size) = resolve_page(page, size);
    http.get_query(
        "/users",
        vec![
            ("page".to_string(), page.to_string()),
            ("size".to_string(), size.to_string()),
        ],
    )
    .await
}

pub async fn get(http: &HttpClient, id: &str) -> Result<User, ApiError> {
    http.get(&format!("/users/{id}")).await
}

pub async fn update(http: &HttpClient, id: &str, patch: &UserPatch) -> Result<User, ApiError> {
    http.put(&format!("/users/{id}"), patch).await
}

/// Moderator-only role change.
pub async fn update_role(http: &HttpClient, user_id: &str, role: u8) -> Result<(), ApiError> {
    http.put_unit(&format!("/users/{user_id}/role"), &json!({ "role": role }))
        .await
}
