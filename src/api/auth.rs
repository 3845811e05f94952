//! Authentication and account endpoints.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http::{ApiError, HttpClient};

/// Payload returned by login and registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Server-assigned user id.
    pub id: String,
    /// Bearer token for subsequent requests.
    pub token: String,
}

/// A platform user profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub git_hub_url: Option<String>,
    pub discord_url: Option<String>,
    pub profile_image_url: Option<String>,
    pub role: Role,
}

/// Platform role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Moderator,
    Admin,
}

/// Exchanges credentials for a session token.
pub async fn login(http: &HttpClient, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
    http.post("/auth/login", &json!({ "email": email, "password": password }))
        .await
}

/// Creates an account. The response carries a session token, but the
/// account stays unverified until the emailed link is followed.
pub async fn register(
    http: &HttpClient,
    username: &str,
    email: &str,
    password: &str,
) -> Result<LoginResponse, ApiError> {
    http.post(
        "/auth/register",
        &json!({ "username": username, "email": email, "password": password }),
    )
    .await
}

/// Fetches the profile of the current session's user.
pub async fn get_me(http: &HttpClient) -> Result<User, ApiError> {
    http.get("/auth/me").await
}

pub async fn forgot_password(http: &HttpClient, email: &str) -> Result<(), ApiError> {
    http.post_unit("/auth/forgot-password", &json!({ "email": email }))
        .await
}

pub async fn reset_password(
    http: &HttpClient,
    token: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    http.post_unit(
        "/auth/reset-password",
        &json!({ "token": token, "newPassword": new_password }),
    )
    .await
}

pub async fn change_password(
    http: &HttpClient,
    current_password: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    http.post_unit(
        "/auth/change-password",
        &json!({ "currentPassword": current_password, "newPassword": new_password }),
    )
    .await
}

pub async fn verify_email(http: &HttpClient, token: &str) -> Result<(), ApiError> {
    http.post_unit("/auth/verify-email", &json!({ "token": token }))
        .await
}

pub async fn resend_verification(http: &HttpClient, email: &str) -> Result<(), ApiError> {
    http.post_unit("/auth/resend-verification", &json!({ "email": email }))
        .await
}
