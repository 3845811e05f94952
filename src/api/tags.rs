//! Technology tag endpoints.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http::{ApiError, HttpClient};

/// A technology tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
}

pub async fn list(http: &HttpClient) -> Result<Vec<Tag>, ApiError> {
    http.get("/tags").await
}

pub async fn get(http: &HttpClient, id: &str) -> Result<Tag, ApiError> {
    http.get(&format!("/tags/{id}")).await
}

pub async fn get_by_name(http: &HttpClient, name: &str) -> Result<Tag, ApiError> {
    http.get(&format!("/tags/name/{name}")).await
}

pub async fn create(http: &HttpClient, name: &str) -> Result<Tag, ApiError> {
    http.post("/tags", &json!({ "name": name })).await
}

pub async fn update(http: &HttpClient, id: &str, name: &str) -> Result<Tag, ApiError> {
    http.put(&format!("/tags/{id}"), &json!({ "name": name })).await
}

pub async fn delete(http: &HttpClient, id: &str) -> Result<(), ApiError> {
    http.delete_unit(&format!("/tags/{id}")).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        let tag = Tag {
            id: "t1".to_string(),
            name: "rust".to_string(),
        };

        let json = serde_json::to_string(&tag).unwrap();
        let parsed: Tag = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, tag.id);
        assert_eq!(parsed.name, tag.name);
    }
}
