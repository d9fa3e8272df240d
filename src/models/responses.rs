use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope shared by every discovery endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pagination: Option<PageInfo>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, msg: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            msg: msg.into(),
            pagination: None,
        }
    }

    pub fn with_pagination(mut self, pagination: PageInfo) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub next_offset: Option<usize>,
}

/// Public shape of a discovery candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateView {
    pub id: Uuid,
    pub first_name: String,
    pub age: Option<u32>,
    pub gender: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub height_inches: Option<i32>,
    pub body_type: Option<String>,
    pub ethnicity: Vec<String>,
    pub religion: Option<String>,
    pub education: Option<String>,
    pub smoking: Option<String>,
    pub drinking: Option<String>,
    pub marijuana: Option<String>,
    pub have_children: Option<String>,
    pub want_children: Option<String>,
    pub zodiac: Option<String>,
    pub interests: Vec<String>,
    pub bio: Option<String>,
    pub is_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub distance_in_km: Option<f64>,
    pub has_liked_me: bool,
    pub profile_image_url: Option<String>,
    pub photo_urls: Vec<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_omits_missing_pagination() {
        let body = serde_json::to_value(ApiResponse::ok(Vec::<u8>::new(), "ok")).unwrap();

        assert_eq!(body["success"], true);
        assert!(body["data"].as_array().unwrap().is_empty());
        assert!(body.get("pagination").is_none());
    }
}
