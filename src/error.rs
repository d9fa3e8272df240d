use actix_web::http::StatusCode;
use actix_web::{error, HttpRequest, HttpResponse, ResponseError};
use thiserror::Error;
use uuid::Uuid;

use crate::models::ApiResponse;
use crate::services::{AuthError, PostgresError};

/// Request-level failures of the discovery endpoints
///
/// Every variant renders the standard envelope with `success: false`.
/// Store and internal failures are logged in full but answered with an
/// opaque message.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(#[from] AuthError),

    #[error("Profile not found for user {0}")]
    ProfileNotFound(Uuid),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Store error: {0}")]
    Store(#[from] PostgresError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DiscoveryError {
    fn public_message(&self) -> String {
        match self {
            Self::Unauthenticated(_) => "Unauthenticated".to_string(),
            Self::ProfileNotFound(_) => "User profile not found".to_string(),
            Self::BadRequest(message) => message.clone(),
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl ResponseError for DiscoveryError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::ProfileNotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Discovery request failed: {}", self);
        }

        HttpResponse::build(status).json(ApiResponse {
            success: false,
            data: serde_json::Value::Null,
            msg: self.public_message(),
            pagination: None,
        })
    }
}

/// Handle query string errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("Query payload error on {}: {}", req.path(), err);
    DiscoveryError::BadRequest(format!("Invalid query: {}", err)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_internal_errors_are_opaque() {
        let err = DiscoveryError::Internal("pool exhausted at 10.0.0.3".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["success"], false);
        assert!(json["data"].is_null());
        assert_eq!(json["msg"], "Internal server error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            DiscoveryError::Unauthenticated(AuthError::MissingToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            DiscoveryError::ProfileNotFound(Uuid::nil()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            DiscoveryError::BadRequest("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
