use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::extract::{Category, ExtractError};

/// JSON `{error}` response for the extraction endpoints
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    pub fn extraction(category: Category, error: &ExtractError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: category.failure_message(error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_extraction_error_is_a_client_error() {
        let errors = [
            ExtractError::InvalidUrl,
            ExtractError::PrivateOrMissing,
            ExtractError::NoVideoFound,
            ExtractError::Unsupported,
            ExtractError::Upstream(anyhow::anyhow!("tcp reset")),
        ];
        for error in &errors {
            for category in [Category::Instagram, Category::Twitter, Category::Generic] {
                let api_error = ApiError::extraction(category, error);
                assert_eq!(api_error.status, StatusCode::BAD_REQUEST);
                assert!(!api_error.message.contains("tcp reset"));
            }
        }
    }
}
