use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl Error {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AssetMissing(_) => "ASSET_MISSING",
            Self::InvalidLabel { .. } => "INVALID_LABEL",
            Self::InvalidUpload(_) => "BAD_REQUEST",
            Self::InvalidImage(_) => "INVALID_IMAGE",
            Self::Inference(_) => "INFERENCE_FAILED",
            Self::Image(_) | Self::Io(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidUpload(_) | Self::InvalidImage(_) => StatusCode::BAD_REQUEST,
            Self::Inference(_) => StatusCode::BAD_GATEWAY,
            Self::AssetMissing(_)
            | Self::InvalidLabel { .. }
            | Self::Image(_)
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Server-side failures are summarized
    /// so paths and upstream bodies stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidUpload(_) | Self::InvalidImage(_) => self.to_string(),
            Self::Inference(_) => "vision model failed to answer".to_string(),
            Self::AssetMissing(_) => "sprite base asset is not installed".to_string(),
            Self::InvalidLabel { layer, .. } => format!("unusable label for {} layer", layer),
            Self::Image(_) | Self::Io(_) => "internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            tracing::warn!(error = %self, code = self.error_code(), "Rejected request");
        } else {
            tracing::error!(error = %self, code = self.error_code(), "Request failed");
        }

        let body = ErrorResponse {
            error: self.public_message(),
            code: self.error_code(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use std::path::PathBuf;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::invalid_image("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::invalid_upload("no file").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::from(InferenceError::BadResponse("x".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::AssetMissing(PathBuf::from("x")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err = Error::AssetMissing(PathBuf::from(
            "/srv/secret/assets/base_body/trainer_base.png",
        ));
        assert!(!err.public_message().contains("/srv/secret"));

        let err = Error::from(InferenceError::Rejected {
            status: 401,
            body: "invalid api key sk-123".to_string(),
        });
        assert!(!err.public_message().contains("sk-123"));
        assert_eq!(err.error_code(), "INFERENCE_FAILED");
    }
}
