use crate::{model_service::LoadError, preprocess::PreprocessError, service::ServiceError};
use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Request failures. The display text is the body returned to the caller;
/// underlying causes are only logged.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No image file provided")]
    MissingImage,
    #[error("No image file selected")]
    EmptyFileName,
    #[error("Image file too large")]
    TooLarge,
    #[error("Invalid image format")]
    InvalidImage(#[source] PreprocessError),
    #[error("Model not available")]
    ModelUnavailable(#[source] LoadError),
    #[error("Internal server error")]
    Internal(#[source] ServiceError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingImage | ApiError::EmptyFileName | ApiError::InvalidImage(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ModelUnavailable(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            ApiError::MissingImage | ApiError::EmptyFileName => "missing_image",
            ApiError::TooLarge => "too_large",
            ApiError::InvalidImage(_) => "invalid_image",
            ApiError::ModelUnavailable(_) => "model_unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn from_multipart(err: MultipartError) -> Self {
        tracing::warn!("Failed to read multipart upload: {}", err);
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::TooLarge
        } else {
            ApiError::MissingImage
        }
    }

    pub fn from_json(err: JsonRejection) -> Self {
        tracing::warn!("Failed to read JSON upload: {}", err);
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::TooLarge
        } else {
            ApiError::MissingImage
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Model(e) => ApiError::ModelUnavailable(e),
            ServiceError::Preprocess(e) => ApiError::InvalidImage(e),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::ModelUnavailable(e) => tracing::error!("Model not available: {}", e),
            ApiError::Internal(e) => tracing::error!("Error in prediction: {}", e),
            ApiError::InvalidImage(e) => tracing::info!("Rejected upload: {}", e),
            _ => {}
        }

        (
            self.status(),
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
