//! Handler errors and their envelope mapping.

use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::storage::StoreError;
use crate::types::ParseTimestampError;

use super::envelope::{ApiErrorResponse, ErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    /// A fetch was superseded by a newer navigation
    #[error("{0}")]
    Stale(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ParseTimestampError> for ApiError {
    fn from(err: ParseTimestampError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(msg) => ApiErrorResponse::bad_request(msg),
            Self::NotFound(msg) => ApiErrorResponse::not_found(msg),
            Self::Stale(msg) => ApiErrorResponse::build(ErrorCode::Stale, msg),
            Self::Store(err @ StoreError::Duplicate { .. }) => {
                ApiErrorResponse::build(ErrorCode::Duplicate, err.to_string())
            }
            Self::Store(err) => {
                error!(error = %err, "Status store query failed");
                ApiErrorResponse::internal("Failed to load status records")
            }
        }
    }
}

pub type ApiResult = Result<Response, ApiError>;
