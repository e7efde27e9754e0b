//! HTTP edge of the error model.
//!
//! Every failure leaves the daemon as `{detail}` JSON. Body and path
//! rejections from axum are folded into `MalformedRequest` by the `Api*`
//! extractors so clients never see axum's plain-text errors.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{FromRequest, FromRequestParts},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pact_service::ServiceError;
use tracing::error;

use crate::api_types::ErrorBody;

#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::BlueprintInUse { .. } => StatusCode::CONFLICT,
            ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::InvalidTransition { .. }
            | ServiceError::Immutable { .. }
            | ServiceError::MalformedRequest(_)
            | ServiceError::ForeignField { .. }
            | ServiceError::ValidationError(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        Self(ServiceError::malformed(r.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(r: PathRejection) -> Self {
        Self(ServiceError::malformed(r.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        Self(ServiceError::malformed(r.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self.0 {
            ServiceError::InvalidTransition { current, attempted } => ErrorBody {
                detail: self.0.to_string(),
                current_status: Some(*current),
                attempted_status: Some(*attempted),
            },
            ServiceError::Store(e) => {
                error!("store failure: {e:#}");
                ErrorBody::detail("internal error")
            }
            other => ErrorBody::detail(other.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

/// `axum::Json` with `{detail}` rejections.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Path` with `{detail}` rejections.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// `axum::extract::Query` with `{detail}` rejections.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
