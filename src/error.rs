use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::models::order::DeliveryPhase;
use crate::models::rider::DocumentStatus;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("documents not approved: {status}")]
    UnverifiedDocuments { status: DocumentStatus },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid transition: {from} -> {requested}")]
    InvalidTransition {
        from: DeliveryPhase,
        requested: DeliveryPhase,
    },

    #[error("no active delivery for this rider")]
    NoActiveDelivery,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable discriminant carried in every error body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Forbidden(_) => "forbidden",
            AppError::UnverifiedDocuments { .. } => "unverified_documents",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::NoActiveDelivery => "no_active_delivery",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) | AppError::UnverifiedDocuments { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidTransition { .. } | AppError::NoActiveDelivery => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<DocumentStatus>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let reason = match &self {
            AppError::UnverifiedDocuments { status } => Some(*status),
            _ => None,
        };

        let body = Json(ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                message: self.to_string(),
                reason,
            },
        });

        (self.status(), body).into_response()
    }
}
