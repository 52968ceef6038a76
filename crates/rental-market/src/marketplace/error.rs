use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::identity::IdentityError;
use super::store::StoreError;

/// Error raised by the marketplace lifecycle services.
///
/// `NotFound` covers both absent rows and rows hidden from the actor, so
/// callers cannot discover records they are not entitled to see.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("authentication credentials were not provided or are invalid")]
    Unauthenticated,
    #[error("you do not have permission to perform this action")]
    Forbidden,
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    /// Request body that could not be decoded into the expected payload.
    #[error("malformed request body: {detail}")]
    MalformedBody {
        field: Option<String>,
        detail: String,
    },
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl MarketplaceError {
    pub fn not_found(resource: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            MarketplaceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            MarketplaceError::Forbidden => StatusCode::FORBIDDEN,
            MarketplaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            MarketplaceError::Validation { .. } | MarketplaceError::MalformedBody { .. } => {
                StatusCode::BAD_REQUEST
            }
            MarketplaceError::Storage(_) | MarketplaceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<IdentityError> for MarketplaceError {
    fn from(value: IdentityError) -> Self {
        match value {
            IdentityError::Store(err) => Self::Storage(err),
            IdentityError::Hashing(detail) => Self::Internal(detail),
            IdentityError::InvalidCredentials
            | IdentityError::InvalidToken
            | IdentityError::TokenExpired => Self::Unauthenticated,
        }
    }
}

impl IntoResponse for MarketplaceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            MarketplaceError::Validation { field, message } => {
                json!({ "error": self.to_string(), "field": field, "detail": message })
            }
            MarketplaceError::MalformedBody {
                field: Some(field),
                detail,
            } => json!({ "error": self.to_string(), "field": field, "detail": detail }),
            MarketplaceError::MalformedBody { field: None, detail } => {
                json!({ "error": self.to_string(), "detail": detail })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
