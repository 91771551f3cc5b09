//! Error taxonomy shared by the stores and the HTTP layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unknown product or order id.
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: String },

    /// Checkout attempted against a cart with no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// Malformed quantity, bad payload field, or a cart policy violation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Underlying persistence unavailable. Surfaced, never retried here.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl StoreError {
    pub fn product_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { what: "product", id: id.into() }
    }

    pub fn order_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { what: "order", id: id.into() }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, self.to_string()),
            Self::EmptyCart | Self::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::Storage(source) => {
                tracing::error!(error = %source, "storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage error".to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_id() {
        let err = StoreError::product_not_found("p-404");
        assert_eq!(err.to_string(), "product p-404 not found");
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(
            StoreError::order_not_found("ORD-9").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            StoreError::EmptyCart.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StoreError::Storage(sqlx::Error::PoolClosed).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
