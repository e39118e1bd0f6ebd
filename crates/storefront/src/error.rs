//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before responding; every error renders as
//! `{ "success": false, "message": ..., "error"?: ... }`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use shonifity_core::{CartMutationError, PaymentStatus};

use crate::db::RepositoryError;
use crate::payments::PaymentError;
use crate::services::cart::CartError;
use crate::services::checkout::CheckoutError;
use crate::services::coupons::CouponError;

const INTERNAL_MESSAGE: &str = "Internal server error";
const ORDER_RECORD_MESSAGE: &str = "Payment successful but failed to create order record";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Coupon error: {0}")]
    Coupon(#[from] CouponError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

impl ErrorBody {
    fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: None,
            payment_status: None,
            session_id: None,
        }
    }

    fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Message the provider gave, without our own wrapping.
fn provider_message(err: &PaymentError) -> String {
    match err {
        PaymentError::Api { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn repository_parts(err: &RepositoryError) -> (StatusCode, ErrorBody) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, ErrorBody::new("Not found")),
        RepositoryError::Conflict(what) => (
            StatusCode::CONFLICT,
            ErrorBody::new(format!("Conflict: {what}")),
        ),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::new(INTERNAL_MESSAGE),
        ),
    }
}

fn cart_parts(err: &CartError) -> (StatusCode, ErrorBody) {
    match err {
        CartError::ProductNotFound(_) => (StatusCode::NOT_FOUND, ErrorBody::new("Product not found")),
        CartError::UserNotFound(_) => (StatusCode::NOT_FOUND, ErrorBody::new("User not found")),
        CartError::Mutation(CartMutationError::NotInCart(_)) => (
            StatusCode::NOT_FOUND,
            ErrorBody::new("Product not found in cart"),
        ),
        CartError::Mutation(CartMutationError::NegativeQuantity(_)) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("Quantity must be non-negative"),
        ),
        CartError::Mutation(CartMutationError::QuantityTooLarge(_)) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("Quantity is too large"),
        ),
        CartError::Repository(e) => repository_parts(e),
    }
}

fn coupon_parts(err: &CouponError) -> (StatusCode, ErrorBody) {
    match err {
        CouponError::Repository(e) => repository_parts(e),
        CouponError::CodeExhausted => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::new(INTERNAL_MESSAGE),
        ),
    }
}

fn checkout_parts(err: &CheckoutError) -> (StatusCode, ErrorBody) {
    match err {
        CheckoutError::EmptyProducts => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("Invalid or empty products array"),
        ),
        CheckoutError::MissingSessionId => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("Session ID is required"),
        ),
        CheckoutError::InvalidQuantity(_)
        | CheckoutError::UnsupportedCurrency(_)
        | CheckoutError::AmountOverflow => (StatusCode::BAD_REQUEST, ErrorBody::new(err.to_string())),
        CheckoutError::UnknownProduct(id) => (
            StatusCode::NOT_FOUND,
            ErrorBody::new(format!("Product {id} not found")),
        ),
        CheckoutError::SessionCreation(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::new("Error processing checkout").with_error(provider_message(e)),
        ),
        CheckoutError::SessionRetrieval(e) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("Invalid or expired payment session").with_error(provider_message(e)),
        ),
        CheckoutError::PaymentNotCompleted { status, session_id } => {
            let mut body = ErrorBody::new("Payment was not completed");
            body.payment_status = Some(*status);
            body.session_id = Some(session_id.clone());
            (StatusCode::BAD_REQUEST, body)
        }
        CheckoutError::InvalidMetadata(_) | CheckoutError::OrderPersistence(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::new(ORDER_RECORD_MESSAGE),
        ),
        CheckoutError::Repository(e) => repository_parts(e),
        CheckoutError::Coupon(e) => coupon_parts(e),
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, ErrorBody) {
        match self {
            Self::Database(e) => repository_parts(e),
            Self::Cart(e) => cart_parts(e),
            Self::Coupon(e) => coupon_parts(e),
            Self::Checkout(e) => checkout_parts(e),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, ErrorBody::new(what.clone())),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, ErrorBody::new(msg.clone())),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, ErrorBody::new(msg.clone())),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorBody::new(msg.clone())),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody::new("Too many requests, please slow down"),
            ),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new(INTERNAL_MESSAGE),
            ),
        }
    }

    /// HTTP status this error renders with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.parts();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(format!("Invalid path parameter: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for a user action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}
