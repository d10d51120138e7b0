//! API error type and HTTP mapping
//!
//! Domain denials (expired ticket, device limit) are NOT ApiErrors — the
//! ticket handlers answer those with `{valid:false, message}` bodies and a
//! client-error status. This type covers input validation, conflicts,
//! admin auth, and system failures.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use blackwell_ticketing::TicketingError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Payment gateway unavailable, please try again")]
    UpstreamUnavailable(String),

    #[error("Database error")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::RateLimited {
                retry_after_seconds,
            } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({
                        "error": self.to_string(),
                        "retry_after_seconds": retry_after_seconds,
                    })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_seconds));
                return response;
            }
            ApiError::UpstreamUnavailable(msg) => {
                tracing::error!(error = %msg, "Payment gateway unavailable");
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            ApiError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Database(e.to_string())
    }
}

/// Mapping used by admin handlers, where the full ticketing taxonomy can
/// surface. Ticket purchase/redeem handlers match variants themselves to
/// shape their `{success,...}` / `{valid,...}` bodies.
impl From<TicketingError> for ApiError {
    fn from(e: TicketingError) -> Self {
        match e {
            TicketingError::DuplicateCoupon(code) => {
                ApiError::Conflict(format!("Coupon code already exists: {}", code))
            }
            TicketingError::DuplicateActiveTicket { .. } => ApiError::Conflict(e.to_string()),
            TicketingError::InvalidDiscount(_)
            | TicketingError::MissingEmail
            | TicketingError::MissingPaymentReference
            | TicketingError::PaymentDeclined(_)
            | TicketingError::AmountMismatch { .. } => ApiError::Validation(e.to_string()),
            TicketingError::CouponNotFound | TicketingError::TicketNotFound => ApiError::NotFound,
            TicketingError::Database(err) => ApiError::Database(err.to_string()),
            // A hung or failing gateway is not our outage; kept distinct so
            // the client can retry with a fresh reference.
            TicketingError::GatewayUnavailable(msg) => ApiError::UpstreamUnavailable(msg),
            TicketingError::CodeGenerationExhausted | TicketingError::Internal(_) => {
                tracing::error!(error = %e, "Ticketing system error");
                ApiError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(status_of(ApiError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ApiError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ApiError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Conflict("dup".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ApiError::RateLimited {
                retry_after_seconds: 30
            }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(ApiError::UpstreamUnavailable("timed out".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_of(ApiError::Internal), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn rate_limited_carries_retry_after_header() {
        let response = ApiError::RateLimited {
            retry_after_seconds: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER),
            Some(&HeaderValue::from(42u64))
        );
    }

    #[test]
    fn gateway_failure_stays_distinct_from_internal() {
        let err: ApiError = TicketingError::GatewayUnavailable("502 from upstream".into()).into();
        assert!(matches!(err, ApiError::UpstreamUnavailable(_)));
    }

    #[test]
    fn missing_ticket_maps_to_not_found() {
        let err: ApiError = TicketingError::TicketNotFound.into();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[test]
    fn duplicate_coupon_maps_to_conflict() {
        let err: ApiError = TicketingError::DuplicateCoupon("DAVID10".into()).into();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn invalid_discount_maps_to_validation() {
        let err: ApiError = TicketingError::InvalidDiscount(150).into();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
