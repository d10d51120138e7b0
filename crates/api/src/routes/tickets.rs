//! Public ticket endpoints: coupon check, status, purchase, redeem

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use blackwell_ticketing::{
    DenialReason, PurchaseRequest, RedemptionOutcome, TicketingError,
};

use crate::error::{ApiError, ApiResult};
use crate::routes::extract_client_ip;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckCouponBody {
    pub code: String,
}

/// Preview what a coupon would do to the ticket price. Mirrors the pricing
/// engine exactly, including the fail-open fallback, so the checkout page
/// never promises a discount issuance would not honor.
pub async fn check_coupon(
    State(state): State<AppState>,
    Json(body): Json<CheckCouponBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let code = body.code.trim();
    if code.is_empty() {
        return Err(ApiError::Validation("Coupon code is required".to_string()));
    }

    let quote = state
        .ticketing
        .pricing
        .compute_final_price(state.config.base_price_cents, Some(code))
        .await?;

    match quote.coupon {
        Some(coupon) => Ok(Json(json!({
            "valid": true,
            "code": coupon.code,
            "discount_percent": coupon.discount_percent,
            "final_price_cents": quote.final_cents,
        }))),
        None => Ok(Json(json!({
            "valid": false,
            "final_price_cents": quote.final_cents,
        }))),
    }
}

#[derive(Debug, Deserialize)]
pub struct TicketStatusBody {
    pub email: String,
    pub movie_name: Option<String>,
}

/// Whether an unexpired ticket exists for this email. Returns only the
/// expiry, never the access code; the code travels by email.
pub async fn ticket_status(
    State(state): State<AppState>,
    Json(body): Json<TicketStatusBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::Validation("Email is required".to_string()));
    }

    let movie_name = body
        .movie_name
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(&state.config.movie_name)
        .to_string();

    let ticket = state
        .ticketing
        .store
        .find_unexpired_by_email_and_movie(&email, &movie_name)
        .await
        .map_err(ApiError::from)?;

    match ticket {
        Some(ticket) => Ok(Json(json!({
            "active": true,
            "movie_name": ticket.movie_name,
            "expiry_date": ticket
                .expiry_date
                .format(&time::format_description::well_known::Rfc3339)
                .map_err(|_| ApiError::Internal)?,
        }))),
        None => Ok(Json(json!({ "active": false }))),
    }
}

#[derive(Debug, Deserialize)]
pub struct ResendBody {
    pub email: String,
    pub movie_name: Option<String>,
}

/// Re-send the access code email for an unexpired ticket, so a purchaser
/// who lost the original email can recover it. The code itself never
/// appears in the response.
pub async fn resend_code(
    State(state): State<AppState>,
    Json(body): Json<ResendBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let expiry = state
        .ticketing
        .issuance
        .resend_code(&body.email, body.movie_name.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Access code re-sent, check your inbox",
        "expiry_date": expiry
            .format(&time::format_description::well_known::Rfc3339)
            .map_err(|_| ApiError::Internal)?,
    })))
}

const DUPLICATE_TICKET_MESSAGE: &str =
    "An active ticket already exists for this email; the access code has been re-sent";

#[derive(Debug, Deserialize)]
pub struct PurchaseBody {
    pub email: String,
    pub movie_name: Option<String>,
    pub payment_reference: Option<String>,
    pub coupon_code: Option<String>,
}

/// Purchase a ticket. Client errors come back as `{success:false, message}`
/// so the checkout page can render them verbatim.
pub async fn purchase(
    State(state): State<AppState>,
    Json(body): Json<PurchaseBody>,
) -> Response {
    let request = PurchaseRequest {
        email: body.email,
        movie_name: body.movie_name,
        payment_reference: body.payment_reference,
        coupon_code: body.coupon_code,
    };

    match state.ticketing.issuance.purchase(request).await {
        Ok(ticket) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "code": ticket.code,
                "movie_name": ticket.movie_name,
                "price_paid_cents": ticket.price_paid_cents,
                "coupon_used": ticket.coupon_used,
                "coupon_fallback": ticket.coupon_fallback,
                "expiry_date": ticket
                    .expiry_date
                    .format(&time::format_description::well_known::Rfc3339)
                    .unwrap_or_default(),
            })),
        )
            .into_response(),
        Err(TicketingError::DuplicateActiveTicket { .. }) => {
            // The code is not repeated here; issuance has already re-queued
            // the email, and holding the inbox proves ownership.
            (
                StatusCode::CONFLICT,
                Json(json!({
                    "success": false,
                    "message": DUPLICATE_TICKET_MESSAGE,
                })),
            )
                .into_response()
        }
        Err(TicketingError::GatewayUnavailable(msg)) => {
            tracing::error!(error = %msg, "Purchase blocked by gateway outage");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "success": false,
                    "message": "Payment gateway unavailable, please try again",
                })),
            )
                .into_response()
        }
        Err(e) if e.is_caller_error() => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": e.to_string() })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Purchase failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Something went wrong, please try again",
                })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RedeemBody {
    pub code: String,
    pub movie_name: Option<String>,
}

/// Redeem an access code from the requesting device. Rate limited per
/// device so code guessing is impractical.
pub async fn redeem(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<RedeemBody>,
) -> Response {
    let device = extract_client_ip(&headers, &ConnectInfo(addr));

    let rate = state
        .rate_limiter
        .check(&device, state.config.redeem_rate_limit)
        .await;
    if !rate.allowed {
        tracing::warn!(device = %device, "Redemption rate limit hit");
        return ApiError::RateLimited {
            retry_after_seconds: rate.retry_after_seconds.unwrap_or(60),
        }
        .into_response();
    }

    let movie_name = body
        .movie_name
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(&state.config.movie_name)
        .to_string();

    match state
        .ticketing
        .redemption
        .redeem(&body.code, &movie_name, &device)
        .await
    {
        Ok(RedemptionOutcome::Granted { already_bound }) => (
            StatusCode::OK,
            Json(json!({
                "valid": true,
                "already_bound": already_bound,
                "message": "Access granted",
            })),
        )
            .into_response(),
        Ok(RedemptionOutcome::Denied(reason)) => {
            let status = match reason {
                DenialReason::InvalidCode => StatusCode::NOT_FOUND,
                DenialReason::Expired | DenialReason::DeviceLimitReached => StatusCode::FORBIDDEN,
            };
            (
                status,
                Json(json!({
                    "valid": false,
                    "reason": reason,
                    "message": reason.message(),
                })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Redemption failed");
            ApiError::from(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use sqlx::postgres::PgPoolOptions;

    use blackwell_shared::RateLimiter;
    use blackwell_ticketing::{Catalog, PaymentVerifier, TicketEmailService, TicketingService};

    use crate::config::Config;

    // State over a lazy pool: nothing here may reach the database.
    fn test_state() -> AppState {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/blackwell_test")
            .unwrap();
        let catalog = Catalog {
            movie_name: "Cards on the Table".to_string(),
            base_price_cents: 250_000,
        };
        let verifier = PaymentVerifier::new("sk_test_secret", "http://127.0.0.1:1");
        let ticketing =
            TicketingService::new(pool.clone(), catalog, verifier, TicketEmailService::from_env());

        AppState {
            pool,
            config: Config {
                bind_address: "0.0.0.0:5555".to_string(),
                database_url: String::new(),
                admin_api_secret: "0123456789abcdef0123".to_string(),
                movie_name: "Cards on the Table".to_string(),
                base_price_cents: 250_000,
                redeem_rate_limit: 30,
            },
            ticketing: Arc::new(ticketing),
            rate_limiter: RateLimiter::new_in_memory(),
        }
    }

    #[tokio::test]
    async fn resend_rejects_blank_email() {
        let result = resend_code(
            State(test_state()),
            Json(ResendBody {
                email: "   ".to_string(),
                movie_name: None,
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn duplicate_conflict_mentions_the_resent_email() {
        assert!(DUPLICATE_TICKET_MESSAGE.contains("re-sent"));
    }
}
