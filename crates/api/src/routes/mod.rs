//! HTTP routes

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;
use axum::middleware;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::json;

use crate::auth::require_admin;
use crate::state::AppState;

pub mod admin;
pub mod ratings;
pub mod tickets;

/// Build the full application router.
pub fn create_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/tickets", get(admin::list_tickets))
        .route("/coupons", post(admin::create_coupon).get(admin::list_coupons))
        .route(
            "/coupons/{id}",
            patch(admin::toggle_coupon).delete(admin::delete_coupon),
        )
        .route(
            "/affiliates",
            post(admin::create_affiliate).get(admin::list_affiliates),
        )
        .route("/affiliates/{id}", patch(admin::toggle_affiliate))
        .route("/ratings", get(admin::list_ratings))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/api/coupons/check", post(tickets::check_coupon))
        .route("/api/tickets/status", post(tickets::ticket_status))
        .route("/api/tickets/purchase", post(tickets::purchase))
        .route("/api/tickets/resend", post(tickets::resend_code))
        .route("/api/tickets/redeem", post(tickets::redeem))
        .route("/api/ratings", post(ratings::submit_rating))
        .route("/api/ratings/{movie}", get(ratings::rating_stats))
        .nest("/api/admin", admin_routes)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Device identifier for the requesting client: the first address in
/// `x-forwarded-for` when present (the service runs behind a proxy in
/// production), otherwise the socket peer address.
pub fn extract_client_ip(headers: &HeaderMap, connect_info: &ConnectInfo<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| connect_info.0.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn connect_info() -> ConnectInfo<SocketAddr> {
        ConnectInfo("10.0.0.1:54321".parse().unwrap())
    }

    #[test]
    fn forwarded_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.2"),
        );
        assert_eq!(extract_client_ip(&headers, &connect_info()), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_peer_address() {
        let headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers, &connect_info()), "10.0.0.1");
    }

    #[test]
    fn empty_forwarded_header_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        assert_eq!(extract_client_ip(&headers, &connect_info()), "10.0.0.1");
    }
}
