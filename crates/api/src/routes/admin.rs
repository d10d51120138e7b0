//! Operator endpoints
//!
//! All routes here sit behind the admin secret middleware. Handlers lean on
//! the `From<TicketingError>` mapping for error responses; the bodies are
//! plain JSON the dashboard renders directly.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Sales aggregates plus the coupon ledger, in one round trip for the
/// dashboard landing page.
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let summary = state.ticketing.reporting.sales_summary().await?;
    let coupons = state.ticketing.coupons.list().await?;

    Ok(Json(json!({
        "sales": summary,
        "coupons": coupons,
    })))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(25);
    let (tickets, total) = state.ticketing.reporting.recent_tickets(page, limit).await?;

    Ok(Json(json!({
        "tickets": tickets,
        "total": total,
        "page": page.max(1),
    })))
}

#[derive(Debug, Deserialize)]
pub struct CreateCouponBody {
    pub code: String,
    pub discount_percent: i32,
}

pub async fn create_coupon(
    State(state): State<AppState>,
    Json(body): Json<CreateCouponBody>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let coupon = state
        .ticketing
        .coupons
        .create(&body.code, body.discount_percent)
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "coupon": coupon }))))
}

pub async fn list_coupons(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let coupons = state.ticketing.coupons.list().await?;
    Ok(Json(json!({ "coupons": coupons })))
}

#[derive(Debug, Deserialize)]
pub struct ToggleBody {
    pub is_active: bool,
}

pub async fn toggle_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ToggleBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let coupon = state.ticketing.coupons.set_active(id, body.is_active).await?;
    Ok(Json(json!({ "coupon": coupon })))
}

pub async fn delete_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state.ticketing.coupons.delete(id).await?;
    Ok(Json(json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct CreateAffiliateBody {
    pub code: String,
    pub movie_name: Option<String>,
    pub label: String,
}

pub async fn create_affiliate(
    State(state): State<AppState>,
    Json(body): Json<CreateAffiliateBody>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let movie_name = body
        .movie_name
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(&state.config.movie_name)
        .to_string();

    let affiliate = state
        .ticketing
        .affiliates
        .create(&body.code, &movie_name, &body.label)
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "affiliate": affiliate }))))
}

pub async fn list_affiliates(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let affiliates = state.ticketing.affiliates.list().await?;
    Ok(Json(json!({ "affiliates": affiliates })))
}

pub async fn toggle_affiliate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ToggleBody>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .ticketing
        .affiliates
        .set_active(id, body.is_active)
        .await?;
    Ok(Json(json!({ "updated": true })))
}

pub async fn list_ratings(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(25);
    let (ratings, total) = state.ticketing.ratings.recent(page, limit).await?;

    Ok(Json(json!({
        "ratings": ratings,
        "total": total,
        "page": page.max(1),
    })))
}
