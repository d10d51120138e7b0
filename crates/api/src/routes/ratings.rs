//! Public rating endpoints

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RatingBody {
    pub movie_name: Option<String>,
    pub thumbs_up: bool,
    pub comment: Option<String>,
    pub ticket_code: Option<String>,
}

const MAX_COMMENT_LENGTH: usize = 2000;

pub async fn submit_rating(
    State(state): State<AppState>,
    Json(body): Json<RatingBody>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let movie_name = body
        .movie_name
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(&state.config.movie_name)
        .to_string();

    let comment = body
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    if comment.map(|c| c.len() > MAX_COMMENT_LENGTH).unwrap_or(false) {
        return Err(ApiError::Validation(format!(
            "Comment must be at most {} characters",
            MAX_COMMENT_LENGTH
        )));
    }

    let rating = state
        .ticketing
        .ratings
        .rate(&movie_name, body.thumbs_up, comment, body.ticket_code.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "rating": rating })),
    ))
}

pub async fn rating_stats(
    State(state): State<AppState>,
    Path(movie): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let stats = state.ticketing.ratings.stats(&movie).await?;
    Ok(Json(json!({
        "movie_name": movie,
        "up": stats.up,
        "down": stats.down,
    })))
}
