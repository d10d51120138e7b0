//! Title ratings
//!
//! Thumbs up/down with an optional comment, optionally linked to a ticket
//! code. No invariants beyond read consistency; aggregates feed the public
//! stats endpoint and the operator dashboard.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::TicketingResult;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Rating {
    pub id: Uuid,
    pub movie_name: String,
    pub thumbs_up: bool,
    pub comment: Option<String>,
    pub ticket_code: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingStats {
    pub up: i64,
    pub down: i64,
}

#[derive(Clone)]
pub struct RatingsService {
    pool: PgPool,
}

impl RatingsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn rate(
        &self,
        movie_name: &str,
        thumbs_up: bool,
        comment: Option<&str>,
        ticket_code: Option<&str>,
    ) -> TicketingResult<Rating> {
        let rating = sqlx::query_as::<_, Rating>(
            r#"
            INSERT INTO ratings (movie_name, thumbs_up, comment, ticket_code)
            VALUES ($1, $2, $3, $4)
            RETURNING id, movie_name, thumbs_up, comment, ticket_code, created_at
            "#,
        )
        .bind(movie_name)
        .bind(thumbs_up)
        .bind(comment)
        .bind(ticket_code)
        .fetch_one(&self.pool)
        .await?;

        Ok(rating)
    }

    pub async fn stats(&self, movie_name: &str) -> TicketingResult<RatingStats> {
        let (up, down): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE thumbs_up),
                COUNT(*) FILTER (WHERE NOT thumbs_up)
            FROM ratings
            WHERE movie_name = $1
            "#,
        )
        .bind(movie_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(RatingStats { up, down })
    }

    /// Paginated recent ratings for the dashboard.
    pub async fn recent(&self, page: i64, limit: i64) -> TicketingResult<(Vec<Rating>, i64)> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let offset = (page - 1) * limit;

        let ratings = sqlx::query_as::<_, Rating>(
            r#"
            SELECT id, movie_name, thumbs_up, comment, ticket_code, created_at
            FROM ratings
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ratings")
            .fetch_one(&self.pool)
            .await?;

        Ok((ratings, total.0))
    }
}
