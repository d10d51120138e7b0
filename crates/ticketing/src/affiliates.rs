//! Affiliate access codes
//!
//! A secondary code namespace granting playback without purchase: press,
//! partners, VIPs. Not device-bound and not expiring; the operator toggles
//! codes on and off instead. The redemption service consults this table
//! only after the primary ticket lookup misses.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::codes::normalize_code;
use crate::error::{TicketingError, TicketingResult};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AffiliateCode {
    pub id: Uuid,
    pub code: String,
    pub movie_name: String,
    pub label: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AffiliateCodes {
    pool: PgPool,
}

impl AffiliateCodes {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Whether `code` is an active affiliate code for `movie_name`.
    pub async fn is_valid(&self, code: &str, movie_name: &str) -> TicketingResult<bool> {
        let found: Option<(bool,)> = sqlx::query_as(
            "SELECT is_active FROM affiliate_codes WHERE code = $1 AND movie_name = $2",
        )
        .bind(normalize_code(code))
        .bind(movie_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.map(|(active,)| active).unwrap_or(false))
    }

    pub async fn create(
        &self,
        code: &str,
        movie_name: &str,
        label: &str,
    ) -> TicketingResult<AffiliateCode> {
        let normalized = normalize_code(code);
        let result = sqlx::query_as::<_, AffiliateCode>(
            r#"
            INSERT INTO affiliate_codes (code, movie_name, label)
            VALUES ($1, $2, $3)
            RETURNING id, code, movie_name, label, is_active, created_at
            "#,
        )
        .bind(&normalized)
        .bind(movie_name)
        .bind(label)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => {
                tracing::info!(code = %record.code, label = %record.label, "Affiliate code created");
                Ok(record)
            }
            Err(e) => {
                if e.as_database_error()
                    .map(|db| db.is_unique_violation())
                    .unwrap_or(false)
                {
                    Err(TicketingError::DuplicateCoupon(normalized))
                } else {
                    Err(e.into())
                }
            }
        }
    }

    pub async fn list(&self) -> TicketingResult<Vec<AffiliateCode>> {
        let codes = sqlx::query_as::<_, AffiliateCode>(
            r#"
            SELECT id, code, movie_name, label, is_active, created_at
            FROM affiliate_codes
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) -> TicketingResult<()> {
        let result = sqlx::query("UPDATE affiliate_codes SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TicketingError::TicketNotFound);
        }
        Ok(())
    }
}
