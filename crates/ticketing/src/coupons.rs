//! Coupon ledger
//!
//! Operator-managed named discounts. Codes are stored uppercase + trimmed so
//! lookups are effectively case-insensitive; the `uses` counter only ever
//! increases and is analytics, not a billing record.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{TicketingError, TicketingResult};

/// A stored discount code
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount_percent: i32,
    pub is_active: bool,
    pub uses: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Normalize a coupon code for storage and lookup.
pub fn normalize_coupon_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// CRUD and lookup over the coupons table
#[derive(Clone)]
pub struct CouponLedger {
    pool: PgPool,
}

impl CouponLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a coupon. Rejects discounts outside [0, 100] and codes that
    /// already exist (case-insensitively, via normalization).
    pub async fn create(&self, code: &str, discount_percent: i32) -> TicketingResult<Coupon> {
        if !(0..=100).contains(&discount_percent) {
            return Err(TicketingError::InvalidDiscount(discount_percent));
        }

        let normalized = normalize_coupon_code(code);
        if normalized.is_empty() {
            return Err(TicketingError::Internal("Coupon code is empty".to_string()));
        }

        let result = sqlx::query_as::<_, Coupon>(
            r#"
            INSERT INTO coupons (code, discount_percent)
            VALUES ($1, $2)
            RETURNING id, code, discount_percent, is_active, uses, created_at
            "#,
        )
        .bind(&normalized)
        .bind(discount_percent)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(coupon) => {
                tracing::info!(
                    coupon_id = %coupon.id,
                    code = %coupon.code,
                    discount_percent = discount_percent,
                    "Coupon created"
                );
                Ok(coupon)
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

    /// Look up a coupon by code (normalized first). Returns None on miss so
    /// the pricing engine can fall open to full price.
    pub async fn find_by_code(&self, code: &str) -> TicketingResult<Option<Coupon>> {
        let normalized = normalize_coupon_code(code);
        let coupon = sqlx::query_as::<_, Coupon>(
            r#"
            SELECT id, code, discount_percent, is_active, uses, created_at
            FROM coupons
            WHERE code = $1
            "#,
        )
        .bind(&normalized)
        .fetch_optional(&self.pool)
        .await?;

        Ok(coupon)
    }

    /// Toggle a coupon active or inactive.
    pub async fn set_active(&self, id: Uuid, is_active: bool) -> TicketingResult<Coupon> {
        let coupon = sqlx::query_as::<_, Coupon>(
            r#"
            UPDATE coupons
            SET is_active = $2
            WHERE id = $1
            RETURNING id, code, discount_percent, is_active, uses, created_at
            "#,
        )
        .bind(id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TicketingError::CouponNotFound)?;

        tracing::info!(coupon_id = %id, is_active = is_active, "Coupon toggled");
        Ok(coupon)
    }

    /// Hard delete. Tickets that recorded this coupon keep the stored code
    /// string; there is no cascade.
    pub async fn delete(&self, id: Uuid) -> TicketingResult<()> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TicketingError::CouponNotFound);
        }

        tracing::info!(coupon_id = %id, "Coupon deleted");
        Ok(())
    }

    /// Bump the usage counter after a successful issuance. Callers treat a
    /// failure here as best-effort and log it; the issued ticket stands.
    pub async fn increment_uses(&self, id: Uuid) -> TicketingResult<()> {
        sqlx::query("UPDATE coupons SET uses = uses + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Full coupon list for the operator dashboard.
    pub async fn list(&self) -> TicketingResult<Vec<Coupon>> {
        let coupons = sqlx::query_as::<_, Coupon>(
            r#"
            SELECT id, code, discount_percent, is_active, uses, created_at
            FROM coupons
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(coupons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_case_insensitive() {
        assert_eq!(normalize_coupon_code("david10"), "DAVID10");
        assert_eq!(normalize_coupon_code("  DaViD10  "), "DAVID10");
        assert_eq!(
            normalize_coupon_code("david10"),
            normalize_coupon_code("DAVID10")
        );
    }
}
