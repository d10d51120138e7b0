//! Admin reporting
//!
//! Read-only aggregation for the operator dashboard. Revenue sums the
//! price stored on each ticket at issuance, so deleting a coupon or
//! changing its discount later never rewrites history.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::TicketingResult;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TicketSummary {
    pub id: Uuid,
    pub code: String,
    pub email: String,
    pub movie_name: String,
    pub price_paid_cents: i64,
    pub coupon_used: Option<String>,
    pub device_count: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesSummary {
    pub total_tickets: i64,
    pub active_tickets: i64,
    pub revenue_cents: i64,
    pub tickets_with_coupon: i64,
}

#[derive(Clone)]
pub struct ReportingService {
    pool: PgPool,
}

impl ReportingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn sales_summary(&self) -> TicketingResult<SalesSummary> {
        let (total_tickets, active_tickets, revenue_cents, tickets_with_coupon): (
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE expiry_date > NOW()),
                COALESCE(SUM(price_paid_cents), 0),
                COUNT(*) FILTER (WHERE coupon_used IS NOT NULL)
            FROM tickets
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(SalesSummary {
            total_tickets,
            active_tickets,
            revenue_cents,
            tickets_with_coupon,
        })
    }

    /// Paginated recent tickets, newest first.
    pub async fn recent_tickets(
        &self,
        page: i64,
        limit: i64,
    ) -> TicketingResult<(Vec<TicketSummary>, i64)> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let offset = (page - 1) * limit;

        let tickets = sqlx::query_as::<_, TicketSummary>(
            r#"
            SELECT id, code, email, movie_name, price_paid_cents, coupon_used,
                   cardinality(device_ips)::INT as device_count,
                   expiry_date, created_at
            FROM tickets
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tickets")
            .fetch_one(&self.pool)
            .await?;

        Ok((tickets, total.0))
    }
}
