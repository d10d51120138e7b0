//! Ticket store
//!
//! Durable ticket records and the persistence-side half of device binding.
//! The only hard storage constraint is uniqueness of `code`; the duplicate
//! active-ticket rule for (email, title) is a soft business rule enforced by
//! the issuance pre-check. The device cap is enforced with a conditional
//! array append so two racing redemptions can never push a ticket past
//! three devices.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::TicketingResult;
use crate::redemption::MAX_DEVICES_PER_TICKET;

/// A durable ticket record
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub code: String,
    pub email: String,
    pub movie_name: String,
    pub price_paid_cents: i64,
    pub coupon_used: Option<String>,
    pub payment_reference: Option<String>,
    pub device_ips: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Ticket {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now > self.expiry_date
    }
}

/// Fields for a new ticket row
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub code: String,
    pub email: String,
    pub movie_name: String,
    pub price_paid_cents: i64,
    pub coupon_used: Option<String>,
    pub payment_reference: Option<String>,
    pub expiry_date: OffsetDateTime,
}

/// Outcome of an insert attempt, letting the issuance service distinguish a
/// code collision (retry with a fresh code) from other failures.
pub enum InsertOutcome {
    Inserted(Ticket),
    CodeCollision,
}

#[derive(Clone)]
pub struct TicketStore {
    pool: PgPool,
}

impl TicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a ticket as a single atomic write. A unique violation on
    /// `code` surfaces as `CodeCollision` for the generation retry loop.
    pub async fn insert(&self, new: &NewTicket) -> TicketingResult<InsertOutcome> {
        let result = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (
                code, email, movie_name, price_paid_cents,
                coupon_used, payment_reference, expiry_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, code, email, movie_name, price_paid_cents,
                      coupon_used, payment_reference, device_ips,
                      expiry_date, created_at
            "#,
        )
        .bind(&new.code)
        .bind(&new.email)
        .bind(&new.movie_name)
        .bind(new.price_paid_cents)
        .bind(&new.coupon_used)
        .bind(&new.payment_reference)
        .bind(new.expiry_date)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(ticket) => Ok(InsertOutcome::Inserted(ticket)),
            Err(e) => {
                if e.as_database_error()
                    .map(|db| db.is_unique_violation())
                    .unwrap_or(false)
                {
                    Ok(InsertOutcome::CodeCollision)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// Primary redemption lookup: ticket by (code, title).
    pub async fn find_by_code_and_movie(
        &self,
        code: &str,
        movie_name: &str,
    ) -> TicketingResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT id, code, email, movie_name, price_paid_cents,
                   coupon_used, payment_reference, device_ips,
                   expiry_date, created_at
            FROM tickets
            WHERE code = $1 AND movie_name = $2
            "#,
        )
        .bind(code)
        .bind(movie_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket)
    }

    /// Duplicate-purchase pre-check and resend flow: newest unexpired ticket
    /// for a purchaser and title.
    pub async fn find_unexpired_by_email_and_movie(
        &self,
        email: &str,
        movie_name: &str,
    ) -> TicketingResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT id, code, email, movie_name, price_paid_cents,
                   coupon_used, payment_reference, device_ips,
                   expiry_date, created_at
            FROM tickets
            WHERE email = $1 AND movie_name = $2 AND expiry_date > NOW()
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(movie_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket)
    }

    /// Atomically append a device to a ticket, only if the device is not
    /// already bound and the cap has not been reached. Returns true when a
    /// row was updated. The guard and the append run in one statement, so
    /// concurrent redemptions cannot both observe room and overshoot.
    pub async fn append_device_if_under_cap(
        &self,
        ticket_id: Uuid,
        device: &str,
    ) -> TicketingResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET device_ips = array_append(device_ips, $2)
            WHERE id = $1
              AND NOT (device_ips @> ARRAY[$2])
              AND cardinality(device_ips) < $3
            "#,
        )
        .bind(ticket_id)
        .bind(device)
        .bind(MAX_DEVICES_PER_TICKET as i32)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Re-read a ticket by id (used after a failed conditional append to
    /// distinguish a same-device race from a full ticket).
    pub async fn find_by_id(&self, ticket_id: Uuid) -> TicketingResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT id, code, email, movie_name, price_paid_cents,
                   coupon_used, payment_reference, device_ips,
                   expiry_date, created_at
            FROM tickets
            WHERE id = $1
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket)
    }
}
