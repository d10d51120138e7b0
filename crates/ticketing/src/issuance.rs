//! Ticket issuance
//!
//! The purchase path: validate the request, price it, verify payment when
//! the price is nonzero, mint a unique access code, and persist the ticket
//! in a single write. Everything before that write is caller-visible and
//! blocks issuance; everything after (coupon usage counter, email) is
//! best-effort and can never undo the ticket.

use serde::Serialize;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};

use crate::codes::{generate_code, MAX_GENERATION_ATTEMPTS};
use crate::coupons::CouponLedger;
use crate::email::TicketEmailService;
use crate::error::{TicketingError, TicketingResult};
use crate::payment::{PaymentVerifier, VerifyOutcome};
use crate::pricing::PricingEngine;
use crate::store::{InsertOutcome, NewTicket, Ticket, TicketStore};

/// Viewing access window from issuance.
pub const TICKET_VALIDITY: Duration = Duration::days(90);

/// The catalog entry purchases default to. The site currently sells one
/// title; the data model supports more.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub movie_name: String,
    pub base_price_cents: i64,
}

/// An incoming purchase request
#[derive(Debug, Clone, Default)]
pub struct PurchaseRequest {
    pub email: String,
    pub movie_name: Option<String>,
    pub payment_reference: Option<String>,
    pub coupon_code: Option<String>,
}

/// A successfully issued ticket, as returned to the purchaser
#[derive(Debug, Clone, Serialize)]
pub struct IssuedTicket {
    pub code: String,
    pub movie_name: String,
    pub price_paid_cents: i64,
    pub coupon_used: Option<String>,
    /// True when a supplied coupon did not apply and the full price was
    /// charged instead.
    pub coupon_fallback: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry_date: OffsetDateTime,
}

#[derive(Clone)]
pub struct IssuanceService {
    pool: PgPool,
    store: TicketStore,
    pricing: PricingEngine,
    ledger: CouponLedger,
    verifier: PaymentVerifier,
    email: TicketEmailService,
    catalog: Catalog,
}

impl IssuanceService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        store: TicketStore,
        pricing: PricingEngine,
        ledger: CouponLedger,
        verifier: PaymentVerifier,
        email: TicketEmailService,
        catalog: Catalog,
    ) -> Self {
        Self {
            pool,
            store,
            pricing,
            ledger,
            verifier,
            email,
            catalog,
        }
    }

    /// Issue a ticket for a purchase request.
    pub async fn purchase(&self, req: PurchaseRequest) -> TicketingResult<IssuedTicket> {
        let email = req.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(TicketingError::MissingEmail);
        }

        let movie_name = req
            .movie_name
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.catalog.movie_name)
            .to_string();

        // Soft business rule: one unexpired ticket per (email, title). Two
        // racing purchases may both pass this check. A duplicate attempt
        // usually means the purchaser lost the original email, so the code
        // is re-queued for delivery before the conflict is returned; the
        // response body never carries it.
        if let Some(existing) = self
            .store
            .find_unexpired_by_email_and_movie(&email, &movie_name)
            .await?
        {
            self.email
                .enqueue_ticket_email(&self.pool, &email, &movie_name, &existing.code)
                .await;
            return Err(TicketingError::DuplicateActiveTicket {
                existing_code: existing.code,
            });
        }

        let quote = self
            .pricing
            .compute_final_price(self.catalog.base_price_cents, req.coupon_code.as_deref())
            .await?;

        let verification = self
            .verifier
            .verify(req.payment_reference.as_deref(), quote.final_cents)
            .await?;

        let payment_reference = match verification {
            VerifyOutcome::Verified { .. } => req.payment_reference.clone(),
            VerifyOutcome::Skipped => None,
        };

        let ticket = self
            .insert_with_fresh_code(
                &email,
                &movie_name,
                quote.final_cents,
                quote.coupon.as_ref().map(|c| c.code.clone()),
                payment_reference,
            )
            .await?;

        tracing::info!(
            code = %ticket.code,
            movie = %movie_name,
            price_paid_cents = ticket.price_paid_cents,
            coupon = ?ticket.coupon_used,
            "Ticket issued"
        );

        // From here on nothing may fail the purchase. Coupon usage counters
        // are analytics, not a billing record.
        if let Some(coupon) = &quote.coupon {
            if let Err(e) = self.ledger.increment_uses(coupon.id).await {
                tracing::warn!(
                    coupon_id = %coupon.id,
                    error = %e,
                    "Failed to increment coupon usage counter"
                );
            }
        }

        // Detached delivery: the response returns the code without waiting
        // on the email provider.
        self.email
            .enqueue_ticket_email(&self.pool, &email, &movie_name, &ticket.code)
            .await;

        Ok(IssuedTicket {
            code: ticket.code,
            movie_name: ticket.movie_name,
            price_paid_cents: ticket.price_paid_cents,
            coupon_used: ticket.coupon_used,
            coupon_fallback: quote.fallback,
            expiry_date: ticket.expiry_date,
        })
    }

    /// Re-queue the access code email for an unexpired ticket. The code
    /// itself is never returned; holding the inbox is what proves ownership.
    pub async fn resend_code(
        &self,
        email: &str,
        movie_name: Option<&str>,
    ) -> TicketingResult<OffsetDateTime> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(TicketingError::MissingEmail);
        }

        let movie_name = movie_name
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.catalog.movie_name)
            .to_string();

        let Some(ticket) = self
            .store
            .find_unexpired_by_email_and_movie(&email, &movie_name)
            .await?
        else {
            return Err(TicketingError::TicketNotFound);
        };

        self.email
            .enqueue_ticket_email(&self.pool, &ticket.email, &ticket.movie_name, &ticket.code)
            .await;

        tracing::info!(code = %ticket.code, email = %email, "Access code re-sent");
        Ok(ticket.expiry_date)
    }

    /// Mint a code and insert the ticket, regenerating on the (vanishingly
    /// rare) unique-constraint collision, bounded at MAX_GENERATION_ATTEMPTS.
    async fn insert_with_fresh_code(
        &self,
        email: &str,
        movie_name: &str,
        price_paid_cents: i64,
        coupon_used: Option<String>,
        payment_reference: Option<String>,
    ) -> TicketingResult<Ticket> {
        let expiry_date = OffsetDateTime::now_utc() + TICKET_VALIDITY;

        for attempt in 0..MAX_GENERATION_ATTEMPTS {
            let new = NewTicket {
                code: generate_code(),
                email: email.to_string(),
                movie_name: movie_name.to_string(),
                price_paid_cents,
                coupon_used: coupon_used.clone(),
                payment_reference: payment_reference.clone(),
                expiry_date,
            };

            match self.store.insert(&new).await? {
                InsertOutcome::Inserted(ticket) => return Ok(ticket),
                InsertOutcome::CodeCollision => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        code = %new.code,
                        "Access code collision, regenerating"
                    );
                }
            }
        }

        tracing::error!(
            attempts = MAX_GENERATION_ATTEMPTS,
            "Exhausted access code generation attempts"
        );
        Err(TicketingError::CodeGenerationExhausted)
    }
}
