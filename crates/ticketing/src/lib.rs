// Ticketing crate clippy configuration
#![allow(clippy::too_many_arguments)] // Issuance wiring takes its collaborators explicitly
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Blackwell Ticketing Core
//!
//! Ticket issuance and redemption for pay-per-view access, plus the
//! supporting coupon/pricing logic and device-binding access control.
//!
//! ## Features
//!
//! - **Issuance**: price a purchase, verify payment with the gateway,
//!   mint a unique `BW-XXXXXX` access code, persist the ticket
//! - **Redemption**: unlock playback for a code, capped at 3 distinct
//!   devices per ticket, idempotent for known devices
//! - **Coupons**: operator-managed percentage discounts with fail-open
//!   pricing fallback
//! - **Affiliate codes**: optional secondary access namespace (press/VIP)
//! - **Ratings**: thumbs up/down with comments
//! - **Reporting**: sales and revenue aggregates for the admin dashboard
//! - **Email**: detached access-code delivery through an outbox

pub mod affiliates;
pub mod codes;
pub mod coupons;
pub mod email;
pub mod error;
pub mod issuance;
pub mod payment;
pub mod pricing;
pub mod ratings;
pub mod redemption;
pub mod reporting;
pub mod store;

#[cfg(test)]
mod edge_case_tests;

// Affiliates
pub use affiliates::{AffiliateCode, AffiliateCodes};

// Codes
pub use codes::{generate_code, is_valid_code, normalize_code, CODE_PREFIX};

// Coupons
pub use coupons::{normalize_coupon_code, Coupon, CouponLedger};

// Email
pub use email::{OutboxEntry, TicketEmailService, MAX_DELIVERY_ATTEMPTS};

// Error
pub use error::{TicketingError, TicketingResult};

// Issuance
pub use issuance::{Catalog, IssuanceService, IssuedTicket, PurchaseRequest, TICKET_VALIDITY};

// Payment
pub use payment::{PaymentVerifier, VerifyOutcome, VERIFY_TIMEOUT};

// Pricing
pub use pricing::{apply_discount, AppliedCoupon, PriceQuote, PricingEngine};

// Ratings
pub use ratings::{Rating, RatingStats, RatingsService};

// Redemption
pub use redemption::{
    DenialReason, RedemptionOutcome, RedemptionService, MAX_DEVICES_PER_TICKET,
};

// Reporting
pub use reporting::{ReportingService, SalesSummary, TicketSummary};

// Store
pub use store::{NewTicket, Ticket, TicketStore};

use sqlx::PgPool;

/// Main ticketing service that combines all ticketing functionality
pub struct TicketingService {
    pub coupons: CouponLedger,
    pub affiliates: AffiliateCodes,
    pub pricing: PricingEngine,
    pub verifier: PaymentVerifier,
    pub store: TicketStore,
    pub issuance: IssuanceService,
    pub redemption: RedemptionService,
    pub ratings: RatingsService,
    pub reporting: ReportingService,
    pub email: TicketEmailService,
}

impl TicketingService {
    /// Create a ticketing service from environment variables.
    pub fn from_env(pool: PgPool, catalog: Catalog) -> TicketingResult<Self> {
        let verifier = PaymentVerifier::from_env()?;
        let email = TicketEmailService::from_env();
        Ok(Self::new(pool, catalog, verifier, email))
    }

    /// Create a ticketing service with explicit collaborators.
    pub fn new(
        pool: PgPool,
        catalog: Catalog,
        verifier: PaymentVerifier,
        email: TicketEmailService,
    ) -> Self {
        let coupons = CouponLedger::new(pool.clone());
        let pricing = PricingEngine::new(coupons.clone());
        let store = TicketStore::new(pool.clone());
        let affiliates = AffiliateCodes::new(pool.clone());

        Self {
            coupons: coupons.clone(),
            affiliates: affiliates.clone(),
            pricing: pricing.clone(),
            verifier: verifier.clone(),
            store: store.clone(),
            issuance: IssuanceService::new(
                pool.clone(),
                store.clone(),
                pricing,
                coupons,
                verifier,
                email.clone(),
                catalog,
            ),
            redemption: RedemptionService::new(store, Some(affiliates)),
            ratings: RatingsService::new(pool.clone()),
            reporting: ReportingService::new(pool),
            email,
        }
    }
}
