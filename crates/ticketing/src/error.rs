//! Error types for the ticketing core
//!
//! The taxonomy distinguishes caller-visible rejections (anything raised
//! before a ticket row is written) from best-effort failures that must never
//! undo an issued ticket. Handlers map these onto HTTP statuses; nothing in
//! this crate panics on a failed operation.

use thiserror::Error;

/// Result type for ticketing operations
pub type TicketingResult<T> = Result<T, TicketingError>;

#[derive(Debug, Error)]
pub enum TicketingError {
    // --- Input errors: rejected immediately, never retried ---
    #[error("Email is required")]
    MissingEmail,

    #[error("Payment reference is required for paid tickets")]
    MissingPaymentReference,

    // --- Upstream payment errors: caller may retry with a new reference ---
    #[error("Payment was not successful: {0}")]
    PaymentDeclined(String),

    #[error("Amount paid ({paid_cents} cents) is below the ticket price ({expected_cents} cents)")]
    AmountMismatch {
        paid_cents: i64,
        expected_cents: i64,
    },

    #[error("Payment gateway error: {0}")]
    GatewayUnavailable(String),

    // --- Conflict errors: surfaced distinctly so clients can branch ---
    #[error("An unexpired ticket already exists for this email and title")]
    DuplicateActiveTicket { existing_code: String },

    #[error("Coupon code already exists: {0}")]
    DuplicateCoupon(String),

    // --- Validation ---
    #[error("Discount percent must be between 0 and 100, got {0}")]
    InvalidDiscount(i32),

    #[error("Coupon not found")]
    CouponNotFound,

    #[error("Ticket not found")]
    TicketNotFound,

    // --- System errors ---
    #[error("Could not generate a unique access code")]
    CodeGenerationExhausted,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TicketingError {
    /// True for domain-level denials and bad input the caller can correct;
    /// false for failures the caller should treat as retryable system errors.
    pub fn is_caller_error(&self) -> bool {
        !matches!(
            self,
            TicketingError::Database(_)
                | TicketingError::Internal(_)
                | TicketingError::CodeGenerationExhausted
                | TicketingError::GatewayUnavailable(_)
        )
    }
}
