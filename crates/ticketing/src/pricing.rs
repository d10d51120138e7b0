//! Pricing engine
//!
//! Computes the final price for a purchase from a base price and an optional
//! coupon. Unknown or inactive coupons fall open to the full price rather
//! than failing the purchase — a bad code must never block a legitimate
//! sale. The fallback is flagged on the quote so the UI can say so.

use uuid::Uuid;

use crate::coupons::CouponLedger;
use crate::error::TicketingResult;

/// Coupon actually applied to a quote
#[derive(Debug, Clone)]
pub struct AppliedCoupon {
    pub id: Uuid,
    /// Normalized (uppercase) code, as stored on the ticket.
    pub code: String,
    pub discount_percent: i32,
}

/// Result of a price computation
#[derive(Debug, Clone)]
pub struct PriceQuote {
    pub final_cents: i64,
    pub coupon: Option<AppliedCoupon>,
    /// True when a coupon code was supplied but did not apply (unknown or
    /// inactive) and the quote fell back to the base price.
    pub fallback: bool,
}

/// Apply an integer-percent discount to an amount in the smallest currency
/// unit, rounding the final amount half-up and flooring at zero.
pub fn apply_discount(base_cents: i64, discount_percent: i32) -> i64 {
    let pct = i64::from(discount_percent.clamp(0, 100));
    ((base_cents.max(0) * (100 - pct)) + 50) / 100
}

#[derive(Clone)]
pub struct PricingEngine {
    ledger: CouponLedger,
}

impl PricingEngine {
    pub fn new(ledger: CouponLedger) -> Self {
        Self { ledger }
    }

    /// Resolve the final price for a purchase.
    pub async fn compute_final_price(
        &self,
        base_cents: i64,
        coupon_code: Option<&str>,
    ) -> TicketingResult<PriceQuote> {
        let Some(code) = coupon_code.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(PriceQuote {
                final_cents: base_cents,
                coupon: None,
                fallback: false,
            });
        };

        match self.ledger.find_by_code(code).await? {
            Some(coupon) if coupon.is_active => {
                let final_cents = apply_discount(base_cents, coupon.discount_percent);
                Ok(PriceQuote {
                    final_cents,
                    coupon: Some(AppliedCoupon {
                        id: coupon.id,
                        code: coupon.code,
                        discount_percent: coupon.discount_percent,
                    }),
                    fallback: false,
                })
            }
            Some(coupon) => {
                tracing::debug!(code = %coupon.code, "Inactive coupon supplied, charging full price");
                Ok(PriceQuote {
                    final_cents: base_cents,
                    coupon: None,
                    fallback: true,
                })
            }
            None => {
                tracing::debug!(code = %code, "Unknown coupon supplied, charging full price");
                Ok(PriceQuote {
                    final_cents: base_cents,
                    coupon: None,
                    fallback: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_percent_off_250() {
        // base=25000 cents at 30% -> 17500
        assert_eq!(apply_discount(25_000, 30), 17_500);
    }

    #[test]
    fn zero_percent_is_identity() {
        assert_eq!(apply_discount(25_000, 0), 25_000);
    }

    #[test]
    fn full_discount_is_free() {
        assert_eq!(apply_discount(25_000, 100), 0);
    }

    #[test]
    fn rounds_half_up_at_the_cent() {
        // 999 * 67% kept = 669.33 -> 669
        assert_eq!(apply_discount(999, 33), 669);
        // 150 * 33% off = 100.5 kept -> rounds up to 101
        assert_eq!(apply_discount(150, 33), 101);
    }

    #[test]
    fn never_negative() {
        assert_eq!(apply_discount(0, 50), 0);
        assert_eq!(apply_discount(-100, 50), 0);
    }

    #[test]
    fn out_of_range_percent_is_clamped() {
        assert_eq!(apply_discount(1_000, 150), 0);
        assert_eq!(apply_discount(1_000, -10), 1_000);
    }
}
