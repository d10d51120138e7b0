//! Redemption and device binding
//!
//! Given an access code and the requesting device identifier, decide whether
//! to unlock playback. A ticket is redeemable until its expiry and on at
//! most three distinct devices; re-access from a known device is idempotent.
//! The device identifier is the connecting client's network address — a
//! deliberately coarse proxy for "physical device" (shared NATs collide,
//! mobile networks rotate), documented as such.

use serde::Serialize;
use time::OffsetDateTime;

use crate::affiliates::AffiliateCodes;
use crate::codes::normalize_code;
use crate::error::TicketingResult;
use crate::store::{Ticket, TicketStore};

/// Maximum distinct devices that may ever redeem one ticket.
pub const MAX_DEVICES_PER_TICKET: usize = 3;

/// Why a redemption was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    InvalidCode,
    Expired,
    DeviceLimitReached,
}

impl DenialReason {
    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::InvalidCode => "Invalid code",
            DenialReason::Expired => "Ticket expired",
            DenialReason::DeviceLimitReached => "Device limit reached",
        }
    }
}

/// Outcome of a redemption attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionOutcome {
    Granted {
        /// True when the device was already bound and nothing was mutated.
        already_bound: bool,
    },
    Denied(DenialReason),
}

/// Per-ticket redemption state machine, evaluated against a snapshot.
/// The binding step itself happens through the store's conditional append;
/// this function only classifies what the snapshot allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Expired,
    AlreadyBound,
    NeedsBinding,
    LimitReached,
}

pub(crate) fn evaluate(ticket: &Ticket, device: &str, now: OffsetDateTime) -> Decision {
    if ticket.is_expired(now) {
        return Decision::Expired;
    }
    if ticket.device_ips.iter().any(|d| d == device) {
        return Decision::AlreadyBound;
    }
    if ticket.device_ips.len() >= MAX_DEVICES_PER_TICKET {
        return Decision::LimitReached;
    }
    Decision::NeedsBinding
}

#[derive(Clone)]
pub struct RedemptionService {
    store: TicketStore,
    /// Secondary access-code namespace; omit to run without affiliate codes.
    affiliates: Option<AffiliateCodes>,
}

impl RedemptionService {
    pub fn new(store: TicketStore, affiliates: Option<AffiliateCodes>) -> Self {
        Self { store, affiliates }
    }

    /// Redeem `code` for `movie_name` from `device`.
    pub async fn redeem(
        &self,
        code: &str,
        movie_name: &str,
        device: &str,
    ) -> TicketingResult<RedemptionOutcome> {
        let code = normalize_code(code);

        let Some(ticket) = self.store.find_by_code_and_movie(&code, movie_name).await? else {
            // Affiliate namespace is checked only after the primary ticket
            // lookup misses.
            if let Some(affiliates) = &self.affiliates {
                if affiliates.is_valid(&code, movie_name).await? {
                    tracing::info!(code = %code, movie = %movie_name, "Affiliate code redeemed");
                    return Ok(RedemptionOutcome::Granted {
                        already_bound: false,
                    });
                }
            }
            return Ok(RedemptionOutcome::Denied(DenialReason::InvalidCode));
        };

        let now = OffsetDateTime::now_utc();
        match evaluate(&ticket, device, now) {
            Decision::Expired => Ok(RedemptionOutcome::Denied(DenialReason::Expired)),
            Decision::AlreadyBound => Ok(RedemptionOutcome::Granted {
                already_bound: true,
            }),
            Decision::LimitReached => {
                tracing::warn!(
                    code = %ticket.code,
                    device = %device,
                    "Redemption denied: device limit reached"
                );
                Ok(RedemptionOutcome::Denied(DenialReason::DeviceLimitReached))
            }
            Decision::NeedsBinding => {
                if self
                    .store
                    .append_device_if_under_cap(ticket.id, device)
                    .await?
                {
                    tracing::info!(
                        code = %ticket.code,
                        device = %device,
                        bound_devices = ticket.device_ips.len() + 1,
                        "Device bound to ticket"
                    );
                    return Ok(RedemptionOutcome::Granted {
                        already_bound: false,
                    });
                }

                // The conditional append lost a race. Either this same
                // device was bound by a parallel request (grant) or other
                // devices filled the last slots (deny).
                let current = self.store.find_by_id(ticket.id).await?;
                let bound = current
                    .map(|t| t.device_ips.iter().any(|d| d == device))
                    .unwrap_or(false);
                if bound {
                    Ok(RedemptionOutcome::Granted {
                        already_bound: true,
                    })
                } else {
                    Ok(RedemptionOutcome::Denied(DenialReason::DeviceLimitReached))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use uuid::Uuid;

    fn ticket_with(devices: &[&str], expiry: OffsetDateTime) -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            code: "BW-TEST42".to_string(),
            email: "a@x.com".to_string(),
            movie_name: "Cards on the Table".to_string(),
            price_paid_cents: 25_000,
            coupon_used: None,
            payment_reference: None,
            device_ips: devices.iter().map(|s| s.to_string()).collect(),
            expiry_date: expiry,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn expired_ticket_always_denied() {
        let now = OffsetDateTime::now_utc();
        let ticket = ticket_with(&["1.2.3.4"], now - Duration::days(1));
        // Even a known device is denied once expired.
        assert_eq!(evaluate(&ticket, "1.2.3.4", now), Decision::Expired);
        assert_eq!(evaluate(&ticket, "9.9.9.9", now), Decision::Expired);
    }

    #[test]
    fn known_device_is_idempotent() {
        let now = OffsetDateTime::now_utc();
        let ticket = ticket_with(&["1.2.3.4", "5.6.7.8", "9.9.9.9"], now + Duration::days(30));
        assert_eq!(evaluate(&ticket, "5.6.7.8", now), Decision::AlreadyBound);
    }

    #[test]
    fn new_device_binds_while_under_cap() {
        let now = OffsetDateTime::now_utc();
        let ticket = ticket_with(&["1.2.3.4", "5.6.7.8"], now + Duration::days(30));
        assert_eq!(evaluate(&ticket, "9.9.9.9", now), Decision::NeedsBinding);
    }

    #[test]
    fn fourth_distinct_device_hits_limit() {
        let now = OffsetDateTime::now_utc();
        let ticket = ticket_with(&["1.2.3.4", "5.6.7.8", "9.9.9.9"], now + Duration::days(30));
        assert_eq!(evaluate(&ticket, "8.8.8.8", now), Decision::LimitReached);
    }

    #[test]
    fn fresh_ticket_binds_first_device() {
        let now = OffsetDateTime::now_utc();
        let ticket = ticket_with(&[], now + Duration::days(90));
        assert_eq!(evaluate(&ticket, "1.2.3.4", now), Decision::NeedsBinding);
    }
}
