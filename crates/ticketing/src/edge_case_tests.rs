// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for the Ticketing Core
//!
//! Boundary conditions and race conditions in:
//! - Device binding under concurrency (the one destructive race in the
//!   system)
//! - Pricing fallback and rounding
//! - Access code namespace behavior
//! - Ticket validity windows

#[cfg(test)]
mod device_cap_tests {
    use crate::redemption::MAX_DEVICES_PER_TICKET;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tokio::sync::{Barrier, Mutex};

    /// In-memory stand-in for the store's conditional append: the
    /// membership check, cap check, and append happen under one lock,
    /// mirroring the single-statement SQL guard.
    #[derive(Clone, Default)]
    struct DeviceSet {
        devices: Arc<Mutex<Vec<String>>>,
    }

    impl DeviceSet {
        async fn try_bind(&self, device: &str) -> bool {
            let mut devices = self.devices.lock().await;
            if devices.iter().any(|d| d == device) {
                return true; // idempotent re-access
            }
            if devices.len() >= MAX_DEVICES_PER_TICKET {
                return false;
            }
            devices.push(device.to_string());
            true
        }
    }

    // =========================================================================
    // Cap property: many concurrent redemptions with distinct device ids
    // against one fresh ticket -> exactly 3 persisted, remainder denied.
    // =========================================================================
    #[tokio::test]
    async fn concurrent_distinct_devices_never_exceed_cap() {
        let set = DeviceSet::default();
        let barrier = Arc::new(Barrier::new(12));
        let mut handles = vec![];

        for i in 0..12 {
            let set = set.clone();
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                set.try_bind(&format!("10.0.0.{}", i)).await
            }));
        }

        let mut granted = 0;
        let mut denied = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            } else {
                denied += 1;
            }
        }

        assert_eq!(granted, 3, "exactly 3 distinct devices may bind");
        assert_eq!(denied, 9);

        let devices = set.devices.lock().await;
        assert_eq!(devices.len(), 3);
        let distinct: HashSet<_> = devices.iter().collect();
        assert_eq!(distinct.len(), 3, "persisted devices are distinct");
    }

    // =========================================================================
    // Re-binding a known device any number of times is idempotent
    // =========================================================================
    #[tokio::test]
    async fn same_device_rebind_is_idempotent() {
        let set = DeviceSet::default();
        for _ in 0..20 {
            assert!(set.try_bind("1.2.3.4").await);
        }
        assert_eq!(set.devices.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_same_device_counts_once() {
        let set = DeviceSet::default();
        let barrier = Arc::new(Barrier::new(10));
        let mut handles = vec![];

        for _ in 0..10 {
            let set = set.clone();
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                set.try_bind("1.2.3.4").await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap(), "known device must always be granted");
        }
        assert_eq!(set.devices.lock().await.len(), 1);
    }

    // =========================================================================
    // Sequential scenario: 3 grants then a denial
    // =========================================================================
    #[tokio::test]
    async fn fourth_distinct_device_denied() {
        let set = DeviceSet::default();
        assert!(set.try_bind("1.2.3.4").await);
        assert!(set.try_bind("5.6.7.8").await);
        assert!(set.try_bind("9.9.9.9").await);
        assert!(!set.try_bind("8.8.8.8").await);
        // And the third device still re-enters fine afterwards.
        assert!(set.try_bind("9.9.9.9").await);
    }
}

#[cfg(test)]
mod pricing_tests {
    use crate::pricing::apply_discount;

    // The storefront case: base 250 at 30% off -> 175.
    #[test]
    fn thirty_percent_discount() {
        assert_eq!(apply_discount(250, 30), 175);
    }

    #[test]
    fn one_percent_of_one_cent_rounds_up_to_full_price() {
        // 1 cent at 1% off: 0.99 kept -> rounds to 1
        assert_eq!(apply_discount(1, 1), 1);
    }

    #[test]
    fn ninety_nine_percent_of_one_cent_rounds_to_zero() {
        // 1 cent at 99% off: 0.01 kept -> rounds to 0
        assert_eq!(apply_discount(1, 99), 0);
    }

    #[test]
    fn exact_half_cent_rounds_up() {
        // 50 cents at 99% off: 0.5 kept -> half-up to 1
        assert_eq!(apply_discount(50, 99), 1);
    }
}

#[cfg(test)]
mod code_tests {
    use crate::codes::{generate_code, is_valid_code, normalize_code};

    #[test]
    fn redemption_lookup_accepts_lowercase_entry() {
        let code = generate_code();
        let typed = format!("  {}  ", code.to_lowercase());
        assert_eq!(normalize_code(&typed), code);
        assert!(is_valid_code(&normalize_code(&typed)));
    }
}

#[cfg(test)]
mod validity_tests {
    use crate::issuance::TICKET_VALIDITY;
    use time::Duration;

    #[test]
    fn tickets_are_valid_for_ninety_days() {
        assert_eq!(TICKET_VALIDITY, Duration::days(90));
    }
}
