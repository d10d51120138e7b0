//! Payment verifier adapter
//!
//! Confirms with the Paystack gateway that a transaction reference paid at
//! least the expected amount. Every call carries an explicit timeout so a
//! hung upstream cannot hang issuance; all failures resolve to a typed
//! outcome rather than a panic. Zero-priced purchases skip verification
//! entirely — fully-free tickets need no reference.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{TicketingError, TicketingResult};

const DEFAULT_BASE_URL: &str = "https://api.paystack.co";

/// Upstream verification must not stall issuance indefinitely.
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Successful verification outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Gateway confirmed payment of at least the expected amount.
    Verified { amount_paid_cents: i64 },
    /// Expected price was zero; no verification performed.
    Skipped,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    data: VerifyData,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    /// Amount in the smallest currency unit, as the gateway reports it.
    amount: i64,
}

/// HTTP client for the external payment gateway
#[derive(Clone)]
pub struct PaymentVerifier {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl PaymentVerifier {
    pub fn new(secret_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Build from `PAYSTACK_SECRET_KEY` (and optional `PAYSTACK_BASE_URL`).
    pub fn from_env() -> TicketingResult<Self> {
        let secret_key = std::env::var("PAYSTACK_SECRET_KEY")
            .map_err(|_| TicketingError::Internal("PAYSTACK_SECRET_KEY not set".to_string()))?;
        let base_url =
            std::env::var("PAYSTACK_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(secret_key, base_url))
    }

    /// Verify that `reference` corresponds to a successful payment of at
    /// least `expected_cents`.
    pub async fn verify(
        &self,
        reference: Option<&str>,
        expected_cents: i64,
    ) -> TicketingResult<VerifyOutcome> {
        if expected_cents <= 0 {
            return Ok(VerifyOutcome::Skipped);
        }

        let reference = reference
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or(TicketingError::MissingPaymentReference)?;

        let url = format!("{}/transaction/verify/{}", self.base_url, reference);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .timeout(VERIFY_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(reference = %reference, error = %e, "Payment gateway request failed");
                TicketingError::GatewayUnavailable(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(reference = %reference, status = %status, "Payment gateway returned non-success status");
            return Err(TicketingError::GatewayUnavailable(format!(
                "gateway returned {}",
                status
            )));
        }

        let body: VerifyResponse = response.json().await.map_err(|e| {
            TicketingError::GatewayUnavailable(format!("unreadable gateway response: {}", e))
        })?;

        if body.data.status != "success" {
            return Err(TicketingError::PaymentDeclined(body.data.status));
        }

        // Guards against client-supplied price tampering: the amount the
        // gateway saw must cover the price we computed server-side.
        if body.data.amount < expected_cents {
            return Err(TicketingError::AmountMismatch {
                paid_cents: body.data.amount,
                expected_cents,
            });
        }

        tracing::info!(
            reference = %reference,
            amount_paid_cents = body.data.amount,
            expected_cents = expected_cents,
            "Payment verified"
        );

        Ok(VerifyOutcome::Verified {
            amount_paid_cents: body.data.amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier_for(server: &mockito::ServerGuard) -> PaymentVerifier {
        PaymentVerifier::new("sk_test_secret", server.url())
    }

    #[tokio::test]
    async fn zero_price_skips_verification() {
        let server = mockito::Server::new_async().await;
        let verifier = verifier_for(&server);

        let outcome = verifier.verify(None, 0).await.unwrap();
        assert_eq!(outcome, VerifyOutcome::Skipped);
    }

    #[tokio::test]
    async fn missing_reference_rejected_before_any_call() {
        let server = mockito::Server::new_async().await;
        let verifier = verifier_for(&server);

        let err = verifier.verify(None, 25_000).await.unwrap_err();
        assert!(matches!(err, TicketingError::MissingPaymentReference));

        let err = verifier.verify(Some("   "), 25_000).await.unwrap_err();
        assert!(matches!(err, TicketingError::MissingPaymentReference));
    }

    #[tokio::test]
    async fn successful_payment_verifies() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/transaction/verify/ref_123")
            .with_status(200)
            .with_body(r#"{"data":{"status":"success","amount":25000}}"#)
            .create_async()
            .await;
        let verifier = verifier_for(&server);

        let outcome = verifier.verify(Some("ref_123"), 25_000).await.unwrap();
        assert_eq!(
            outcome,
            VerifyOutcome::Verified {
                amount_paid_cents: 25_000
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn declined_transaction_is_typed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/transaction/verify/ref_bad")
            .with_status(200)
            .with_body(r#"{"data":{"status":"failed","amount":25000}}"#)
            .create_async()
            .await;
        let verifier = verifier_for(&server);

        let err = verifier.verify(Some("ref_bad"), 25_000).await.unwrap_err();
        assert!(matches!(err, TicketingError::PaymentDeclined(_)));
    }

    #[tokio::test]
    async fn underpayment_is_amount_mismatch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/transaction/verify/ref_low")
            .with_status(200)
            .with_body(r#"{"data":{"status":"success","amount":10000}}"#)
            .create_async()
            .await;
        let verifier = verifier_for(&server);

        let err = verifier.verify(Some("ref_low"), 25_000).await.unwrap_err();
        match err {
            TicketingError::AmountMismatch {
                paid_cents,
                expected_cents,
            } => {
                assert_eq!(paid_cents, 10_000);
                assert_eq!(expected_cents, 25_000);
            }
            other => panic!("expected AmountMismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn overpayment_is_accepted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/transaction/verify/ref_hi")
            .with_status(200)
            .with_body(r#"{"data":{"status":"success","amount":30000}}"#)
            .create_async()
            .await;
        let verifier = verifier_for(&server);

        let outcome = verifier.verify(Some("ref_hi"), 25_000).await.unwrap();
        assert!(matches!(outcome, VerifyOutcome::Verified { .. }));
    }

    #[tokio::test]
    async fn gateway_error_status_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/transaction/verify/ref_err")
            .with_status(502)
            .create_async()
            .await;
        let verifier = verifier_for(&server);

        let err = verifier.verify(Some("ref_err"), 25_000).await.unwrap_err();
        assert!(matches!(err, TicketingError::GatewayUnavailable(_)));
    }
}
