//! Ticket email notifier
//!
//! Sends the access code to the purchaser after issuance. Delivery is
//! decoupled from the request path: issuance writes an outbox row, spawns a
//! detached first attempt, and returns without waiting. The worker retries
//! anything still pending. A delivery failure is logged and never rolls
//! back an issued ticket or hides the code from the purchaser.

use serde_json::json;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use uuid::Uuid;

const DEFAULT_API_BASE: &str = "https://api.resend.com";

/// Outbox rows past this many attempts are marked failed for good.
pub const MAX_DELIVERY_ATTEMPTS: i32 = 5;

/// A queued ticket email
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub recipient: String,
    pub movie_name: String,
    pub ticket_code: String,
    pub attempts: i32,
    pub created_at: OffsetDateTime,
}

/// Transactional email sender (Resend-shaped HTTP API)
#[derive(Clone)]
pub struct TicketEmailService {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    from_address: String,
}

impl TicketEmailService {
    /// Build from `RESEND_API_KEY` / `EMAIL_FROM`. Missing key leaves the
    /// service disabled: outbox rows are still written so enabling the key
    /// later lets the worker drain the backlog.
    pub fn from_env() -> Self {
        let api_key = std::env::var("RESEND_API_KEY").unwrap_or_default();
        let api_base =
            std::env::var("RESEND_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let from_address = std::env::var("EMAIL_FROM")
            .unwrap_or_else(|_| "Blackwell Films <tickets@blackwellfilms.com>".to_string());
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_base,
            from_address,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Queue a ticket email and fire a detached delivery attempt. Called
    /// after the ticket row is committed; the purchase response does not
    /// wait on this.
    pub async fn enqueue_ticket_email(
        &self,
        pool: &PgPool,
        recipient: &str,
        movie_name: &str,
        ticket_code: &str,
    ) {
        let entry: Result<OutboxEntry, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO email_outbox (recipient, movie_name, ticket_code)
            VALUES ($1, $2, $3)
            RETURNING id, recipient, movie_name, ticket_code, attempts, created_at
            "#,
        )
        .bind(recipient)
        .bind(movie_name)
        .bind(ticket_code)
        .fetch_one(pool)
        .await;

        match entry {
            Ok(entry) => {
                let service = self.clone();
                let pool = pool.clone();
                tokio::spawn(async move {
                    service.deliver_entry(&pool, &entry).await;
                });
            }
            Err(e) => {
                // The purchaser still sees the code in the response body.
                tracing::error!(
                    recipient = %recipient,
                    error = %e,
                    "Failed to enqueue ticket email"
                );
            }
        }
    }

    /// Attempt delivery of one outbox entry and record the outcome.
    /// Returns true when the email was sent.
    pub async fn deliver_entry(&self, pool: &PgPool, entry: &OutboxEntry) -> bool {
        match self
            .send_ticket_email(&entry.recipient, &entry.movie_name, &entry.ticket_code)
            .await
        {
            Ok(()) => {
                let result = sqlx::query(
                    "UPDATE email_outbox SET status = 'sent', attempts = attempts + 1, sent_at = NOW() WHERE id = $1",
                )
                .bind(entry.id)
                .execute(pool)
                .await;
                if let Err(e) = result {
                    tracing::error!(outbox_id = %entry.id, error = %e, "Failed to mark email sent");
                }
                tracing::info!(
                    outbox_id = %entry.id,
                    recipient = %entry.recipient,
                    "Ticket email delivered"
                );
                true
            }
            Err(reason) => {
                let status = if entry.attempts + 1 >= MAX_DELIVERY_ATTEMPTS {
                    "failed"
                } else {
                    "pending"
                };
                let result = sqlx::query(
                    "UPDATE email_outbox SET status = $2, attempts = attempts + 1, last_error = $3 WHERE id = $1",
                )
                .bind(entry.id)
                .bind(status)
                .bind(&reason)
                .execute(pool)
                .await;
                if let Err(e) = result {
                    tracing::error!(outbox_id = %entry.id, error = %e, "Failed to record email failure");
                }
                tracing::warn!(
                    outbox_id = %entry.id,
                    recipient = %entry.recipient,
                    attempts = entry.attempts + 1,
                    error = %reason,
                    "Ticket email delivery failed"
                );
                false
            }
        }
    }

    /// Drain pending outbox rows. Run by the worker every minute; returns
    /// (sent, failed) counts for logging.
    pub async fn process_pending(&self, pool: &PgPool, batch_size: i64) -> (usize, usize) {
        let entries: Vec<OutboxEntry> = match sqlx::query_as(
            r#"
            SELECT id, recipient, movie_name, ticket_code, attempts, created_at
            FROM email_outbox
            WHERE status = 'pending' AND attempts < $1
            ORDER BY created_at
            LIMIT $2
            "#,
        )
        .bind(MAX_DELIVERY_ATTEMPTS)
        .bind(batch_size)
        .fetch_all(pool)
        .await
        {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch pending outbox rows");
                return (0, 0);
            }
        };

        let mut sent = 0;
        let mut failed = 0;
        for entry in &entries {
            if self.deliver_entry(pool, entry).await {
                sent += 1;
            } else {
                failed += 1;
            }
        }
        (sent, failed)
    }

    /// Send one ticket email, with exponential backoff on transient HTTP
    /// failures. Errors come back as strings; callers only log them.
    pub async fn send_ticket_email(
        &self,
        recipient: &str,
        movie_name: &str,
        ticket_code: &str,
    ) -> Result<(), String> {
        if !self.is_enabled() {
            return Err("email service not configured (RESEND_API_KEY missing)".to_string());
        }

        let body = json!({
            "from": self.from_address,
            "to": [recipient],
            "subject": format!("Your Ticket for {}", movie_name),
            "html": ticket_email_html(movie_name, ticket_code),
        });

        let strategy = ExponentialBackoff::from_millis(500).take(3);
        let url = format!("{}/emails", self.api_base);

        Retry::spawn(strategy, || async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| e.to_string())?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(format!("email API returned {}", response.status()))
            }
        })
        .await
    }
}

/// Render the ticket email body.
fn ticket_email_html(movie_name: &str, ticket_code: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: auto; padding: 20px;">
  <h2 style="text-align: center;">BLACKWELL FILMS</h2>
  <p>Thank you for your purchase! You now have 90 days of access to <strong>{movie}</strong>.</p>
  <div style="background: #000; color: #fff; padding: 20px; text-align: center; border-radius: 10px;">
    <p style="margin: 0; font-size: 14px;">YOUR ACCESS CODE</p>
    <h1 style="margin: 10px 0; letter-spacing: 8px;">{code}</h1>
  </div>
  <p style="font-size: 13px; color: #666;">This code works on up to <strong>3 devices</strong>. Enter it on our website to start watching.</p>
</div>"#,
        movie = movie_name,
        code = ticket_code,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_body_contains_code_and_title() {
        let html = ticket_email_html("Cards on the Table", "BW-ABC234");
        assert!(html.contains("BW-ABC234"));
        assert!(html.contains("Cards on the Table"));
        assert!(html.contains("3 devices"));
    }

    #[tokio::test]
    async fn drain_pass_survives_store_outage() {
        // Lazy pool at an unreachable address: the fetch fails, the pass
        // reports zero work instead of panicking.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_secs(1))
            .connect_lazy("postgres://postgres@127.0.0.1:1/unreachable")
            .unwrap();
        let service = TicketEmailService::from_env();

        let (sent, failed) = service.process_pending(&pool, 10).await;
        assert_eq!((sent, failed), (0, 0));
    }

    #[tokio::test]
    async fn disabled_service_reports_unconfigured() {
        let service = TicketEmailService {
            client: reqwest::Client::new(),
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            from_address: "t@example.com".to_string(),
        };
        let err = service
            .send_ticket_email("a@x.com", "Cards on the Table", "BW-ABC234")
            .await
            .unwrap_err();
        assert!(err.contains("not configured"));
    }
}
