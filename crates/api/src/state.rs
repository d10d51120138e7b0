//! Application state

use std::sync::Arc;

use sqlx::PgPool;

use blackwell_shared::RateLimiter;
use blackwell_ticketing::{Catalog, TicketingService};

use crate::config::Config;

/// Shared application state, constructed once at startup and cloned into
/// every handler. Replaces the ambient globals the service grew up with:
/// everything a handler touches arrives through here.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub ticketing: Arc<TicketingService>,
    /// Rate limiter for redemption attempts, keyed by device identifier.
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> anyhow::Result<Self> {
        let catalog = Catalog {
            movie_name: config.movie_name.clone(),
            base_price_cents: config.base_price_cents,
        };

        let ticketing = TicketingService::from_env(pool.clone(), catalog)
            .map_err(|e| anyhow::anyhow!("Failed to initialize ticketing service: {}", e))?;

        if ticketing.email.is_enabled() {
            tracing::info!("Ticket email delivery enabled");
        } else {
            tracing::warn!("Ticket email delivery not configured (missing RESEND_API_KEY)");
        }

        let rate_limiter = RateLimiter::new_in_memory();
        tracing::info!("Rate limiter initialized");

        Ok(Self {
            pool,
            config,
            ticketing: Arc::new(ticketing),
            rate_limiter,
        })
    }
}
