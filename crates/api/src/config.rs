//! Server configuration
//!
//! Everything the server needs is loaded once at startup and passed down
//! explicitly; no service reads ambient globals after boot.

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_address: String,
    /// Postgres connection URL.
    pub database_url: String,
    /// Shared secret compared (constant-time) on every admin request.
    pub admin_api_secret: String,
    /// The single catalog title purchases default to.
    pub movie_name: String,
    /// Base ticket price in the smallest currency unit.
    pub base_price_cents: i64,
    /// Redemption attempts allowed per device per minute.
    pub redeem_rate_limit: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let admin_api_secret =
            std::env::var("ADMIN_API_SECRET").context("ADMIN_API_SECRET must be set")?;
        if admin_api_secret.len() < 16 {
            anyhow::bail!("ADMIN_API_SECRET must be at least 16 characters");
        }

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:5555".to_string());
        let movie_name =
            std::env::var("MOVIE_TITLE").unwrap_or_else(|_| "Cards on the Table".to_string());
        let base_price_cents = std::env::var("TICKET_PRICE_CENTS")
            .unwrap_or_else(|_| "250000".to_string())
            .parse()
            .context("TICKET_PRICE_CENTS must be an integer")?;
        let redeem_rate_limit = std::env::var("REDEEM_RATE_LIMIT_PER_MINUTE")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("REDEEM_RATE_LIMIT_PER_MINUTE must be an integer")?;

        Ok(Self {
            bind_address,
            database_url,
            admin_api_secret,
            movie_name,
            base_price_cents,
            redeem_rate_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn set_required_env() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/blackwell_test");
        std::env::set_var("ADMIN_API_SECRET", "0123456789abcdef0123");
    }

    #[test]
    #[serial]
    fn defaults_apply_when_optional_vars_missing() {
        set_required_env();
        std::env::remove_var("BIND_ADDRESS");
        std::env::remove_var("MOVIE_TITLE");
        std::env::remove_var("TICKET_PRICE_CENTS");
        std::env::remove_var("REDEEM_RATE_LIMIT_PER_MINUTE");

        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:5555");
        assert_eq!(config.movie_name, "Cards on the Table");
        assert_eq!(config.base_price_cents, 250_000);
        assert_eq!(config.redeem_rate_limit, 30);
    }

    #[test]
    #[serial]
    fn short_admin_secret_rejected() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/blackwell_test");
        std::env::set_var("ADMIN_API_SECRET", "short");
        assert!(Config::from_env().is_err());
        std::env::set_var("ADMIN_API_SECRET", "0123456789abcdef0123");
    }
}
