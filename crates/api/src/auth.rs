//! Admin authentication
//!
//! Operator endpoints are protected by a static shared secret carried in
//! the `x-admin-secret` header and compared in constant time. Deliberately
//! minimal: there is one operator and no user account system.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// Constant-time equality for the admin secret (prevents timing attacks).
fn secrets_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Middleware guarding `/api/admin/*`.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(ADMIN_SECRET_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if provided.is_empty() || !secrets_match(provided, &state.config.admin_api_secret) {
        tracing::warn!(path = %request.uri().path(), "Rejected admin request with bad secret");
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_secret_accepted() {
        assert!(secrets_match("topsecret-topsecret", "topsecret-topsecret"));
    }

    #[test]
    fn wrong_secret_rejected() {
        assert!(!secrets_match("guess", "topsecret-topsecret"));
        assert!(!secrets_match("", "topsecret-topsecret"));
        // Same length, different content
        assert!(!secrets_match("topsecret-topsecreT", "topsecret-topsecret"));
    }
}
