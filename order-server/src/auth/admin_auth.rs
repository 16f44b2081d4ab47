//! Admin bearer-token authentication for order management routes
//!
//! Sessions are issued elsewhere; this service only checks the shared
//! `ADMIN_API_TOKEN` and records who acted via `X-Actor-Id`.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use shared::error::AppError;

use crate::state::AppState;

/// Header naming the staff member performing the action
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Maximum accepted actor ID length
const MAX_ACTOR_LEN: usize = 128;

/// Authenticated admin request context
#[derive(Debug, Clone, Default)]
pub struct AdminIdentity {
    /// Recorded as the StatusEvent actor; `None` when the header is absent
    pub actor_id: Option<String>,
}

/// Constant-time token comparison
///
/// Both sides are MACed first so the comparison cost does not depend on
/// where the inputs differ or on their lengths.
pub fn token_matches(expected: &str, provided: &str) -> bool {
    const DOMAIN: &[u8] = b"admin-api-token";
    let Ok(mut expected_mac) = Hmac::<Sha256>::new_from_slice(DOMAIN) else {
        return false;
    };
    expected_mac.update(expected.as_bytes());
    let expected_tag = expected_mac.finalize().into_bytes();

    let Ok(mut provided_mac) = Hmac::<Sha256>::new_from_slice(DOMAIN) else {
        return false;
    };
    provided_mac.update(provided.as_bytes());
    provided_mac.verify_slice(&expected_tag).is_ok()
}

/// Middleware that verifies the admin bearer token
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::not_authenticated().with_detail("reason", "missing token"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::not_authenticated().with_detail("reason", "invalid format"))?;

    if !token_matches(&state.admin_token, token) {
        tracing::warn!("Admin token rejected");
        return Err(AppError::not_authenticated().with_detail("reason", "invalid token"));
    }

    let actor_id = request
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.len() <= MAX_ACTOR_LEN)
        .map(String::from);

    request.extensions_mut().insert(AdminIdentity { actor_id });

    Ok(next.run(request).await)
}
