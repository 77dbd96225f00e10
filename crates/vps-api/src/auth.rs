use axum::extract::Request;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller, injected into request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

/// Claims carried by a user session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub exp: usize,
}

/// Middleware that resolves the current user and rejects the request when
/// there is none.
pub async fn auth_middleware(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match current_user(&state.config, req.headers()) {
        Ok(user_id) => {
            req.extensions_mut().insert(user_id);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

/// Resolve the caller from `Authorization: Bearer <token>`.
///
/// The token is either the control-plane API key, in which case the trusted
/// frontend names the user in `X-User-Id`, or an HS256 session JWT whose
/// `sub` is the user id.
pub fn current_user(config: &AppConfig, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if token == config.control_plane_api_key {
        let user_id = headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or(ApiError::BadRequest(
                "missing or invalid X-User-Id header".into(),
            ))?;
        return Ok(UserId(user_id));
    }

    let secret = config.jwt_secret.as_deref().ok_or(ApiError::Unauthorized)?;
    user_from_session_token(token, secret).ok_or(ApiError::Unauthorized)
}

fn user_from_session_token(token: &str, secret: &str) -> Option<UserId> {
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .ok()?;

    Uuid::parse_str(&data.claims.sub).ok().map(UserId)
}
