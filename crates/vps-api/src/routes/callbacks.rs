use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use vps_infra::types::ProvisionOutcome;
use vps_store::models::ServerId;

use crate::dto::OutcomeAck;
use crate::error::ApiError;
use crate::orders::OrderError;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-signature";

/// Base64 HMAC-SHA256 of `body` under `secret`, as expected in `X-Signature`.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key size");
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

fn verify_signature(secret: &str, headers: &HeaderMap, body: &[u8]) -> Result<(), ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| BASE64.decode(s.trim()).ok())
        .ok_or(ApiError::Unauthorized)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| ApiError::Internal("unusable callback secret".into()))?;
    mac.update(body);
    mac.verify_slice(&signature)
        .map_err(|_| ApiError::Unauthorized)
}

/// Outcome report from a deferred provisioning worker.
///
/// Duplicate or late reports are acknowledged with `applied: false` rather
/// than an error; the worker did nothing wrong by retrying.
pub async fn provisioning_outcome(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<OutcomeAck>, ApiError> {
    verify_signature(&state.config.callback_secret, &headers, &body)?;

    let id: ServerId = id.parse().map_err(|_| ApiError::NotFound)?;
    let outcome: ProvisionOutcome = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid outcome: {e}")))?;

    match state.manager.on_provisioning_outcome(id, outcome).await {
        Ok(record) => Ok(Json(OutcomeAck {
            id,
            applied: true,
            status: record.status(),
        })),
        Err(OrderError::StaleOutcome { status, .. }) => Ok(Json(OutcomeAck {
            id,
            applied: false,
            status,
        })),
        Err(e) => Err(e.into()),
    }
}
