use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use vps_store::models::ServerId;

use crate::auth::UserId;
use crate::dto::{CreateServerRequest, ServerResponse};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn submit_order(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    payload: Result<Json<CreateServerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ServerResponse>), ApiError> {
    let Json(req) =
        payload.map_err(|e| ApiError::BadRequest(format!("invalid order: {}", e.body_text())))?;
    let spec = req.into_spec()?;
    let record = state.manager.submit_order(user_id.0, spec).await?;

    Ok((StatusCode::ACCEPTED, Json(ServerResponse::from(record))))
}

pub async fn list_servers(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Json<Vec<ServerResponse>> {
    let records = state.manager.store().list_for_owner(user_id.0).await;
    Json(records.into_iter().map(ServerResponse::from).collect())
}

pub async fn get_server(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(id): Path<String>,
) -> Result<Json<ServerResponse>, ApiError> {
    let id: ServerId = id.parse().map_err(|_| ApiError::NotFound)?;

    let record = state
        .manager
        .store()
        .get(id)
        .await
        .map_err(|_| ApiError::NotFound)?;

    if record.owner != user_id.0 {
        return Err(ApiError::NotFound);
    }

    Ok(Json(ServerResponse::from(record)))
}
