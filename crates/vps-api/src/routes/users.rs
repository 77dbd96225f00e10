use axum::extract::State;
use axum::{Extension, Json};

use crate::auth::UserId;
use crate::dto::{ServerCounts, UserResponse};
use crate::state::AppState;

pub async fn get_me(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Json<UserResponse> {
    let records = state.manager.store().list_for_owner(user_id.0).await;

    Json(UserResponse {
        id: user_id.0,
        servers: ServerCounts::tally(&records),
    })
}
