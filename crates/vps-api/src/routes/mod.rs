pub mod callbacks;
pub mod catalog;
pub mod servers;
pub mod users;

use axum::routing::{get, post};
use axum::{Json, Router, middleware};

use crate::auth::auth_middleware;
use crate::state::AppState;

pub fn api_router(state: AppState) -> Router {
    let authed = Router::new()
        // Orders and servers
        .route(
            "/servers",
            post(servers::submit_order).get(servers::list_servers),
        )
        .route("/servers/{id}", get(servers::get_server))
        // Order form
        .route("/order-options", get(catalog::order_options))
        // Users
        .route("/users/me", get(users::get_me))
        // Auth middleware
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Provisioning workers authenticate by signature, not by session.
    let internal = Router::new().route(
        "/internal/servers/{id}/outcome",
        post(callbacks::provisioning_outcome),
    );

    Router::new()
        .merge(authed)
        .merge(internal)
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}
