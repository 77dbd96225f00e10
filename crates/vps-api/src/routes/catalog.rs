use axum::Json;
use axum::extract::State;

use crate::dto::OrderOptionsResponse;
use crate::orders::Bounds;
use crate::state::AppState;

const CORE_PRESETS: &[u32] = &[1, 2, 4, 8];
const RAM_GB_PRESETS: &[u32] = &[2, 4, 8, 16];
const STORAGE_GB_PRESETS: &[u32] = &[50, 100, 200, 500];

fn offered(presets: &[u32], bounds: &Bounds) -> Vec<u32> {
    presets.iter().copied().filter(|v| bounds.contains(*v)).collect()
}

pub async fn order_options(State(state): State<AppState>) -> Json<OrderOptionsResponse> {
    let limits = *state.manager.limits();

    Json(OrderOptionsResponse {
        cores: offered(CORE_PRESETS, &limits.cores),
        ram_gb: offered(RAM_GB_PRESETS, &limits.ram_gb),
        storage_gb: offered(STORAGE_GB_PRESETS, &limits.storage_gb),
        limits,
    })
}
