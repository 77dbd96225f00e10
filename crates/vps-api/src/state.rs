use crate::config::AppConfig;
use crate::orders::OrderLifecycleManager;

#[derive(Clone)]
pub struct AppState {
    pub manager: OrderLifecycleManager,
    pub config: AppConfig,
}
