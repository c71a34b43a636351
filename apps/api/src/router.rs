use std::sync::Arc;

use axum::{routing::get, Router};

use scheduling_cell::router::{maintenance_routes, schedule_routes, time_slot_routes};
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Meridian Clinic scheduling API is running!" }))
        .nest("/doctors", schedule_routes(state.clone()))
        .nest("/time-slots", time_slot_routes(state.clone()))
        .nest("/maintenance", maintenance_routes(state))
}
