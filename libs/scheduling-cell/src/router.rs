use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Schedule-template management and slot reads, nested under `/doctors`.
pub fn schedule_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/{doctor_id}/time-slots", get(handlers::get_time_slots_public))
        .route("/{doctor_id}/schedules", get(handlers::list_schedules_public));

    let protected_routes = Router::new()
        .route("/{doctor_id}/schedules", post(handlers::create_schedule))
        .route("/{doctor_id}/schedules/bulk", post(handlers::create_schedules_bulk))
        .route(
            "/{doctor_id}/schedules/generate-slots",
            post(handlers::generate_slots),
        )
        .route(
            "/{doctor_id}/schedules/{schedule_id}",
            put(handlers::update_schedule),
        )
        .route(
            "/{doctor_id}/schedules/{schedule_id}",
            delete(handlers::delete_schedule),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Atomic booking primitives, nested under `/time-slots`. Invoked from the
/// appointment flow, never exposed raw to end users.
pub fn time_slot_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/{slot_id}/book", post(handlers::book_slot))
        .route("/{slot_id}/release", post(handlers::release_slot))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// The cron-equivalent daily trigger, nested under `/maintenance`.
pub fn maintenance_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/daily", post(handlers::run_daily_maintenance))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
