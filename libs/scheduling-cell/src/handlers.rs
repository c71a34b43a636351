use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    BookSlotRequest, CreateScheduleRequest, GenerateSlotsRequest, UpdateScheduleRequest,
};
use crate::services::maintenance::MaintenanceService;
use crate::services::notifications::NotificationGateway;
use crate::services::reconciliation::ReconciliationService;
use crate::services::slots::TimeSlotService;
use crate::services::templates::ScheduleTemplateService;

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub available_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct BulkScheduleRequest {
    pub schedules: Vec<CreateScheduleRequest>,
}

fn ensure_can_manage_doctor(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    if user.is_admin() || user.id == doctor_id.to_string() {
        Ok(())
    } else {
        Err(AppError::Auth(
            "Not authorized to manage this doctor's schedules".to_string(),
        ))
    }
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_time_slots_public(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let (from, until) = match (query.date, query.start_date, query.end_date) {
        (Some(date), None, None) => (date, date),
        (None, Some(start), Some(end)) if start <= end => (start, end),
        (None, Some(_), Some(_)) => {
            return Err(AppError::BadRequest(
                "start_date must not be after end_date".to_string(),
            ));
        }
        _ => {
            return Err(AppError::BadRequest(
                "Provide either date or both start_date and end_date".to_string(),
            ));
        }
    };

    let slot_service = TimeSlotService::new(&state);
    let slots = slot_service
        .find_in_range(
            doctor_id,
            from,
            until,
            query.available_only.unwrap_or(true),
            &state.supabase_anon_key,
        )
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "time_slots": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn list_schedules_public(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let template_service = ScheduleTemplateService::new(&state);
    let schedules = template_service
        .find_for_doctor(doctor_id, &state.supabase_anon_key)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "schedules": schedules,
        "total": schedules.len()
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_can_manage_doctor(&user, doctor_id)?;
    let token = auth.token();

    let template_service = ScheduleTemplateService::new(&state);
    let (schedule, warnings) = template_service.create(doctor_id, request, token).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "schedule": schedule,
            "warnings": warnings
        })),
    ))
}

#[axum::debug_handler]
pub async fn create_schedules_bulk(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BulkScheduleRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_can_manage_doctor(&user, doctor_id)?;
    let token = auth.token();

    let template_service = ScheduleTemplateService::new(&state);
    let (schedules, warnings) = template_service
        .create_many(doctor_id, request.schedules, token)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "schedules": schedules,
            "warnings": warnings
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_schedule(
    State(state): State<Arc<AppConfig>>,
    Path((doctor_id, schedule_id)): Path<(Uuid, Uuid)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage_doctor(&user, doctor_id)?;
    let token = auth.token();

    let reconciliation = ReconciliationService::new(&state);
    let (schedule, report, notices) = reconciliation
        .apply_template_update(schedule_id, request, token)
        .await?;

    // Writes are done; notification dispatch is post-commit, best-effort.
    NotificationGateway::new(&state)
        .notify_cancellations(&notices)
        .await;

    Ok(Json(json!({
        "schedule": schedule,
        "reconciliation": report
    })))
}

#[axum::debug_handler]
pub async fn delete_schedule(
    State(state): State<Arc<AppConfig>>,
    Path((doctor_id, schedule_id)): Path<(Uuid, Uuid)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage_doctor(&user, doctor_id)?;
    let token = auth.token();

    let reconciliation = ReconciliationService::new(&state);
    let (report, notices) = reconciliation
        .apply_template_delete(schedule_id, token)
        .await?;

    NotificationGateway::new(&state)
        .notify_cancellations(&notices)
        .await;

    Ok(Json(json!({
        "deleted": schedule_id,
        "reconciliation": report
    })))
}

#[axum::debug_handler]
pub async fn generate_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<GenerateSlotsRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage_doctor(&user, doctor_id)?;
    let token = auth.token();

    let generator = crate::services::generator::SlotGeneratorService::new(&state);
    let outcome = generator
        .generate_for_range(doctor_id, request.start_date, request.end_date, token)
        .await?;

    Ok(Json(json!(outcome)))
}

#[axum::debug_handler]
pub async fn book_slot(
    State(state): State<Arc<AppConfig>>,
    Path(slot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<BookSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let slot_service = TimeSlotService::new(&state);
    let slot = slot_service
        .book(slot_id, request.appointment_id, token)
        .await?;

    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn release_slot(
    State(state): State<Arc<AppConfig>>,
    Path(slot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let slot_service = TimeSlotService::new(&state);
    let slot = slot_service.release(slot_id, token).await?;

    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn run_daily_maintenance(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only administrators can trigger maintenance".to_string(),
        ));
    }
    let token = auth.token();

    let maintenance = MaintenanceService::new(&state);
    let report = maintenance.run_daily(token).await?;

    Ok(Json(json!(report)))
}
