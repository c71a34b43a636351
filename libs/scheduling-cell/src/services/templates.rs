use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::ScheduleError;
use crate::models::{
    AppointmentMode, ChangeImpact, CreateScheduleRequest, ScheduleTemplate, ScheduleType,
    ShadowRelation, ShadowWarning, UpdateScheduleRequest,
};
use crate::services::directory::DoctorDirectoryCache;

/// A validated template edit, classified before anything is written. The
/// reconciliation service routes structural edits through the cascade and
/// only then calls [`ScheduleTemplateService::apply_update`].
#[derive(Debug)]
pub struct PreparedUpdate {
    pub current: ScheduleTemplate,
    pub updated: ScheduleTemplate,
    pub impact: ChangeImpact,
    pub warnings: Vec<ShadowWarning>,
    request: UpdateScheduleRequest,
}

pub struct ScheduleTemplateService {
    supabase: Arc<SupabaseClient>,
}

impl ScheduleTemplateService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Create one availability template. Equal-priority overlap with an
    /// existing template is rejected; cross-priority overlap is allowed and
    /// reported back as shadow warnings.
    pub async fn create(
        &self,
        doctor_id: Uuid,
        request: CreateScheduleRequest,
        auth_token: &str,
    ) -> Result<(ScheduleTemplate, Vec<ShadowWarning>), ScheduleError> {
        debug!("Creating schedule template for doctor {}", doctor_id);

        let candidate = candidate_from_request(doctor_id, &request);
        validate_shape(&candidate)?;
        self.ensure_location_resolvable(&candidate, auth_token).await?;

        let existing = self.find_for_doctor(doctor_id, auth_token).await?;
        let warnings = check_overlap(&candidate, existing.iter(), None)?;

        let row = self
            .insert_rows(vec![insert_body(&candidate)], auth_token)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::Database("Failed to create schedule template".to_string()))?;

        debug!("Schedule template created with ID: {}", row.id);
        Ok((row, warnings))
    }

    /// Create a batch of templates in one PostgREST array insert — a single
    /// statement, so the batch lands all-or-nothing.
    pub async fn create_many(
        &self,
        doctor_id: Uuid,
        requests: Vec<CreateScheduleRequest>,
        auth_token: &str,
    ) -> Result<(Vec<ScheduleTemplate>, Vec<ShadowWarning>), ScheduleError> {
        if requests.is_empty() {
            return Err(ScheduleError::Validation(
                "Batch must contain at least one schedule".to_string(),
            ));
        }

        debug!(
            "Creating {} schedule templates for doctor {}",
            requests.len(),
            doctor_id
        );

        let candidates: Vec<ScheduleTemplate> = requests
            .iter()
            .map(|r| candidate_from_request(doctor_id, r))
            .collect();

        for candidate in &candidates {
            validate_shape(candidate)?;
            self.ensure_location_resolvable(candidate, auth_token).await?;
        }

        // Reject equal-priority overlap inside the batch before touching the
        // database, so the bulk insert can never partially apply.
        for (i, candidate) in candidates.iter().enumerate() {
            for earlier in &candidates[..i] {
                if candidate.same_recurrence_key(earlier.day_of_week, earlier.specific_date)
                    && candidate.window_overlaps(earlier.start_time, earlier.end_time)
                    && candidate.effective_range_overlaps(earlier.effective_from, earlier.effective_until)
                    && candidate.priority == earlier.priority
                {
                    return Err(ScheduleError::Validation(
                        "Batch contains overlapping schedules of equal priority".to_string(),
                    ));
                }
            }
        }

        let existing = self.find_for_doctor(doctor_id, auth_token).await?;
        let mut warnings = Vec::new();
        for candidate in &candidates {
            warnings.extend(check_overlap(candidate, existing.iter(), None)?);
        }

        let rows = self
            .insert_rows(candidates.iter().map(insert_body).collect(), auth_token)
            .await?;

        Ok((rows, warnings))
    }

    /// Validate and classify an edit without writing anything.
    pub async fn prepare_update(
        &self,
        template_id: Uuid,
        request: UpdateScheduleRequest,
        auth_token: &str,
    ) -> Result<PreparedUpdate, ScheduleError> {
        let current = self.get(template_id, auth_token).await?;

        if request.day_of_week.is_some() && current.specific_date.is_some()
            || request.specific_date.is_some() && current.day_of_week.is_some()
        {
            return Err(ScheduleError::Validation(
                "Cannot change a schedule between recurring and one-off; delete and recreate it"
                    .to_string(),
            ));
        }

        let mut updated = current.clone();
        merge_request(&mut updated, &request);

        if updated.schedule_type == ScheduleType::BlockOut {
            if request.is_available == Some(true) {
                return Err(ScheduleError::Validation(
                    "Block-out schedules are always unavailable".to_string(),
                ));
            }
            updated.is_available = false;
        }

        validate_shape(&updated)?;

        let existing = self.find_for_doctor(current.doctor_id, auth_token).await?;
        let warnings = check_overlap(&updated, existing.iter(), Some(template_id))?;

        let impact = classify_impact(&current, &updated);

        Ok(PreparedUpdate {
            current,
            updated,
            impact,
            warnings,
            request,
        })
    }

    /// Write a prepared edit. Callers are expected to have run the
    /// reconciliation cascade first for structural changes.
    pub async fn apply_update(
        &self,
        prepared: &PreparedUpdate,
        auth_token: &str,
    ) -> Result<ScheduleTemplate, ScheduleError> {
        debug!("Applying update to schedule template {}", prepared.current.id);

        let mut update_data = serde_json::Map::new();
        let request = &prepared.request;

        if let Some(day_of_week) = request.day_of_week {
            update_data.insert("day_of_week".to_string(), json!(day_of_week));
        }
        if let Some(specific_date) = request.specific_date {
            update_data.insert("specific_date".to_string(), json!(specific_date));
        }
        if let Some(start_time) = request.start_time {
            update_data.insert(
                "start_time".to_string(),
                json!(start_time.format("%H:%M:%S").to_string()),
            );
        }
        if let Some(end_time) = request.end_time {
            update_data.insert(
                "end_time".to_string(),
                json!(end_time.format("%H:%M:%S").to_string()),
            );
        }
        if let Some(break_start) = request.break_start {
            update_data.insert(
                "break_start".to_string(),
                json!(break_start.format("%H:%M:%S").to_string()),
            );
        }
        if let Some(break_end) = request.break_end {
            update_data.insert(
                "break_end".to_string(),
                json!(break_end.format("%H:%M:%S").to_string()),
            );
        }
        if let Some(duration) = request.slot_duration_minutes {
            update_data.insert("slot_duration_minutes".to_string(), json!(duration));
        }
        if let Some(capacity) = request.slot_capacity {
            update_data.insert("slot_capacity".to_string(), json!(capacity));
        }
        if let Some(mode) = request.appointment_mode {
            update_data.insert("appointment_mode".to_string(), json!(mode));
        }
        if let Some(location_id) = request.location_id {
            update_data.insert("location_id".to_string(), json!(location_id));
        }
        if let Some(effective_from) = request.effective_from {
            update_data.insert("effective_from".to_string(), json!(effective_from));
        }
        if let Some(effective_until) = request.effective_until {
            update_data.insert("effective_until".to_string(), json!(effective_until));
        }
        if let Some(fee) = request.consultation_fee {
            update_data.insert("consultation_fee".to_string(), json!(fee));
        }
        if let Some(schedule_type) = request.schedule_type {
            // Priority is derived from the type, never stored independently.
            update_data.insert("schedule_type".to_string(), json!(schedule_type));
            update_data.insert("priority".to_string(), json!(schedule_type.priority()));
        }
        if request.is_available.is_some() || prepared.updated.schedule_type == ScheduleType::BlockOut
        {
            update_data.insert("is_available".to_string(), json!(prepared.updated.is_available));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/schedule_templates?id=eq.{}", prepared.current.id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(headers),
            )
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::NotFound("Schedule template".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| ScheduleError::Database(format!("Failed to parse schedule template: {}", e)))
    }

    pub async fn get(
        &self,
        template_id: Uuid,
        auth_token: &str,
    ) -> Result<ScheduleTemplate, ScheduleError> {
        let path = format!("/rest/v1/schedule_templates?id=eq.{}", template_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::NotFound("Schedule template".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| ScheduleError::Database(format!("Failed to parse schedule template: {}", e)))
    }

    pub async fn find_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ScheduleTemplate>, ScheduleError> {
        let path = format!(
            "/rest/v1/schedule_templates?doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            doctor_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    ScheduleError::Database(format!("Failed to parse schedule template: {}", e))
                })
            })
            .collect()
    }

    /// Templates whose recurrence and validity window cover `date`.
    pub async fn find_active_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<ScheduleTemplate>, ScheduleError> {
        let all = self.find_for_doctor(doctor_id, auth_token).await?;
        Ok(all.into_iter().filter(|t| t.applies_on(date)).collect())
    }

    /// Raw row delete; reconciliation owns the cascade around it.
    pub async fn delete_row(
        &self,
        template_id: Uuid,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        debug!("Deleting schedule template {}", template_id);

        let path = format!("/rest/v1/schedule_templates?id=eq.{}", template_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let _: Vec<Value> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        Ok(())
    }

    async fn ensure_location_resolvable(
        &self,
        candidate: &ScheduleTemplate,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        if candidate.appointment_mode != AppointmentMode::InPerson
            || candidate.location_id.is_some()
        {
            return Ok(());
        }

        let profile =
            DoctorDirectoryCache::fetch_profile(&self.supabase, candidate.doctor_id, auth_token)
                .await?;
        if profile.primary_location_id.is_none() {
            return Err(ScheduleError::Validation(
                "In-person schedule requires a location and the doctor has no primary location"
                    .to_string(),
            ));
        }

        Ok(())
    }

    async fn insert_rows(
        &self,
        bodies: Vec<Value>,
        auth_token: &str,
    ) -> Result<Vec<ScheduleTemplate>, ScheduleError> {
        let body = if bodies.len() == 1 {
            bodies.into_iter().next().unwrap()
        } else {
            Value::Array(bodies)
        };

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/schedule_templates",
                Some(auth_token),
                Some(body),
                Some(headers),
            )
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    ScheduleError::Database(format!("Failed to parse schedule template: {}", e))
                })
            })
            .collect()
    }
}

/// Builds an in-memory template from a create request so validation and
/// overlap checks can run against the same shape the row will have.
fn candidate_from_request(doctor_id: Uuid, request: &CreateScheduleRequest) -> ScheduleTemplate {
    let now = Utc::now();
    ScheduleTemplate {
        id: Uuid::new_v4(),
        doctor_id,
        day_of_week: request.day_of_week,
        specific_date: request.specific_date,
        start_time: request.start_time,
        end_time: request.end_time,
        break_start: request.break_start,
        break_end: request.break_end,
        slot_duration_minutes: request.slot_duration_minutes,
        slot_capacity: request.slot_capacity,
        appointment_mode: request.appointment_mode,
        location_id: request.location_id,
        effective_from: request.effective_from,
        effective_until: request.effective_until,
        schedule_type: request.schedule_type,
        priority: request.schedule_type.priority(),
        // Block-outs exist to veto days; they are never bookable.
        is_available: request.schedule_type != ScheduleType::BlockOut,
        consultation_fee: request.consultation_fee,
        created_at: now,
        updated_at: now,
    }
}

fn insert_body(template: &ScheduleTemplate) -> Value {
    json!({
        "doctor_id": template.doctor_id,
        "day_of_week": template.day_of_week,
        "specific_date": template.specific_date,
        "start_time": template.start_time.format("%H:%M:%S").to_string(),
        "end_time": template.end_time.format("%H:%M:%S").to_string(),
        "break_start": template.break_start.map(|t| t.format("%H:%M:%S").to_string()),
        "break_end": template.break_end.map(|t| t.format("%H:%M:%S").to_string()),
        "slot_duration_minutes": template.slot_duration_minutes,
        "slot_capacity": template.slot_capacity,
        "appointment_mode": template.appointment_mode,
        "location_id": template.location_id,
        "effective_from": template.effective_from,
        "effective_until": template.effective_until,
        "schedule_type": template.schedule_type,
        "priority": template.priority,
        "is_available": template.is_available,
        "consultation_fee": template.consultation_fee,
        "created_at": template.created_at.to_rfc3339(),
        "updated_at": template.updated_at.to_rfc3339()
    })
}

fn merge_request(template: &mut ScheduleTemplate, request: &UpdateScheduleRequest) {
    if let Some(day_of_week) = request.day_of_week {
        template.day_of_week = Some(day_of_week);
    }
    if let Some(specific_date) = request.specific_date {
        template.specific_date = Some(specific_date);
    }
    if let Some(start_time) = request.start_time {
        template.start_time = start_time;
    }
    if let Some(end_time) = request.end_time {
        template.end_time = end_time;
    }
    if let Some(break_start) = request.break_start {
        template.break_start = Some(break_start);
    }
    if let Some(break_end) = request.break_end {
        template.break_end = Some(break_end);
    }
    if let Some(duration) = request.slot_duration_minutes {
        template.slot_duration_minutes = duration;
    }
    if let Some(capacity) = request.slot_capacity {
        template.slot_capacity = capacity;
    }
    if let Some(mode) = request.appointment_mode {
        template.appointment_mode = mode;
    }
    if let Some(location_id) = request.location_id {
        template.location_id = Some(location_id);
    }
    if let Some(effective_from) = request.effective_from {
        template.effective_from = Some(effective_from);
    }
    if let Some(effective_until) = request.effective_until {
        template.effective_until = Some(effective_until);
    }
    if let Some(schedule_type) = request.schedule_type {
        template.schedule_type = schedule_type;
        template.priority = schedule_type.priority();
    }
    if let Some(fee) = request.consultation_fee {
        template.consultation_fee = Some(fee);
    }
    if let Some(is_available) = request.is_available {
        template.is_available = is_available;
    }
}

/// Field invariants from the data model. Every failure names the violated
/// precondition so callers can fix the input rather than guess.
fn validate_shape(template: &ScheduleTemplate) -> Result<(), ScheduleError> {
    match (template.day_of_week, template.specific_date) {
        (None, None) => {
            return Err(ScheduleError::Validation(
                "Either day_of_week or specific_date is required".to_string(),
            ));
        }
        (Some(_), Some(_)) => {
            return Err(ScheduleError::Validation(
                "day_of_week and specific_date are mutually exclusive".to_string(),
            ));
        }
        (Some(dow), None) if !(0..=6).contains(&dow) => {
            return Err(ScheduleError::Validation(
                "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            ));
        }
        _ => {}
    }

    if template.start_time >= template.end_time {
        return Err(ScheduleError::Validation(
            "Start time must be before end time".to_string(),
        ));
    }

    match (template.break_start, template.break_end) {
        (None, None) => {}
        (Some(break_start), Some(break_end)) => {
            if break_start >= break_end {
                return Err(ScheduleError::Validation(
                    "Break start must be before break end".to_string(),
                ));
            }
            if break_start <= template.start_time || break_end >= template.end_time {
                return Err(ScheduleError::Validation(
                    "Break must lie strictly inside the schedule window".to_string(),
                ));
            }
        }
        _ => {
            return Err(ScheduleError::Validation(
                "Break start and break end must be set together".to_string(),
            ));
        }
    }

    if template.slot_duration_minutes <= 0 {
        return Err(ScheduleError::Validation(
            "Slot duration must be positive".to_string(),
        ));
    }

    let window_minutes = (template.end_time - template.start_time).num_minutes();
    if i64::from(template.slot_duration_minutes) > window_minutes {
        return Err(ScheduleError::Validation(
            "Slot duration exceeds the schedule window".to_string(),
        ));
    }

    if template.slot_capacity <= 0 {
        return Err(ScheduleError::Validation(
            "Slot capacity must be positive".to_string(),
        ));
    }

    if let (Some(from), Some(until)) = (template.effective_from, template.effective_until) {
        if from > until {
            return Err(ScheduleError::Validation(
                "effective_from must not be after effective_until".to_string(),
            ));
        }
    }

    Ok(())
}

/// Equal-priority overlap on a shared recurrence key is a hard conflict;
/// cross-priority coincidence is allowed and reported as shadow warnings,
/// because at resolution time the higher priority owns the whole day.
fn check_overlap<'a>(
    candidate: &ScheduleTemplate,
    existing: impl Iterator<Item = &'a ScheduleTemplate>,
    exclude_id: Option<Uuid>,
) -> Result<Vec<ShadowWarning>, ScheduleError> {
    let mut warnings = Vec::new();

    for other in existing {
        if Some(other.id) == exclude_id {
            continue;
        }

        let same_key = candidate.same_recurrence_key(other.day_of_week, other.specific_date);
        let ranges_overlap =
            candidate.effective_range_overlaps(other.effective_from, other.effective_until);

        if same_key
            && ranges_overlap
            && candidate.window_overlaps(other.start_time, other.end_time)
            && candidate.priority == other.priority
        {
            return Err(ScheduleError::TemplateOverlap {
                existing_id: other.id,
                window: other.window_label(),
                priority: other.priority,
            });
        }

        if candidate.priority != other.priority && dates_can_coincide(candidate, other) {
            warnings.push(ShadowWarning {
                existing_id: other.id,
                existing_window: other.window_label(),
                existing_priority: other.priority,
                relation: if candidate.priority > other.priority {
                    ShadowRelation::ShadowsExisting
                } else {
                    ShadowRelation::ShadowedByExisting
                },
            });
        }
    }

    Ok(warnings)
}

/// Whether two templates can ever govern the same calendar date.
fn dates_can_coincide(candidate: &ScheduleTemplate, other: &ScheduleTemplate) -> bool {
    if !candidate.effective_range_overlaps(other.effective_from, other.effective_until) {
        return false;
    }

    match (candidate.specific_date, other.specific_date) {
        (Some(theirs), Some(ours)) => theirs == ours,
        (Some(date), None) => other.applies_on(date),
        (None, Some(date)) => candidate.applies_on(date),
        (None, None) => candidate.day_of_week == other.day_of_week,
    }
}

/// Cosmetic edits (fee, availability toggle) leave generated slots valid;
/// anything that changes the day, window, slot shape or modality does not.
fn classify_impact(current: &ScheduleTemplate, updated: &ScheduleTemplate) -> ChangeImpact {
    let structural = current.day_of_week != updated.day_of_week
        || current.specific_date != updated.specific_date
        || current.start_time != updated.start_time
        || current.end_time != updated.end_time
        || current.break_start != updated.break_start
        || current.break_end != updated.break_end
        || current.slot_duration_minutes != updated.slot_duration_minutes
        || current.slot_capacity != updated.slot_capacity
        || current.appointment_mode != updated.appointment_mode
        || current.location_id != updated.location_id
        || current.effective_from != updated.effective_from
        || current.effective_until != updated.effective_until
        || current.schedule_type != updated.schedule_type;

    if structural {
        ChangeImpact::Structural
    } else {
        ChangeImpact::Cosmetic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn base_request() -> CreateScheduleRequest {
        CreateScheduleRequest {
            day_of_week: Some(1),
            specific_date: None,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            break_start: None,
            break_end: None,
            slot_duration_minutes: 30,
            slot_capacity: 1,
            appointment_mode: AppointmentMode::Remote,
            location_id: None,
            effective_from: None,
            effective_until: None,
            schedule_type: ScheduleType::Regular,
            consultation_fee: None,
        }
    }

    #[test]
    fn rejects_inverted_time_window() {
        let mut request = base_request();
        request.end_time = NaiveTime::from_hms_opt(8, 0, 0).unwrap();

        let candidate = candidate_from_request(Uuid::new_v4(), &request);
        assert!(matches!(
            validate_shape(&candidate),
            Err(ScheduleError::Validation(_))
        ));
    }

    #[test]
    fn rejects_break_touching_window_edge() {
        let mut request = base_request();
        request.break_start = NaiveTime::from_hms_opt(9, 0, 0);
        request.break_end = NaiveTime::from_hms_opt(10, 0, 0);

        let candidate = candidate_from_request(Uuid::new_v4(), &request);
        assert!(matches!(
            validate_shape(&candidate),
            Err(ScheduleError::Validation(_))
        ));
    }

    #[test]
    fn rejects_duration_longer_than_window() {
        let mut request = base_request();
        request.end_time = NaiveTime::from_hms_opt(9, 20, 0).unwrap();

        let candidate = candidate_from_request(Uuid::new_v4(), &request);
        assert!(matches!(
            validate_shape(&candidate),
            Err(ScheduleError::Validation(_))
        ));
    }

    #[test]
    fn rejects_missing_recurrence_key() {
        let mut request = base_request();
        request.day_of_week = None;

        let candidate = candidate_from_request(Uuid::new_v4(), &request);
        assert!(matches!(
            validate_shape(&candidate),
            Err(ScheduleError::Validation(_))
        ));
    }

    #[test]
    fn equal_priority_overlap_is_a_conflict() {
        let doctor_id = Uuid::new_v4();
        let existing = candidate_from_request(doctor_id, &base_request());

        let mut overlapping = base_request();
        overlapping.start_time = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        overlapping.end_time = NaiveTime::from_hms_opt(18, 0, 0).unwrap();
        let candidate = candidate_from_request(doctor_id, &overlapping);

        let result = check_overlap(&candidate, std::iter::once(&existing), None);
        assert!(matches!(result, Err(ScheduleError::TemplateOverlap { .. })));
    }

    #[test]
    fn cross_priority_overlap_yields_shadow_warning() {
        let doctor_id = Uuid::new_v4();
        let existing = candidate_from_request(doctor_id, &base_request());

        let mut holiday = base_request();
        holiday.schedule_type = ScheduleType::Holiday;
        let candidate = candidate_from_request(doctor_id, &holiday);

        let warnings = check_overlap(&candidate, std::iter::once(&existing), None).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].relation, ShadowRelation::ShadowsExisting);
    }

    #[test]
    fn one_off_shadows_recurring_on_its_weekday() {
        let doctor_id = Uuid::new_v4();
        let existing = candidate_from_request(doctor_id, &base_request());

        let mut one_off = base_request();
        one_off.day_of_week = None;
        // 2025-06-02 is a Monday, matching the recurring rule above.
        one_off.specific_date = NaiveDate::from_ymd_opt(2025, 6, 2);
        one_off.schedule_type = ScheduleType::Temporary;
        let candidate = candidate_from_request(doctor_id, &one_off);

        let warnings = check_overlap(&candidate, std::iter::once(&existing), None).unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn disjoint_effective_ranges_do_not_conflict() {
        let doctor_id = Uuid::new_v4();
        let mut first = base_request();
        first.effective_until = NaiveDate::from_ymd_opt(2025, 5, 31);
        let existing = candidate_from_request(doctor_id, &first);

        let mut second = base_request();
        second.effective_from = NaiveDate::from_ymd_opt(2025, 6, 1);
        let candidate = candidate_from_request(doctor_id, &second);

        let warnings = check_overlap(&candidate, std::iter::once(&existing), None).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn fee_only_change_is_cosmetic() {
        let current = candidate_from_request(Uuid::new_v4(), &base_request());
        let mut updated = current.clone();
        updated.consultation_fee = Some(60.0);

        assert_eq!(classify_impact(&current, &updated), ChangeImpact::Cosmetic);
    }

    #[test]
    fn window_change_is_structural() {
        let current = candidate_from_request(Uuid::new_v4(), &base_request());
        let mut updated = current.clone();
        updated.end_time = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

        assert_eq!(classify_impact(&current, &updated), ChangeImpact::Structural);
    }
}
