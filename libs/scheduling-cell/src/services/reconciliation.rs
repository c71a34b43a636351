use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::ScheduleError;
use crate::models::{
    Appointment, CancellationNotice, ChangeImpact, ReconciliationReport, ScheduleTemplate,
    UpdateScheduleRequest,
};
use crate::services::generator::SlotGeneratorService;
use crate::services::slots::TimeSlotService;
use crate::services::templates::{PreparedUpdate, ScheduleTemplateService};
use crate::services::{business_day_start, business_tomorrow};

const CANCELLATION_REASON: &str = "schedule change";

/// Keeps generated slots and confirmed appointments consistent with their
/// templates. Structural edits and deletes run through here; the mutation
/// phase collects cancellation notices, and only after every write is done
/// are they handed to the notification gateway (best-effort, post-commit).
pub struct ReconciliationService {
    supabase: Arc<SupabaseClient>,
    templates: ScheduleTemplateService,
    slots: TimeSlotService,
    generator: SlotGeneratorService,
    business_offset: FixedOffset,
    horizon_days: i64,
}

impl ReconciliationService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            templates: ScheduleTemplateService::with_client(Arc::clone(&supabase)),
            slots: TimeSlotService::with_client(Arc::clone(&supabase), config),
            generator: SlotGeneratorService::with_client(Arc::clone(&supabase), config),
            business_offset: config.business_offset(),
            horizon_days: config.slot_horizon_days,
            supabase,
        }
    }

    /// Apply a template edit. Cosmetic edits are written in place;
    /// structural edits run the full cascade and report what changed.
    /// Returns the collected notices so the caller dispatches them after
    /// this method — and every write inside it — has returned.
    pub async fn apply_template_update(
        &self,
        template_id: Uuid,
        request: UpdateScheduleRequest,
        auth_token: &str,
    ) -> Result<
        (
            ScheduleTemplate,
            Option<ReconciliationReport>,
            Vec<CancellationNotice>,
        ),
        ScheduleError,
    > {
        let prepared = self
            .templates
            .prepare_update(template_id, request, auth_token)
            .await?;

        match prepared.impact {
            ChangeImpact::Cosmetic => {
                debug!("Template {} update is cosmetic, applying in place", template_id);
                let updated = self.templates.apply_update(&prepared, auth_token).await?;
                Ok((updated, None, Vec::new()))
            }
            ChangeImpact::Structural => {
                info!("Template {} update is structural, reconciling", template_id);
                let (updated, report, notices) =
                    self.reconcile_structural_update(&prepared, auth_token).await?;
                Ok((updated, Some(report), notices))
            }
        }
    }

    /// Delete a template: cancel appointments that depended on it, drop its
    /// future unbooked slots, then remove the row. No regeneration — there
    /// is no new shape to regenerate into.
    pub async fn apply_template_delete(
        &self,
        template_id: Uuid,
        auth_token: &str,
    ) -> Result<(ReconciliationReport, Vec<CancellationNotice>), ScheduleError> {
        let current = self.templates.get(template_id, auth_token).await?;
        info!("Deleting template {} with reconciliation", template_id);

        let (report, notices) = self
            .cancel_mismatched_and_drop_slots(&current, None, auth_token)
            .await?;

        self.templates.delete_row(template_id, auth_token).await?;

        Ok((report, notices))
    }

    async fn reconcile_structural_update(
        &self,
        prepared: &PreparedUpdate,
        auth_token: &str,
    ) -> Result<(ScheduleTemplate, ReconciliationReport, Vec<CancellationNotice>), ScheduleError>
    {
        let (mut report, notices) = self
            .cancel_mismatched_and_drop_slots(&prepared.current, Some(&prepared.updated), auth_token)
            .await?;

        let updated = self.templates.apply_update(prepared, auth_token).await?;

        // Backfill under the new shape. The generator re-resolves every
        // date, so days now governed by a higher-priority template stay
        // untouched.
        let from_date = business_tomorrow(self.business_offset);
        let until_date = from_date + Duration::days(self.horizon_days - 1);
        let outcome = self
            .generator
            .generate_for_range(updated.doctor_id, from_date, until_date, auth_token)
            .await?;
        report.regenerated_slots = outcome.created.len();

        info!(
            "Reconciled template {}: {} appointments cancelled, {} slots deleted, {} regenerated",
            updated.id,
            report.cancelled_appointments.len(),
            report.deleted_slots,
            report.regenerated_slots
        );

        Ok((updated, report, notices))
    }

    /// The shared mutation phase: cancel future appointments that matched
    /// the old shape but do not fit the new one, retire their slots, and
    /// delete the old shape's future unbooked slots. Never touches today or
    /// the past.
    async fn cancel_mismatched_and_drop_slots(
        &self,
        old: &ScheduleTemplate,
        new: Option<&ScheduleTemplate>,
        auth_token: &str,
    ) -> Result<(ReconciliationReport, Vec<CancellationNotice>), ScheduleError> {
        let from_date = business_tomorrow(self.business_offset);
        let from_utc = business_day_start(from_date, self.business_offset);
        let until_utc = business_day_start(
            from_date + Duration::days(self.horizon_days),
            self.business_offset,
        );

        let appointments = self
            .fetch_open_appointments(old.doctor_id, from_utc, until_utc, auth_token)
            .await?;

        let mut cancelled = Vec::new();
        let mut retired = Vec::new();
        let mut notices = Vec::new();

        for appointment in appointments {
            if !self.outlived_by_change(&appointment, old, new) {
                continue;
            }

            self.cancel_appointment(&appointment, auth_token).await?;
            if let Some(slot_id) = appointment.slot_id {
                self.slots.retire(slot_id, auth_token).await?;
                retired.push(slot_id);
            }
            cancelled.push(appointment.id);
            notices.push(CancellationNotice {
                appointment_id: appointment.id,
                patient_id: appointment.patient_id,
                doctor_id: appointment.doctor_id,
                scheduled_start_time: appointment.scheduled_start_time,
                reason: CANCELLATION_REASON.to_string(),
            });
        }

        let deleted = self
            .slots
            .delete_unbooked_for_template(old.id, from_utc, auth_token)
            .await?;

        Ok((
            ReconciliationReport {
                cancelled_appointments: cancelled,
                retired_slots: retired,
                deleted_slots: deleted,
                regenerated_slots: 0,
            },
            notices,
        ))
    }

    /// An appointment is orphaned by the change when the old shape covered
    /// it and the new shape (if any) no longer does: the day moved away,
    /// the time fell outside the new window, or the modality changed.
    fn outlived_by_change(
        &self,
        appointment: &Appointment,
        old: &ScheduleTemplate,
        new: Option<&ScheduleTemplate>,
    ) -> bool {
        let local_start = appointment
            .scheduled_start_time
            .with_timezone(&self.business_offset);
        let date = local_start.date_naive();
        let start = local_start.time();
        let end = appointment
            .scheduled_end_time
            .with_timezone(&self.business_offset)
            .time();

        let matched_old = old.covers(date, start, end, appointment.appointment_mode);
        let fits_new =
            new.is_some_and(|n| n.covers(date, start, end, appointment.appointment_mode));

        matched_old && !fits_new
    }

    async fn fetch_open_appointments(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, ScheduleError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=in.(pending,confirmed)&scheduled_start_time=gte.{}&scheduled_start_time=lt.{}&order=scheduled_start_time.asc",
            doctor_id,
            urlencoding::encode(&from.to_rfc3339()),
            urlencoding::encode(&until.to_rfc3339()),
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
                    ScheduleError::Database(format!("Failed to parse appointment: {}", e))
                })
            })
            .collect()
    }

    async fn cancel_appointment(
        &self,
        appointment: &Appointment,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        debug!(
            "Cancelling appointment {} at {} ({})",
            appointment.id, appointment.scheduled_start_time, CANCELLATION_REASON
        );

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let body = json!({
            "status": "cancelled",
            "cancellation_reason": CANCELLATION_REASON,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let _: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        Ok(())
    }
}
