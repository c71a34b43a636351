use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, NaiveTime};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::{AppConfig, MAX_GENERATION_RANGE_DAYS};
use shared_database::supabase::SupabaseClient;

use crate::error::ScheduleError;
use crate::models::{
    AppointmentMode, GenerationOutcome, GenerationStatus, NewTimeSlot, ScheduleTemplate,
};
use crate::services::directory::DoctorDirectoryCache;
use crate::services::resolver::resolve_day;
use crate::services::slots::TimeSlotService;
use crate::services::templates::ScheduleTemplateService;
use crate::services::{business_instant, business_tomorrow};

pub struct SlotGeneratorService {
    supabase: Arc<SupabaseClient>,
    templates: ScheduleTemplateService,
    slots: TimeSlotService,
    business_offset: FixedOffset,
}

impl SlotGeneratorService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), config)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            templates: ScheduleTemplateService::with_client(Arc::clone(&supabase)),
            slots: TimeSlotService::with_client(Arc::clone(&supabase), config),
            business_offset: config.business_offset(),
            supabase,
        }
    }

    /// Materialize bookable slots for every date in `[start_date, end_date]`
    /// (business-timezone dates, inclusive).
    ///
    /// The start is clamped to tomorrow — today's calendar is frozen — and
    /// candidates that overlap an already-generated slot are discarded, so
    /// re-running the same range inserts nothing and is safe to repeat.
    pub async fn generate_for_range(
        &self,
        doctor_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        auth_token: &str,
    ) -> Result<GenerationOutcome, ScheduleError> {
        let tomorrow = business_tomorrow(self.business_offset);
        let start = start_date.max(tomorrow);

        if end_date < start {
            return Err(ScheduleError::Validation(
                "Generation range lies in the past; today's slots are frozen".to_string(),
            ));
        }
        if (end_date - start).num_days() + 1 > MAX_GENERATION_RANGE_DAYS {
            return Err(ScheduleError::Validation(format!(
                "Generation range is capped at {} days per call",
                MAX_GENERATION_RANGE_DAYS
            )));
        }

        debug!(
            "Generating slots for doctor {} from {} to {}",
            doctor_id, start, end_date
        );

        let templates = self.templates.find_for_doctor(doctor_id, auth_token).await?;
        let existing = self
            .slots
            .find_in_range(doctor_id, start, end_date, false, auth_token)
            .await?;

        // One read-through cache per run; parallel runs for other doctors
        // never share it.
        let mut directory = DoctorDirectoryCache::new(Arc::clone(&self.supabase));

        let mut candidates: Vec<NewTimeSlot> = Vec::new();
        let mut skipped_existing = 0;
        let mut any_date_governed = false;

        let mut date = start;
        while date <= end_date {
            let resolution = resolve_day(date, &templates);
            if !resolution.is_empty() {
                any_date_governed = true;
            }

            if resolution.is_blocked() {
                debug!("{} is blocked out for doctor {}", date, doctor_id);
                date = date.succ_opt().unwrap();
                continue;
            }

            for template in &resolution.winners {
                let needs_profile = (template.appointment_mode == AppointmentMode::InPerson
                    && template.location_id.is_none())
                    || template.consultation_fee.is_none();
                let profile = if needs_profile {
                    Some(directory.profile(doctor_id, auth_token).await?)
                } else {
                    None
                };

                let location_id = match template.appointment_mode {
                    AppointmentMode::InPerson => template
                        .location_id
                        .or_else(|| profile.as_ref().and_then(|p| p.primary_location_id)),
                    AppointmentMode::Remote => template.location_id,
                };
                let consultation_fee = template
                    .consultation_fee
                    .or_else(|| profile.as_ref().and_then(|p| p.consultation_fee));

                for (slot_start, slot_end) in walk_window(template) {
                    let start_instant = business_instant(date, slot_start, self.business_offset);
                    let end_instant = business_instant(date, slot_end, self.business_offset);

                    if existing.iter().any(|s| s.overlaps(start_instant, end_instant)) {
                        skipped_existing += 1;
                        continue;
                    }
                    if candidates.iter().any(|c| c.overlaps(start_instant, end_instant)) {
                        continue;
                    }

                    candidates.push(NewTimeSlot {
                        doctor_id,
                        template_id: Some(template.id),
                        start_time: start_instant,
                        end_time: end_instant,
                        capacity: template.slot_capacity,
                        appointment_mode: template.appointment_mode,
                        location_id,
                        consultation_fee,
                    });
                }
            }

            date = date.succ_opt().unwrap();
        }

        if candidates.is_empty() {
            let status = if any_date_governed {
                GenerationStatus::AlreadyGenerated
            } else {
                GenerationStatus::NoTemplates
            };
            debug!(
                "No new slots for doctor {} ({:?}, {} skipped)",
                doctor_id, status, skipped_existing
            );
            return Ok(GenerationOutcome {
                status,
                created: Vec::new(),
                skipped_existing,
            });
        }

        let created = self.slots.create_many(doctor_id, candidates, auth_token).await?;
        info!(
            "Generated {} slots for doctor {} ({} already covered)",
            created.len(),
            doctor_id,
            skipped_existing
        );

        Ok(GenerationOutcome {
            status: GenerationStatus::Created,
            created,
            skipped_existing,
        })
    }
}

/// Walk a template's window in slot-duration steps anchored at the window
/// start. Candidates overlapping the break are dropped without shifting the
/// grid, and a final partial slot that would run past the window end is
/// dropped too.
fn walk_window(template: &ScheduleTemplate) -> Vec<(NaiveTime, NaiveTime)> {
    let step = chrono::Duration::minutes(i64::from(template.slot_duration_minutes));
    let mut windows = Vec::new();
    let mut cursor = template.start_time;

    loop {
        let (slot_end, rollover) = cursor.overflowing_add_signed(step);
        if rollover != 0 || slot_end > template.end_time {
            break;
        }
        if !template.break_overlaps(cursor, slot_end) {
            windows.push((cursor, slot_end));
        }
        cursor = slot_end;
    }

    windows
}
