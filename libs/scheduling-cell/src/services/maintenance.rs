use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, FixedOffset, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::ScheduleError;
use crate::models::MaintenanceReport;
use crate::services::generator::SlotGeneratorService;
use crate::services::slots::TimeSlotService;

/// The externally-triggered daily pass: close out elapsed slots, then
/// extend every doctor's rolling horizon by the day that just entered it.
/// Both halves are idempotent and only ever create future slots or disable
/// past ones, so the pass is safe alongside live bookings.
pub struct MaintenanceService {
    supabase: Arc<SupabaseClient>,
    slots: TimeSlotService,
    generator: SlotGeneratorService,
    business_offset: FixedOffset,
    horizon_days: i64,
}

impl MaintenanceService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            slots: TimeSlotService::with_client(Arc::clone(&supabase), config),
            generator: SlotGeneratorService::with_client(Arc::clone(&supabase), config),
            business_offset: config.business_offset(),
            horizon_days: config.slot_horizon_days,
            supabase,
        }
    }

    pub async fn run_daily(&self, auth_token: &str) -> Result<MaintenanceReport, ScheduleError> {
        let disabled = self.slots.disable_elapsed(Utc::now(), auth_token).await?;

        let target = Utc::now().with_timezone(&self.business_offset).date_naive()
            + Duration::days(self.horizon_days);
        let doctors = self.doctors_with_templates(auth_token).await?;

        let mut generated = 0;
        for doctor_id in &doctors {
            match self
                .generator
                .generate_for_range(*doctor_id, target, target, auth_token)
                .await
            {
                Ok(outcome) => generated += outcome.created.len(),
                // One doctor's bad data must not stall the whole pass.
                Err(err) => warn!("Rolling generation failed for doctor {}: {}", doctor_id, err),
            }
        }

        info!(
            "Daily maintenance: {} slots disabled, {} generated for {} across {} doctors",
            disabled,
            generated,
            target,
            doctors.len()
        );

        Ok(MaintenanceReport {
            disabled_slots: disabled,
            doctors_processed: doctors.len(),
            slots_generated: generated,
        })
    }

    async fn doctors_with_templates(
        &self,
        auth_token: &str,
    ) -> Result<Vec<Uuid>, ScheduleError> {
        let result: Vec<Value> = self
            .supabase
            .request(
                Method::GET,
                "/rest/v1/schedule_templates?select=doctor_id",
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        let mut seen = HashSet::new();
        let mut doctors = Vec::new();
        for row in result {
            if let Some(id) = row
                .get("doctor_id")
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            {
                if seen.insert(id) {
                    doctors.push(id);
                }
            }
        }

        Ok(doctors)
    }
}
