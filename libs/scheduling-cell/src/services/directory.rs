use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::error::ScheduleError;

/// The slice of the doctor directory slot generation depends on: the
/// fallback location for in-person templates and the default fee.
#[derive(Debug, Clone, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub primary_location_id: Option<Uuid>,
    pub consultation_fee: Option<f64>,
}

/// Read-through cache of doctor lookups, scoped to one generation run and
/// passed in explicitly. Concurrent runs for different doctors each hold
/// their own cache, so none can observe another run's stale entries.
pub struct DoctorDirectoryCache {
    supabase: Arc<SupabaseClient>,
    profiles: HashMap<Uuid, DoctorProfile>,
}

impl DoctorDirectoryCache {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            profiles: HashMap::new(),
        }
    }

    pub async fn profile(
        &mut self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorProfile, ScheduleError> {
        if let Some(profile) = self.profiles.get(&doctor_id) {
            return Ok(profile.clone());
        }

        let profile = Self::fetch_profile(&self.supabase, doctor_id, auth_token).await?;
        self.profiles.insert(doctor_id, profile.clone());
        Ok(profile)
    }

    /// One-shot lookup without caching, for callers outside a generation run.
    pub async fn fetch_profile(
        supabase: &SupabaseClient,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorProfile, ScheduleError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!(
            "/rest/v1/doctors?id=eq.{}&select=id,primary_location_id,consultation_fee",
            doctor_id
        );
        let result: Vec<Value> = supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::NotFound("Doctor".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| ScheduleError::Database(format!("Failed to parse doctor profile: {}", e)))
    }
}
