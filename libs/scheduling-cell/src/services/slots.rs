use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::ScheduleError;
use crate::models::{NewTimeSlot, TimeSlot};
use crate::services::business_day_start;

pub struct TimeSlotService {
    supabase: Arc<SupabaseClient>,
    business_offset: FixedOffset,
    max_slots_per_day: usize,
}

impl TimeSlotService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), config)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            supabase,
            business_offset: config.business_offset(),
            max_slots_per_day: config.max_slots_per_doctor_per_day,
        }
    }

    /// Slots whose start falls on a business-timezone date in
    /// `[from, until]` (inclusive).
    pub async fn find_in_range(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        until: NaiveDate,
        available_only: bool,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, ScheduleError> {
        let range_start = business_day_start(from, self.business_offset);
        let range_end = business_day_start(
            until.succ_opt().unwrap_or(NaiveDate::MAX),
            self.business_offset,
        );

        let mut path = format!(
            "/rest/v1/time_slots?doctor_id=eq.{}&start_time=gte.{}&start_time=lt.{}&order=start_time.asc",
            doctor_id,
            urlencoding::encode(&range_start.to_rfc3339()),
            urlencoding::encode(&range_end.to_rfc3339()),
        );
        if available_only {
            path.push_str("&is_available=eq.true");
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        parse_slots(result)
    }

    pub async fn find_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        available_only: bool,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, ScheduleError> {
        self.find_in_range(doctor_id, date, date, available_only, auth_token)
            .await
    }

    pub async fn get(&self, slot_id: Uuid, auth_token: &str) -> Result<TimeSlot, ScheduleError> {
        let path = format!("/rest/v1/time_slots?id=eq.{}", slot_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::NotFound("Time slot".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| ScheduleError::Database(format!("Failed to parse time slot: {}", e)))
    }

    /// Bulk-insert slots for one doctor. The batch is checked in memory for
    /// internal overlaps and the per-day limit, then against existing rows
    /// with one range query, so insertion is a single round trip.
    pub async fn create_many(
        &self,
        doctor_id: Uuid,
        slots: Vec<NewTimeSlot>,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, ScheduleError> {
        if slots.is_empty() {
            return Ok(Vec::new());
        }

        let mut ordered: Vec<&NewTimeSlot> = slots.iter().collect();
        ordered.sort_by_key(|s| s.start_time);
        for pair in ordered.windows(2) {
            if pair[1].start_time < pair[0].end_time {
                return Err(ScheduleError::Validation(
                    "Batch contains overlapping slots".to_string(),
                ));
            }
        }

        let first_date = ordered[0]
            .start_time
            .with_timezone(&self.business_offset)
            .date_naive();
        let last_date = ordered[ordered.len() - 1]
            .start_time
            .with_timezone(&self.business_offset)
            .date_naive();

        let existing = self
            .find_in_range(doctor_id, first_date, last_date, false, auth_token)
            .await?;

        for slot in &slots {
            if existing.iter().any(|e| e.overlaps(slot.start_time, slot.end_time)) {
                return Err(ScheduleError::SlotOverlap);
            }
        }

        let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
        for existing_slot in &existing {
            let date = existing_slot
                .start_time
                .with_timezone(&self.business_offset)
                .date_naive();
            *per_day.entry(date).or_insert(0) += 1;
        }
        for slot in &slots {
            let date = slot.start_time.with_timezone(&self.business_offset).date_naive();
            let count = per_day.entry(date).or_insert(0);
            *count += 1;
            if *count > self.max_slots_per_day {
                return Err(ScheduleError::Validation(format!(
                    "Daily slot limit of {} exceeded on {}",
                    self.max_slots_per_day, date
                )));
            }
        }

        let now = Utc::now();
        let bodies: Vec<Value> = slots.iter().map(|s| insert_body(s, now)).collect();

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/time_slots",
                Some(auth_token),
                Some(Value::Array(bodies)),
                Some(headers),
            )
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        let created = parse_slots(result)?;
        info!("Inserted {} slots for doctor {}", created.len(), doctor_id);
        Ok(created)
    }

    /// Atomically claim capacity on a slot.
    ///
    /// The whole check-and-increment runs inside the `book_time_slot`
    /// database function, which locks the slot row `FOR UPDATE`, so two
    /// concurrent claims serialize on the row and at most `capacity`
    /// bookings ever succeed. The function raises `SLOT_NOT_FOUND`,
    /// `SLOT_CLOSED`, `SLOT_FULL` or `SLOT_IN_PAST`; a lock wait that
    /// exceeds the statement timeout surfaces as a transient lock error the
    /// caller should answer by offering different slots, not by retrying
    /// this one.
    pub async fn book(
        &self,
        slot_id: Uuid,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<TimeSlot, ScheduleError> {
        debug!("Booking slot {} for appointment {}", slot_id, appointment_id);

        let args = json!({
            "p_slot_id": slot_id,
            "p_appointment_id": appointment_id,
        });

        let result: Vec<Value> = self
            .supabase
            .rpc("book_time_slot", Some(auth_token), args)
            .await
            .map_err(map_slot_error)?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::NotFound("Time slot".to_string()))?;

        let slot: TimeSlot = serde_json::from_value(row)
            .map_err(|e| ScheduleError::Database(format!("Failed to parse time slot: {}", e)))?;

        info!(
            "Slot {} booked ({}/{} taken)",
            slot.id, slot.booked_count, slot.capacity
        );
        Ok(slot)
    }

    /// Release one booking from a slot. Runs under the same row lock as
    /// `book`; a previously-full slot re-opens. Raises `SLOT_NOT_FOUND` or
    /// `SLOT_NOT_BOOKED`.
    pub async fn release(
        &self,
        slot_id: Uuid,
        auth_token: &str,
    ) -> Result<TimeSlot, ScheduleError> {
        debug!("Releasing booking on slot {}", slot_id);

        let args = json!({ "p_slot_id": slot_id });

        let result: Vec<Value> = self
            .supabase
            .rpc("release_time_slot", Some(auth_token), args)
            .await
            .map_err(map_slot_error)?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::NotFound("Time slot".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| ScheduleError::Database(format!("Failed to parse time slot: {}", e)))
    }

    /// Soft-cancel: the slot stays on record (it may still be referenced by
    /// a cancelled appointment) but can no longer be booked.
    pub async fn retire(&self, slot_id: Uuid, auth_token: &str) -> Result<(), ScheduleError> {
        debug!("Retiring slot {}", slot_id);

        let path = format!("/rest/v1/time_slots?id=eq.{}", slot_id);
        let body = json!({
            "is_available": false,
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

    /// Delete future slots generated from a template, but only rows nobody
    /// has booked; booked slots are only ever soft-cancelled through the
    /// explicit cancellation path.
    pub async fn delete_unbooked_for_template(
        &self,
        template_id: Uuid,
        from: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<usize, ScheduleError> {
        let path = format!(
            "/rest/v1/time_slots?template_id=eq.{}&booked_count=eq.0&start_time=gte.{}",
            template_id,
            urlencoding::encode(&from.to_rfc3339()),
        );

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let deleted: Vec<Value> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        debug!(
            "Deleted {} unbooked slots for template {}",
            deleted.len(),
            template_id
        );
        Ok(deleted.len())
    }

    /// Daily maintenance: close out slots whose window has already passed.
    /// Touches only `is_available`, so it is idempotent and safe to run
    /// while bookings are in flight.
    pub async fn disable_elapsed(
        &self,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<usize, ScheduleError> {
        let path = format!(
            "/rest/v1/time_slots?end_time=lt.{}&is_available=eq.true",
            urlencoding::encode(&now.to_rfc3339()),
        );
        let body = json!({
            "is_available": false,
            "updated_at": now.to_rfc3339(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let disabled: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(body), Some(headers))
            .await
            .map_err(|e| ScheduleError::Database(e.to_string()))?;

        if !disabled.is_empty() {
            info!("Disabled {} elapsed slots", disabled.len());
        }
        Ok(disabled.len())
    }
}

fn insert_body(slot: &NewTimeSlot, now: DateTime<Utc>) -> Value {
    json!({
        "doctor_id": slot.doctor_id,
        "template_id": slot.template_id,
        "start_time": slot.start_time.to_rfc3339(),
        "end_time": slot.end_time.to_rfc3339(),
        "capacity": slot.capacity,
        "booked_count": 0,
        "is_available": true,
        "appointment_mode": slot.appointment_mode,
        "location_id": slot.location_id,
        "consultation_fee": slot.consultation_fee,
        "created_at": now.to_rfc3339(),
        "updated_at": now.to_rfc3339()
    })
}

fn parse_slots(rows: Vec<Value>) -> Result<Vec<TimeSlot>, ScheduleError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row)
                .map_err(|e| ScheduleError::Database(format!("Failed to parse time slot: {}", e)))
        })
        .collect()
}

/// Translates the database function's error markers into the booking error
/// taxonomy, so clients always learn the specific reason a claim failed.
fn map_slot_error(err: anyhow::Error) -> ScheduleError {
    let text = err.to_string();
    if text.contains("SLOT_NOT_FOUND") {
        ScheduleError::NotFound("Time slot".to_string())
    } else if text.contains("SLOT_CLOSED") {
        ScheduleError::SlotClosed
    } else if text.contains("SLOT_FULL") {
        ScheduleError::SlotFull
    } else if text.contains("SLOT_IN_PAST") {
        ScheduleError::SlotInPast
    } else if text.contains("SLOT_NOT_BOOKED") {
        ScheduleError::SlotNotBooked
    } else if text.contains("55P03") || text.contains("lock timeout") {
        ScheduleError::LockTimeout
    } else {
        ScheduleError::Database(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_error_markers_map_to_specific_reasons() {
        let full = map_slot_error(anyhow::anyhow!("API error (409): {{\"message\":\"SLOT_FULL\"}}"));
        assert!(matches!(full, ScheduleError::SlotFull));

        let past = map_slot_error(anyhow::anyhow!("API error (400): SLOT_IN_PAST"));
        assert!(matches!(past, ScheduleError::SlotInPast));

        let missing = map_slot_error(anyhow::anyhow!("Resource not found: SLOT_NOT_FOUND"));
        assert!(matches!(missing, ScheduleError::NotFound(_)));

        let locked = map_slot_error(anyhow::anyhow!(
            "API error (500): canceling statement due to lock timeout, SQLSTATE 55P03"
        ));
        assert!(matches!(locked, ScheduleError::LockTimeout));

        let other = map_slot_error(anyhow::anyhow!("API error (500): connection reset"));
        assert!(matches!(other, ScheduleError::Database(_)));
    }
}
