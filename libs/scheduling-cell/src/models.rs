use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schedule category. Each category carries a fixed priority; per calendar
/// date only the highest-priority category present governs that day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    Regular,
    Temporary,
    Holiday,
    BlockOut,
    Emergency,
}

impl ScheduleType {
    pub fn priority(&self) -> i32 {
        match self {
            ScheduleType::Regular => 0,
            ScheduleType::Temporary => 50,
            ScheduleType::Holiday => 100,
            ScheduleType::BlockOut => 200,
            ScheduleType::Emergency => 300,
        }
    }
}

impl std::fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScheduleType::Regular => "regular",
            ScheduleType::Temporary => "temporary",
            ScheduleType::Holiday => "holiday",
            ScheduleType::BlockOut => "block_out",
            ScheduleType::Emergency => "emergency",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentMode {
    InPerson,
    Remote,
}

impl std::fmt::Display for AppointmentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentMode::InPerson => write!(f, "in_person"),
            AppointmentMode::Remote => write!(f, "remote"),
        }
    }
}

/// An availability rule for one doctor: either recurring on a weekday
/// (0 = Sunday .. 6 = Saturday) or a one-off override for a specific date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleTemplate {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: Option<i32>,
    pub specific_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
    pub slot_duration_minutes: i32,
    pub slot_capacity: i32,
    pub appointment_mode: AppointmentMode,
    pub location_id: Option<Uuid>,
    pub effective_from: Option<NaiveDate>,
    pub effective_until: Option<NaiveDate>,
    pub schedule_type: ScheduleType,
    pub priority: i32,
    pub is_available: bool,
    pub consultation_fee: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleTemplate {
    /// Whether this template's recurrence and validity window cover `date`.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        let recurrence_match = match (self.specific_date, self.day_of_week) {
            (Some(specific), _) => specific == date,
            (None, Some(dow)) => dow == weekday_number(date),
            (None, None) => false,
        };

        recurrence_match
            && self.effective_from.map_or(true, |from| date >= from)
            && self.effective_until.map_or(true, |until| date <= until)
    }

    pub fn window_overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.start_time < end && start < self.end_time
    }

    pub fn effective_range_overlaps(
        &self,
        from: Option<NaiveDate>,
        until: Option<NaiveDate>,
    ) -> bool {
        let own_from = self.effective_from.unwrap_or(NaiveDate::MIN);
        let own_until = self.effective_until.unwrap_or(NaiveDate::MAX);
        own_from <= until.unwrap_or(NaiveDate::MAX) && from.unwrap_or(NaiveDate::MIN) <= own_until
    }

    /// True when both templates share a recurrence key: the same weekday for
    /// recurring rules, or the same calendar date for one-off rules.
    pub fn same_recurrence_key(
        &self,
        day_of_week: Option<i32>,
        specific_date: Option<NaiveDate>,
    ) -> bool {
        match (specific_date, self.specific_date) {
            (Some(theirs), Some(ours)) => theirs == ours,
            (None, None) => day_of_week.is_some() && day_of_week == self.day_of_week,
            _ => false,
        }
    }

    pub fn break_overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        match (self.break_start, self.break_end) {
            (Some(break_start), Some(break_end)) => start < break_end && break_start < end,
            _ => false,
        }
    }

    /// Whether an appointment at the given local date/time, with the given
    /// modality, fits inside this template's shape.
    pub fn covers(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        mode: AppointmentMode,
    ) -> bool {
        self.applies_on(date)
            && self.start_time <= start
            && end <= self.end_time
            && !self.break_overlaps(start, end)
            && self.appointment_mode == mode
    }

    pub fn window_label(&self) -> String {
        format!(
            "{}-{}",
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M")
        )
    }
}

/// Weekday as stored on templates: 0 = Sunday .. 6 = Saturday.
pub fn weekday_number(date: NaiveDate) -> i32 {
    date.weekday().num_days_from_sunday() as i32
}

/// A single bookable unit materialized from one winning template for one
/// calendar date. `booked_count` only ever changes through the atomic
/// book/release operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub template_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: i32,
    pub booked_count: i32,
    pub is_available: bool,
    pub appointment_mode: AppointmentMode,
    pub location_id: Option<Uuid>,
    pub consultation_fee: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeSlot {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && start < self.end_time
    }

    pub fn remaining_capacity(&self) -> i32 {
        self.capacity - self.booked_count
    }
}

/// A slot candidate produced by the generator, not yet persisted.
#[derive(Debug, Clone)]
pub struct NewTimeSlot {
    pub doctor_id: Uuid,
    pub template_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: i32,
    pub appointment_mode: AppointmentMode,
    pub location_id: Option<Uuid>,
    pub consultation_fee: Option<f64>,
}

impl NewTimeSlot {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && start < self.end_time
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    pub day_of_week: Option<i32>,
    pub specific_date: Option<NaiveDate>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
    pub slot_duration_minutes: i32,
    pub slot_capacity: i32,
    pub appointment_mode: AppointmentMode,
    pub location_id: Option<Uuid>,
    pub effective_from: Option<NaiveDate>,
    pub effective_until: Option<NaiveDate>,
    pub schedule_type: ScheduleType,
    pub consultation_fee: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateScheduleRequest {
    pub day_of_week: Option<i32>,
    pub specific_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
    pub slot_duration_minutes: Option<i32>,
    pub slot_capacity: Option<i32>,
    pub appointment_mode: Option<AppointmentMode>,
    pub location_id: Option<Uuid>,
    pub effective_from: Option<NaiveDate>,
    pub effective_until: Option<NaiveDate>,
    pub schedule_type: Option<ScheduleType>,
    pub consultation_fee: Option<f64>,
    pub is_available: Option<bool>,
}

/// Cross-priority overlap is legal but worth flagging: the higher-priority
/// rule will own every date both rules share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowWarning {
    pub existing_id: Uuid,
    pub existing_window: String,
    pub existing_priority: i32,
    pub relation: ShadowRelation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadowRelation {
    /// The new template outranks the existing one on shared dates.
    ShadowsExisting,
    /// The existing template outranks the new one on shared dates.
    ShadowedByExisting,
}

/// Whether a template edit can be applied in place or has to run through
/// the reconciliation cascade first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeImpact {
    Cosmetic,
    Structural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Created,
    AlreadyGenerated,
    NoTemplates,
}

#[derive(Debug, Serialize)]
pub struct GenerationOutcome {
    pub status: GenerationStatus,
    pub created: Vec<TimeSlot>,
    pub skipped_existing: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateSlotsRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSlotRequest {
    pub appointment_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        };
        write!(f, "{}", name)
    }
}

/// The slice of the appointment entity reconciliation needs: enough to find
/// bookings that no longer fit a changed schedule and cancel them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub scheduled_start_time: DateTime<Utc>,
    pub scheduled_end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub appointment_mode: AppointmentMode,
}

/// One cancellation, collected during the reconciliation mutation phase and
/// dispatched to the notification gateway only after all writes complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationNotice {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_start_time: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ReconciliationReport {
    pub cancelled_appointments: Vec<Uuid>,
    pub retired_slots: Vec<Uuid>,
    pub deleted_slots: usize,
    pub regenerated_slots: usize,
}

#[derive(Debug, Serialize)]
pub struct MaintenanceReport {
    pub disabled_slots: usize,
    pub doctors_processed: usize,
    pub slots_generated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(day_of_week: Option<i32>, specific_date: Option<NaiveDate>) -> ScheduleTemplate {
        ScheduleTemplate {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            day_of_week,
            specific_date,
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
            priority: ScheduleType::Regular.priority(),
            is_available: true,
            consultation_fee: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn recurring_template_matches_weekday() {
        // 2025-06-02 is a Monday
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let t = template(Some(1), None);

        assert!(t.applies_on(monday));
        assert!(!t.applies_on(monday.succ_opt().unwrap()));
    }

    #[test]
    fn specific_date_wins_over_day_of_week_field() {
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let t = template(Some(1), Some(monday.succ_opt().unwrap()));

        // With a specific date set, the weekday field is ignored.
        assert!(!t.applies_on(monday));
        assert!(t.applies_on(monday.succ_opt().unwrap()));
    }

    #[test]
    fn effective_window_bounds_application() {
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let next_monday = NaiveDate::from_ymd_opt(2025, 6, 9).unwrap();
        let mut t = template(Some(1), None);
        t.effective_from = Some(next_monday);

        assert!(!t.applies_on(monday));
        assert!(t.applies_on(next_monday));
    }

    #[test]
    fn covers_rejects_break_overlap_and_mode_mismatch() {
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let mut t = template(Some(1), None);
        t.break_start = NaiveTime::from_hms_opt(12, 0, 0);
        t.break_end = NaiveTime::from_hms_opt(13, 0, 0);

        let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        let half_ten = NaiveTime::from_hms_opt(10, 30, 0).unwrap();
        assert!(t.covers(monday, ten, half_ten, AppointmentMode::Remote));
        assert!(!t.covers(monday, ten, half_ten, AppointmentMode::InPerson));

        let noon_ish = NaiveTime::from_hms_opt(12, 30, 0).unwrap();
        let one = NaiveTime::from_hms_opt(13, 0, 0).unwrap();
        assert!(!t.covers(monday, noon_ish, one, AppointmentMode::Remote));
    }

    #[test]
    fn open_ended_effective_ranges_always_overlap() {
        let t = template(Some(1), None);
        assert!(t.effective_range_overlaps(None, None));
        assert!(t.effective_range_overlaps(Some(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()), None));
    }
}
