use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

/// Error taxonomy of the scheduling core. Validation failures are the
/// caller's fault, conflicts are state-dependent rejections the caller can
/// react to (pick another slot, adjust the window), and both carry the
/// specific reason so clients never have to guess.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Schedule overlaps template {existing_id} ({window}, priority {priority})")]
    TemplateOverlap {
        existing_id: Uuid,
        window: String,
        priority: i32,
    },

    #[error("Slot overlaps an existing slot")]
    SlotOverlap,

    #[error("Slot is no longer open")]
    SlotClosed,

    #[error("Slot is fully booked")]
    SlotFull,

    #[error("Slot start time is in the past")]
    SlotInPast,

    #[error("Slot has no booking to release")]
    SlotNotBooked,

    #[error("Could not lock slot in time, try another slot")]
    LockTimeout,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Validation(_) => AppError::BadRequest(err.to_string()),
            ScheduleError::TemplateOverlap { .. }
            | ScheduleError::SlotOverlap
            | ScheduleError::SlotClosed
            | ScheduleError::SlotFull
            | ScheduleError::SlotNotBooked
            | ScheduleError::LockTimeout => AppError::Conflict(err.to_string()),
            ScheduleError::SlotInPast => AppError::BadRequest(err.to_string()),
            ScheduleError::NotFound(_) => AppError::NotFound(err.to_string()),
            ScheduleError::Database(msg) => AppError::Database(msg),
        }
    }
}
