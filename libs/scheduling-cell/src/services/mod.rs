pub mod directory;
pub mod generator;
pub mod maintenance;
pub mod notifications;
pub mod reconciliation;
pub mod resolver;
pub mod slots;
pub mod templates;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};

/// Projects a business-timezone wall-clock moment onto the UTC timeline.
/// A fixed offset has no gaps or folds, so the conversion is total.
pub(crate) fn business_instant(
    date: NaiveDate,
    time: NaiveTime,
    offset: FixedOffset,
) -> DateTime<Utc> {
    date.and_time(time)
        .and_local_timezone(offset)
        .unwrap()
        .with_timezone(&Utc)
}

/// UTC instant at which the given business-timezone calendar date begins.
pub(crate) fn business_day_start(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    business_instant(date, NaiveTime::MIN, offset)
}

/// Tomorrow in the business timezone — the earliest date slot generation
/// and schedule changes may touch.
pub(crate) fn business_tomorrow(offset: FixedOffset) -> NaiveDate {
    Utc::now()
        .with_timezone(&offset)
        .date_naive()
        .succ_opt()
        .unwrap_or(NaiveDate::MAX)
}
