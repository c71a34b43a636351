use chrono::NaiveDate;

use crate::models::{ScheduleTemplate, ScheduleType};

/// Which templates govern one calendar date. All templates sharing the top
/// priority win together; every lower-priority template is ignored for the
/// whole day, even outside the winners' hours.
#[derive(Debug)]
pub struct DayResolution<'a> {
    pub winners: Vec<&'a ScheduleTemplate>,
}

impl<'a> DayResolution<'a> {
    pub fn is_empty(&self) -> bool {
        self.winners.is_empty()
    }

    pub fn schedule_type(&self) -> Option<ScheduleType> {
        self.winners.first().map(|t| t.schedule_type)
    }

    /// A block-out winner vetoes the whole day: zero slots.
    pub fn is_blocked(&self) -> bool {
        matches!(self.schedule_type(), Some(ScheduleType::BlockOut))
    }
}

/// Resolves which of a doctor's templates govern `date`.
///
/// Unavailable templates are skipped, with one exception: a block-out is
/// considered even while unavailable, because its entire purpose is to veto
/// the day.
pub fn resolve_day(date: NaiveDate, templates: &[ScheduleTemplate]) -> DayResolution<'_> {
    let active: Vec<&ScheduleTemplate> = templates
        .iter()
        .filter(|t| t.applies_on(date))
        .filter(|t| t.is_available || t.schedule_type == ScheduleType::BlockOut)
        .collect();

    let Some(max_priority) = active.iter().map(|t| t.priority).max() else {
        return DayResolution { winners: Vec::new() };
    };

    DayResolution {
        winners: active
            .into_iter()
            .filter(|t| t.priority == max_priority)
            .collect(),
    }
}
