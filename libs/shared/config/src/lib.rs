use std::env;

use chrono::{FixedOffset, NaiveDate, Utc};
use tracing::warn;

/// Rolling slot-generation horizon cap; a single generation call may never
/// cover more than this many days.
pub const MAX_GENERATION_RANGE_DAYS: i64 = 90;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    /// Fixed business timezone, as minutes east of UTC. All day-of-week
    /// resolution and wall-clock conversion goes through this single offset.
    pub business_utc_offset_minutes: i32,
    /// How many days ahead the rolling horizon keeps slots materialized.
    pub slot_horizon_days: i64,
    /// Upper bound on generated + bulk-inserted slots per doctor per day.
    pub max_slots_per_doctor_per_day: usize,
    /// Webhook receiving cancellation notices; empty disables dispatch.
    pub cancellation_webhook_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            business_utc_offset_minutes: parse_env_or("CLINIC_UTC_OFFSET_MINUTES", 0),
            slot_horizon_days: parse_env_or("SLOT_HORIZON_DAYS", 30),
            max_slots_per_doctor_per_day: parse_env_or("MAX_SLOTS_PER_DOCTOR_PER_DAY", 48),
            cancellation_webhook_url: env::var("CANCELLATION_WEBHOOK_URL").unwrap_or_default(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// The clinic's fixed business timezone. Offsets outside the valid
    /// UTC-offset range fall back to UTC with a warning.
    pub fn business_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.business_utc_offset_minutes * 60).unwrap_or_else(|| {
            warn!(
                "CLINIC_UTC_OFFSET_MINUTES={} is not a valid UTC offset, falling back to UTC",
                self.business_utc_offset_minutes
            );
            FixedOffset::east_opt(0).unwrap()
        })
    }

    /// Today's calendar date in the business timezone.
    pub fn business_today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.business_offset()).date_naive()
    }

    /// The earliest date schedule changes and slot generation may touch:
    /// today's calendar is frozen, everything applies from tomorrow.
    pub fn business_tomorrow(&self) -> NaiveDate {
        self.business_today().succ_opt().unwrap_or(NaiveDate::MAX)
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a valid value, using default", key);
            default
        }),
        Err(_) => default,
    }
}
