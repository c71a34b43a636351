use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub cancellation_webhook_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            cancellation_webhook_url: String::new(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            business_utc_offset_minutes: 0,
            slot_horizon_days: 30,
            max_slots_per_doctor_per_day: 48,
            cancellation_webhook_url: self.cancellation_webhook_url.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows for the scheduling tables, shaped like the real
/// database payloads. Tests tweak individual fields by index assignment.
pub struct MockScheduleResponses;

impl MockScheduleResponses {
    /// A recurring Monday 09:00-17:00 template, 30-minute slots, capacity 1.
    pub fn schedule_template(template_id: &str, doctor_id: &str) -> Value {
        json!({
            "id": template_id,
            "doctor_id": doctor_id,
            "day_of_week": 1,
            "specific_date": null,
            "start_time": "09:00:00",
            "end_time": "17:00:00",
            "break_start": null,
            "break_end": null,
            "slot_duration_minutes": 30,
            "slot_capacity": 1,
            "appointment_mode": "remote",
            "location_id": null,
            "effective_from": null,
            "effective_until": null,
            "schedule_type": "regular",
            "priority": 0,
            "is_available": true,
            "consultation_fee": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn time_slot(slot_id: &str, doctor_id: &str, start: &str, end: &str) -> Value {
        json!({
            "id": slot_id,
            "doctor_id": doctor_id,
            "template_id": null,
            "start_time": start,
            "end_time": end,
            "capacity": 1,
            "booked_count": 0,
            "is_available": true,
            "appointment_mode": "remote",
            "location_id": null,
            "consultation_fee": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment(appointment_id: &str, doctor_id: &str, start: &str, end: &str) -> Value {
        json!({
            "id": appointment_id,
            "doctor_id": doctor_id,
            "patient_id": Uuid::new_v4().to_string(),
            "slot_id": null,
            "scheduled_start_time": start,
            "scheduled_end_time": end,
            "status": "confirmed",
            "appointment_mode": "remote"
        })
    }

    pub fn doctor_profile(doctor_id: &str) -> Value {
        json!({
            "id": doctor_id,
            "primary_location_id": null,
            "consultation_fee": 45.0
        })
    }
}
