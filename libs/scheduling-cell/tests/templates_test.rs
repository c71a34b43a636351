use assert_matches::assert_matches;
use chrono::NaiveTime;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::models::{
    AppointmentMode, ChangeImpact, CreateScheduleRequest, ScheduleType, ShadowRelation,
    UpdateScheduleRequest,
};
use scheduling_cell::services::templates::ScheduleTemplateService;
use scheduling_cell::ScheduleError;
use shared_utils::test_utils::{MockScheduleResponses, TestConfig};

fn base_request() -> CreateScheduleRequest {
    CreateScheduleRequest {
        day_of_week: Some(1),
        specific_date: None,
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
        consultation_fee: None,
    }
}

#[tokio::test]
async fn create_schedule_without_conflicts() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();
    let template_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_templates"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/schedule_templates"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockScheduleResponses::schedule_template(
                &template_id.to_string(),
                &doctor_id.to_string()
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = ScheduleTemplateService::new(&config);
    let (schedule, warnings) = service
        .create(doctor_id, base_request(), "test-token")
        .await
        .unwrap();

    assert_eq!(schedule.id, template_id);
    assert_eq!(schedule.priority, 0);
    assert!(warnings.is_empty());
}

#[tokio::test]
async fn create_rejects_equal_priority_overlap() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();
    let existing_id = Uuid::new_v4();

    // Existing regular Monday 09:00-17:00 template.
    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockScheduleResponses::schedule_template(
                &existing_id.to_string(),
                &doctor_id.to_string()
            )
        ])))
        .mount(&mock_server)
        .await;

    // New regular Monday 16:00-18:00 overlaps at equal priority.
    let mut request = base_request();
    request.start_time = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
    request.end_time = NaiveTime::from_hms_opt(18, 0, 0).unwrap();

    let service = ScheduleTemplateService::new(&config);
    let err = service
        .create(doctor_id, request, "test-token")
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ScheduleError::TemplateOverlap {
            existing_id: id,
            priority: 0,
            ..
        } if id == existing_id
    );
}

#[tokio::test]
async fn create_reports_shadow_warning_for_higher_priority() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();
    let existing_id = Uuid::new_v4();
    let holiday_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockScheduleResponses::schedule_template(
                &existing_id.to_string(),
                &doctor_id.to_string()
            )
        ])))
        .mount(&mock_server)
        .await;

    let mut holiday_row =
        MockScheduleResponses::schedule_template(&holiday_id.to_string(), &doctor_id.to_string());
    holiday_row["schedule_type"] = json!("holiday");
    holiday_row["priority"] = json!(100);

    Mock::given(method("POST"))
        .and(path("/rest/v1/schedule_templates"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([holiday_row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut request = base_request();
    request.schedule_type = ScheduleType::Holiday;

    let service = ScheduleTemplateService::new(&config);
    let (schedule, warnings) = service
        .create(doctor_id, request, "test-token")
        .await
        .unwrap();

    assert_eq!(schedule.schedule_type, ScheduleType::Holiday);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].existing_id, existing_id);
    assert_eq!(warnings[0].relation, ShadowRelation::ShadowsExisting);
}

#[tokio::test]
async fn create_validates_before_touching_the_database() {
    // No mock server: a validation failure must short-circuit.
    let config = TestConfig::default().to_app_config();
    let service = ScheduleTemplateService::new(&config);

    let mut request = base_request();
    request.end_time = NaiveTime::from_hms_opt(8, 0, 0).unwrap();

    let err = service
        .create(Uuid::new_v4(), request, "test-token")
        .await
        .unwrap_err();
    assert_matches!(err, ScheduleError::Validation(_));
}

#[tokio::test]
async fn in_person_without_any_location_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    let mut profile = MockScheduleResponses::doctor_profile(&doctor_id.to_string());
    profile["primary_location_id"] = json!(null);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([profile])))
        .mount(&mock_server)
        .await;

    let mut request = base_request();
    request.appointment_mode = AppointmentMode::InPerson;

    let service = ScheduleTemplateService::new(&config);
    let err = service
        .create(doctor_id, request, "test-token")
        .await
        .unwrap_err();
    assert_matches!(err, ScheduleError::Validation(_));
}

#[tokio::test]
async fn bulk_create_rejects_overlap_inside_the_batch() {
    let config = TestConfig::default().to_app_config();
    let service = ScheduleTemplateService::new(&config);

    let first = base_request();
    let mut second = base_request();
    second.start_time = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
    second.end_time = NaiveTime::from_hms_opt(18, 0, 0).unwrap();

    let err = service
        .create_many(Uuid::new_v4(), vec![first, second], "test-token")
        .await
        .unwrap_err();
    assert_matches!(err, ScheduleError::Validation(_));
}

#[tokio::test]
async fn bulk_create_inserts_all_rows_in_one_statement() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let monday_id = Uuid::new_v4();
    let mut tuesday_row =
        MockScheduleResponses::schedule_template(&Uuid::new_v4().to_string(), &doctor_id.to_string());
    tuesday_row["day_of_week"] = json!(2);

    Mock::given(method("POST"))
        .and(path("/rest/v1/schedule_templates"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockScheduleResponses::schedule_template(
                &monday_id.to_string(),
                &doctor_id.to_string()
            ),
            tuesday_row
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let monday = base_request();
    let mut tuesday = base_request();
    tuesday.day_of_week = Some(2);

    let service = ScheduleTemplateService::new(&config);
    let (schedules, warnings) = service
        .create_many(doctor_id, vec![monday, tuesday], "test-token")
        .await
        .unwrap();

    assert_eq!(schedules.len(), 2);
    assert!(warnings.is_empty());

    // Exactly one POST carrying both rows.
    let requests = mock_server.received_requests().await.unwrap();
    let inserts: Vec<_> = requests
        .iter()
        .filter(|r| r.method.to_string() == "POST")
        .collect();
    assert_eq!(inserts.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&inserts[0].body).unwrap();
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn fee_change_is_classified_cosmetic() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();
    let template_id = Uuid::new_v4();

    let row =
        MockScheduleResponses::schedule_template(&template_id.to_string(), &doctor_id.to_string());

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_templates"))
        .and(query_param("id", format!("eq.{}", template_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row.clone()])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_templates"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    let request = UpdateScheduleRequest {
        consultation_fee: Some(80.0),
        ..Default::default()
    };

    let service = ScheduleTemplateService::new(&config);
    let prepared = service
        .prepare_update(template_id, request, "test-token")
        .await
        .unwrap();

    assert_eq!(prepared.impact, ChangeImpact::Cosmetic);
}

#[tokio::test]
async fn window_change_is_classified_structural() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();
    let template_id = Uuid::new_v4();

    let row =
        MockScheduleResponses::schedule_template(&template_id.to_string(), &doctor_id.to_string());

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_templates"))
        .and(query_param("id", format!("eq.{}", template_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row.clone()])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_templates"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    let request = UpdateScheduleRequest {
        end_time: NaiveTime::from_hms_opt(12, 0, 0),
        ..Default::default()
    };

    let service = ScheduleTemplateService::new(&config);
    let prepared = service
        .prepare_update(template_id, request, "test-token")
        .await
        .unwrap();

    assert_eq!(prepared.impact, ChangeImpact::Structural);
}

#[tokio::test]
async fn update_of_missing_template_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = ScheduleTemplateService::new(&config);
    let err = service
        .prepare_update(Uuid::new_v4(), UpdateScheduleRequest::default(), "test-token")
        .await
        .unwrap_err();
    assert_matches!(err, ScheduleError::NotFound(_));
}

#[tokio::test]
async fn block_out_cannot_be_made_available() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();
    let template_id = Uuid::new_v4();

    let mut row =
        MockScheduleResponses::schedule_template(&template_id.to_string(), &doctor_id.to_string());
    row["schedule_type"] = json!("block_out");
    row["priority"] = json!(200);
    row["is_available"] = json!(false);

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    let request = UpdateScheduleRequest {
        is_available: Some(true),
        ..Default::default()
    };

    let service = ScheduleTemplateService::new(&config);
    let err = service
        .prepare_update(template_id, request, "test-token")
        .await
        .unwrap_err();
    assert_matches!(err, ScheduleError::Validation(_));
}
