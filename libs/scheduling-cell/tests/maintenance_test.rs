use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chrono::{Duration, Utc};
use scheduling_cell::services::maintenance::MaintenanceService;
use shared_utils::test_utils::{MockScheduleResponses, TestConfig};

#[tokio::test]
async fn daily_pass_disables_elapsed_slots_and_rolls_the_horizon() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    // Two elapsed slots get closed out.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": Uuid::new_v4()}, {"id": Uuid::new_v4()}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The same doctor appears twice; the sweep deduplicates.
    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_templates"))
        .and(query_param("select", "doctor_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"doctor_id": doctor_id.to_string()},
            {"doctor_id": doctor_id.to_string()}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The doctor's only template is a one-off for tomorrow, so nothing
    // applies on the day entering the horizon.
    let tomorrow = Utc::now().date_naive() + Duration::days(1);
    let mut one_off = MockScheduleResponses::schedule_template(
        &Uuid::new_v4().to_string(),
        &doctor_id.to_string(),
    );
    one_off["day_of_week"] = json!(null);
    one_off["specific_date"] = json!(tomorrow);

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_templates"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([one_off])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = MaintenanceService::new(&config);
    let report = service.run_daily("service-token").await.unwrap();

    assert_eq!(report.disabled_slots, 2);
    assert_eq!(report.doctors_processed, 1);
    assert_eq!(report.slots_generated, 0);

    // The pass never inserted anything.
    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| !(r.method.to_string() == "POST" && r.url.path() == "/rest/v1/time_slots")));
}
