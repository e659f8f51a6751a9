use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::services::AutoAssignmentVisibilityService;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn utc(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

struct TestSetup {
    mock_server: MockServer,
    service: AutoAssignmentVisibilityService,
    clinic_id: Uuid,
    practitioner_id: Uuid,
}

impl TestSetup {
    async fn new(booking_settings: Value) -> Self {
        let mock_server = MockServer::start().await;
        let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
        let service = AutoAssignmentVisibilityService::new(&config);
        let clinic_id = Uuid::new_v4();
        let practitioner_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/clinics"))
            .and(query_param("is_active", "eq.true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::clinic_row(clinic_id, "康和復健科診所", booking_settings)
            ])))
            .mount(&mock_server)
            .await;

        Self {
            mock_server,
            service,
            clinic_id,
            practitioner_id,
        }
    }

    async fn mount_practitioner(&self, active: bool, notification_settings: Value) {
        let mut row = MockSupabaseResponses::association_row(
            self.clinic_id,
            self.practitioner_id,
            &["practitioner"],
            Some("U-practitioner"),
            notification_settings,
        );
        row["is_active"] = json!(active);

        // Lookup of the assigned practitioner's association
        Mock::given(method("GET"))
            .and(path("/rest/v1/user_clinic_associations"))
            .and(query_param("user_id", format!("eq.{}", self.practitioner_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([row.clone()])))
            .mount(&self.mock_server)
            .await;

        // Active-staff listing used to find admin recipients
        Mock::given(method("GET"))
            .and(path("/rest/v1/user_clinic_associations"))
            .and(query_param("is_active", "eq.true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
            .mount(&self.mock_server)
            .await;
    }

    async fn mount_candidates(&self, rows: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("is_auto_assigned", "eq.true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(rows)))
            .mount(&self.mock_server)
            .await;
    }

    async fn expect_reveal(&self, appointment_id: Uuid, times: u64) {
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("id", format!("eq.{}", appointment_id)))
            .and(query_param("is_auto_assigned", "eq.true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": appointment_id}])))
            .expect(times)
            .mount(&self.mock_server)
            .await;
    }

    async fn mount_line_push(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path("/v2/bot/message/push"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({})))
            .mount(&self.mock_server)
            .await;
    }

    fn candidate(&self, id: Uuid, date: &str, start_time: &str) -> Value {
        MockSupabaseResponses::appointment_row(
            id,
            self.clinic_id,
            Some(self.practitioner_id),
            date,
            start_time,
        )
    }
}

// ==============================================================================
// MINIMUM-HOURS MODE
// ==============================================================================

#[tokio::test]
async fn test_minimum_hours_reveals_exactly_the_due_appointments() {
    let setup = TestSetup::new(json!({
        "mode": "minimum_hours",
        "minimum_booking_hours_ahead": 24,
    }))
    .await;
    setup
        .mount_practitioner(true, json!({"auto_assigned_notification_mode": "immediate"}))
        .await;
    setup.mount_line_push(200).await;

    // now = 2026-08-06 10:00 Taipei
    let now = utc("2026-08-06T02:00:00Z");
    let in_one_hour = Uuid::new_v4(); //            starts now+1h
    let in_23_hours = Uuid::new_v4(); //            starts now+23h
    let in_25_hours = Uuid::new_v4(); // outside:   starts now+25h

    setup
        .mount_candidates(vec![
            setup.candidate(in_one_hour, "2026-08-06", "11:00:00"),
            setup.candidate(in_23_hours, "2026-08-07", "09:00:00"),
            setup.candidate(in_25_hours, "2026-08-07", "11:00:00"),
        ])
        .await;

    setup.expect_reveal(in_one_hour, 1).await;
    setup.expect_reveal(in_23_hours, 1).await;
    setup.expect_reveal(in_25_hours, 0).await;

    let summary = setup.service.run(now).await;

    assert_eq!(summary.clinics_processed, 1);
    assert_eq!(summary.revealed, 2);
    assert_eq!(summary.not_yet_due, 1);
    assert_eq!(summary.errors, 0);
}

#[tokio::test]
async fn test_rerun_with_no_remaining_candidates_flips_nothing() {
    let setup = TestSetup::new(json!({
        "mode": "minimum_hours",
        "minimum_booking_hours_ahead": 24,
    }))
    .await;
    setup
        .mount_practitioner(true, json!({"auto_assigned_notification_mode": "immediate"}))
        .await;
    setup.mount_line_push(200).await;

    let now = utc("2026-08-06T02:00:00Z");
    let appointment_id = Uuid::new_v4();

    // First run sees the candidate; after the flip the selector's
    // is_auto_assigned=true filter excludes it, so the second run sees none.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("is_auto_assigned", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            setup.candidate(appointment_id, "2026-08-06", "11:00:00")
        ])))
        .up_to_n_times(1)
        .mount(&setup.mock_server)
        .await;
    setup.mount_candidates(vec![]).await;

    setup.expect_reveal(appointment_id, 1).await;

    let first = setup.service.run(now).await;
    let second = setup.service.run(now).await;

    assert_eq!(first.revealed, 1);
    assert_eq!(second.revealed, 0);
    assert_eq!(second.errors, 0);
}

#[tokio::test]
async fn test_inactive_practitioner_keeps_appointment_hidden() {
    let setup = TestSetup::new(json!({
        "mode": "minimum_hours",
        "minimum_booking_hours_ahead": 24,
    }))
    .await;
    setup
        .mount_practitioner(false, json!({"auto_assigned_notification_mode": "immediate"}))
        .await;
    setup.mount_line_push(200).await;

    let now = utc("2026-08-06T02:00:00Z");
    let appointment_id = Uuid::new_v4();
    setup
        .mount_candidates(vec![setup.candidate(appointment_id, "2026-08-06", "11:00:00")])
        .await;

    // Due, but the assigned practitioner was deactivated: no flip.
    setup.expect_reveal(appointment_id, 0).await;

    let summary = setup.service.run(now).await;

    assert_eq!(summary.revealed, 0);
    assert_eq!(summary.errors, 1);
}

#[tokio::test]
async fn test_notification_failure_does_not_roll_back_the_flip() {
    let setup = TestSetup::new(json!({
        "mode": "minimum_hours",
        "minimum_booking_hours_ahead": 24,
    }))
    .await;
    setup
        .mount_practitioner(true, json!({"auto_assigned_notification_mode": "immediate"}))
        .await;
    setup.mount_line_push(500).await;

    let now = utc("2026-08-06T02:00:00Z");
    let appointment_id = Uuid::new_v4();
    setup
        .mount_candidates(vec![setup.candidate(appointment_id, "2026-08-06", "11:00:00")])
        .await;

    setup.expect_reveal(appointment_id, 1).await;

    let summary = setup.service.run(now).await;

    // The flip is committed before the push; the push failing is logged,
    // not counted as a processing error.
    assert_eq!(summary.revealed, 1);
    assert_eq!(summary.errors, 0);
}

#[tokio::test]
async fn test_scheduled_mode_recipients_are_not_pushed() {
    let setup = TestSetup::new(json!({
        "mode": "minimum_hours",
        "minimum_booking_hours_ahead": 24,
    }))
    .await;
    setup
        .mount_practitioner(true, json!({"auto_assigned_notification_mode": "scheduled"}))
        .await;

    // No push may happen at all.
    Mock::given(method("POST"))
        .and(path("/v2/bot/message/push"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&setup.mock_server)
        .await;

    let now = utc("2026-08-06T02:00:00Z");
    let appointment_id = Uuid::new_v4();
    setup
        .mount_candidates(vec![setup.candidate(appointment_id, "2026-08-06", "11:00:00")])
        .await;
    setup.expect_reveal(appointment_id, 1).await;

    let summary = setup.service.run(now).await;
    assert_eq!(summary.revealed, 1);
}

// ==============================================================================
// DEADLINE MODE
// ==============================================================================

#[tokio::test]
async fn test_deadline_mode_reveals_from_the_day_before_deadline() {
    let setup = TestSetup::new(json!({
        "mode": "deadline",
        "deadline_time_day_before": "08:00",
        "deadline_on_same_day": false,
    }))
    .await;
    setup
        .mount_practitioner(true, json!({"auto_assigned_notification_mode": "immediate"}))
        .await;
    setup.mount_line_push(200).await;

    // Exactly 2026-08-06 08:00 Taipei: the deadline for appointments on 08-07.
    let now = utc("2026-08-06T00:00:00Z");
    let tomorrow = Uuid::new_v4();
    let day_after = Uuid::new_v4();

    setup
        .mount_candidates(vec![
            setup.candidate(tomorrow, "2026-08-07", "15:00:00"),
            setup.candidate(day_after, "2026-08-08", "09:00:00"),
        ])
        .await;

    setup.expect_reveal(tomorrow, 1).await;
    setup.expect_reveal(day_after, 0).await;

    let summary = setup.service.run(now).await;

    assert_eq!(summary.revealed, 1);
    assert_eq!(summary.not_yet_due, 1);
}
