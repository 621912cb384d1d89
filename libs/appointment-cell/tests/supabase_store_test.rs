use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::{
    Appointment, AppointmentBookingService, AppointmentError, AppointmentStatus,
    AppointmentStore, BookAppointmentRequest, Caller, InMemoryAppointmentStore, NoopEvents,
    SlotPolicy, SupabaseAppointmentStore, SupabaseUserDirectory, UserDirectory,
};
use notification_cell::{Notifier, RecordingGateway};
use shared_database::supabase::SupabaseClient;
use shared_models::auth::UserRole;
use shared_models::error::AppError;
use shared_models::contact::Contact;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

fn client(server: &MockServer) -> Arc<SupabaseClient> {
    let config = TestConfig::with_mock_server(&server.uri()).to_app_config();
    Arc::new(SupabaseClient::new(&config))
}

fn appointment(doctor_id: Uuid) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        doctor_id,
        day: NaiveDate::from_ymd_opt(2030, 1, 15).unwrap(),
        time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        description: "Persistent cough".to_string(),
        symptoms: None,
        room_id: "k3j9x0q2m4pa".to_string(),
        status: AppointmentStatus::Pending,
        follow_up_notification_sent: false,
        same_day_reminder_sent: false,
        follow_up_instructions: None,
        follow_up_of: None,
        reminder_due_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_insert_returns_stored_row() {
    let server = MockServer::start().await;
    let patient = Uuid::new_v4();
    let doctor = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!({ "time": "10:00", "status": "pending" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(patient, doctor, "2030-01-15", "10:00")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = SupabaseAppointmentStore::new(client(&server));
    let stored = store
        .insert_if_free(appointment(doctor), SlotPolicy::ActiveOnly)
        .await
        .unwrap();

    assert_eq!(stored.patient_id, patient);
    assert_eq!(stored.time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
}

#[tokio::test]
async fn test_unique_violation_is_slot_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response(
                "duplicate key value violates unique constraint \"appointments_active_slot_idx\"",
                "23505",
            ),
        ))
        .mount(&server)
        .await;

    let store = SupabaseAppointmentStore::new(client(&server));
    let result = store
        .insert_if_free(appointment(Uuid::new_v4()), SlotPolicy::ActiveOnly)
        .await;

    assert_matches!(result, Err(AppointmentError::SlotUnavailable));
}

#[tokio::test]
async fn test_any_status_policy_checks_existing_rows_first() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();

    let mut cancelled =
        MockSupabaseResponses::appointment_response(Uuid::new_v4(), doctor, "2030-01-15", "10:00");
    cancelled["status"] = json!("cancelled");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor)))
        .and(query_param("time", "eq.10:00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let store = SupabaseAppointmentStore::new(client(&server));
    let result = store.insert_if_free(appointment(doctor), SlotPolicy::AnyStatus).await;
    assert_matches!(result, Err(AppointmentError::SlotUnavailable));
}

#[tokio::test]
async fn test_doctor_listing_filters_on_doctor_column() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor)))
        .and(query_param("order", "day.desc,time.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(Uuid::new_v4(), doctor, "2030-01-16", "09:00"),
            MockSupabaseResponses::appointment_response(Uuid::new_v4(), doctor, "2030-01-15", "10:00")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = SupabaseAppointmentStore::new(client(&server));
    let rows = store.list_for_user(doctor, UserRole::Doctor).await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_find_by_day_filters_statuses() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("day", "eq.2030-01-15"))
        .and(query_param("status", "in.(pending,confirmed)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let store = SupabaseAppointmentStore::new(client(&server));
    let rows = store
        .find_by_day(NaiveDate::from_ymd_opt(2030, 1, 15).unwrap(), &AppointmentStatus::UPCOMING)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_flag_update_and_missing_row() {
    let server = MockServer::start().await;
    let row = MockSupabaseResponses::appointment_response(Uuid::new_v4(), Uuid::new_v4(), "2030-01-15", "10:00");
    let id: Uuid = serde_json::from_value(row["id"].clone()).unwrap();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(body_partial_json(json!({ "follow_up_notification_sent": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = SupabaseAppointmentStore::new(client(&server));
    store.mark_follow_up_notified(id).await.unwrap();
    assert_matches!(store.delete(Uuid::new_v4()).await, Err(AppointmentError::NotFound));
}

#[tokio::test]
async fn test_directory_reads_profiles_with_role() {
    let server = MockServer::start().await;
    let doctor = TestUser::doctor("rao@clinic.example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{}", doctor.id)))
        .and(query_param("role", "eq.doctor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::profile_response(&doctor)
        ])))
        .mount(&server)
        .await;

    let directory = SupabaseUserDirectory::new(client(&server));
    let profile = directory
        .find_with_role(doctor.id, UserRole::Doctor)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(profile.role, UserRole::Doctor);
    assert_eq!(profile.contact, Contact::Email("rao@clinic.example.com".to_string()));
    assert_eq!(profile.speciality.as_deref(), Some("General Practice"));
}

#[tokio::test]
async fn test_unusable_contact_is_a_validation_error_not_a_database_error() {
    let server = MockServer::start().await;
    let patient = TestUser::patient("ravi@example.com");
    let doctor = TestUser::doctor("rao@clinic.example.com");

    let mut broken = MockSupabaseResponses::profile_response(&patient);
    broken["contact"] = json!("call reception");
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{}", patient.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([broken])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{}", doctor.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::profile_response(&doctor)
        ])))
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_server(&server.uri()).to_arc();
    let service = AppointmentBookingService::new(
        &config,
        Arc::new(InMemoryAppointmentStore::new()),
        Arc::new(SupabaseUserDirectory::new(client(&server))),
        Notifier::new(Arc::new(RecordingGateway::new()), config.sms_country_code.clone()),
        Arc::new(NoopEvents),
    );

    let result = service
        .book(
            Caller::new(patient.id, UserRole::Patient),
            BookAppointmentRequest {
                doctor_id: Some(doctor.id.to_string()),
                day: Some("2030-01-15".to_string()),
                time: Some("10:00".to_string()),
                description: Some("Checkup".to_string()),
                symptoms: None,
            },
        )
        .await;

    assert_matches!(
        result,
        Err(AppointmentError::UnusableContact { user_id, .. }) if user_id == patient.id
    );
    let status = AppError::from(AppointmentError::UnusableContact {
        user_id: patient.id,
        reason: String::new(),
    })
    .status_code();
    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
}
