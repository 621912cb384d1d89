mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::{appointment_routes, AppointmentState};
use shared_models::auth::UserRole;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

use common::{Fixture, FAR_DAY};

struct Api {
    fx: Fixture,
    app: Router,
}

impl Api {
    fn new() -> Self {
        let fx = Fixture::new();
        let app = appointment_routes(AppointmentState::new(fx.config.clone(), fx.service.clone()));
        Self { fx, app }
    }

    async fn register(&self, user: &TestUser, role: UserRole) -> String {
        self.fx
            .add_user_with_id(user.id, &user.name, role, &user.email)
            .await;
        JwtTestUtils::create_test_token(user, &TestConfig::default().jwt_secret, Some(1))
    }

    async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }
}

#[tokio::test]
async fn test_book_and_list_over_http() {
    let api = Api::new();
    let doctor = TestUser::doctor("rao@clinic.example.com");
    let patient = TestUser::patient("asha@example.com");
    api.register(&doctor, UserRole::Doctor).await;
    let token = api.register(&patient, UserRole::Patient).await;

    let body = json!({
        "doctor_id": doctor.id,
        "day": FAR_DAY,
        "time": "10:00",
        "description": "Persistent cough"
    });

    let (status, json) = api.call("POST", "/", Some(&token), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert_eq!(json["appointment"]["status"], "pending");
    assert_eq!(json["appointment"]["time"], "10:00");

    let (status, json) = api.call("POST", "/", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);

    let (status, json) = api.call("GET", "/my", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let api = Api::new();

    let (status, _) = api.call("GET", "/my", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let user = TestUser::patient("asha@example.com");
    let expired = JwtTestUtils::create_expired_token(&user, &TestConfig::default().jwt_secret);
    let (status, _) = api.call("GET", "/my", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_validation_errors_are_bad_requests() {
    let api = Api::new();
    let patient = TestUser::patient("asha@example.com");
    let token = api.register(&patient, UserRole::Patient).await;

    let (status, json) = api
        .call("POST", "/", Some(&token), Some(json!({ "day": FAR_DAY, "time": "10:00" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("doctor_id"));
}

#[tokio::test]
async fn test_doctor_actions_over_http() {
    let api = Api::new();
    let doctor = TestUser::doctor("rao@clinic.example.com");
    let patient = TestUser::patient("asha@example.com");
    let doctor_token = api.register(&doctor, UserRole::Doctor).await;
    let patient_token = api.register(&patient, UserRole::Patient).await;

    let (_, json) = api
        .call(
            "POST",
            "/",
            Some(&patient_token),
            Some(json!({
                "doctor_id": doctor.id,
                "day": FAR_DAY,
                "time": "11:00",
                "description": "Headache"
            })),
        )
        .await;
    let id = json["appointment"]["id"].as_str().unwrap().to_string();

    let (status, _) = api
        .call("PATCH", &format!("/{}/complete", id), Some(&patient_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = api
        .call("PATCH", &format!("/{}/confirm", id), Some(&doctor_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["appointment"]["status"], "confirmed");

    let (status, _) = api
        .call("POST", &format!("/{}/doctor-joined", id), Some(&doctor_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = api
        .call("PATCH", &format!("/{}/complete", id), Some(&doctor_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["appointment"]["status"], "completed");

    let (status, _) = api
        .call("PATCH", &format!("/{}/complete", id), Some(&doctor_token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = api
        .call(
            "POST",
            &format!("/{}/follow-up", id),
            Some(&doctor_token),
            Some(json!({ "day": "2030-01-22", "time": "11:00", "instructions": "Fasting" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["appointment"]["follow_up_of"], id.as_str());

    let (status, _) = api
        .call("DELETE", &format!("/{}", id), Some(&patient_token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_slots_are_public() {
    let api = Api::new();
    let doctor = TestUser::doctor("rao@clinic.example.com");
    api.register(&doctor, UserRole::Doctor).await;

    let (status, json) = api
        .call("GET", &format!("/slots/{}/{}", doctor.id, FAR_DAY), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["available_slots"].as_array().unwrap().len(), 16);
    assert_eq!(json["available_slots"][0], "09:00");

    let (status, _) = api
        .call("GET", &format!("/slots/{}/{}", uuid::Uuid::new_v4(), FAR_DAY), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_appointment_is_not_found() {
    let api = Api::new();
    let patient = TestUser::patient("asha@example.com");
    let token = api.register(&patient, UserRole::Patient).await;

    let (status, _) = api
        .call("GET", &format!("/{}", uuid::Uuid::new_v4()), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = api.call("GET", "/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_role_comes_only_from_app_metadata() {
    let api = Api::new();
    let doctor = TestUser::doctor("rao@clinic.example.com");
    let patient = TestUser::patient("asha@example.com");
    let outsider = TestUser::patient("ravi@example.com");
    let admin = TestUser::admin("ops@clinic.example.com");
    api.register(&doctor, UserRole::Doctor).await;
    let patient_token = api.register(&patient, UserRole::Patient).await;
    api.register(&outsider, UserRole::Patient).await;
    let admin_token = api.register(&admin, UserRole::Admin).await;

    let body = json!({
        "doctor_id": doctor.id,
        "day": FAR_DAY,
        "time": "10:00",
        "description": "Checkup"
    });
    let (status, json) = api.call("POST", "/", Some(&patient_token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/{}", json["appointment"]["id"].as_str().unwrap());

    // Users can write their own user_metadata.
    let forged = JwtTestUtils::sign_claims(
        &json!({
            "sub": outsider.id,
            "email": outsider.email,
            "role": "authenticated",
            "user_metadata": { "role": "admin" },
            "exp": chrono::Utc::now().timestamp() + 3600
        }),
        &TestConfig::default().jwt_secret,
    );
    let (status, json) = api.call("GET", &uri, Some(&forged), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(json.get("appointment").is_none());

    let (status, json) = api.call("GET", &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["appointment"]["patient_id"], patient.id.to_string());
}
