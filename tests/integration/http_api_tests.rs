//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use facility_presence::api::auth::{ACCOUNT_HEADER, STAFF_HEADER};
use facility_presence::api::{router, AppState};
use facility_presence::config::ExitTimePolicy;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::test_helpers::{test_db, OTHER_STAFF, ROOM, STAFF, STUDENT};

async fn app() -> Router {
    let db = test_db().await;
    router(AppState::new(&db, ExitTimePolicy::default()))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    staff_id: Option<i64>,
    payload: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(ACCOUNT_HEADER, "1");
    if let Some(staff_id) = staff_id {
        builder = builder.header(STAFF_HEADER, staff_id.to_string());
    }
    let request = match payload {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn open_group(app: &Router) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/active/groups",
        Some(STAFF),
        Some(json!({ "template_group_id": 5, "room_id": ROOM })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_i64().expect("group id")
}

#[tokio::test]
async fn health_needs_no_identity() {
    let app = app().await;
    let request = Request::builder().uri("/health").body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    let app = app().await;
    let request = Request::builder()
        .uri("/active/groups")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/active/groups")
        .header(ACCOUNT_HEADER, "not-a-number")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_group_returns_envelope_with_display_fields() {
    let app = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/active/groups",
        Some(STAFF),
        Some(json!({ "template_group_id": 5, "room_id": ROOM })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("Active group created"));
    assert_eq!(body["data"]["room_id"], json!(ROOM));
    assert_eq!(body["data"]["room_name"], json!("Werkraum"));
}

#[tokio::test]
async fn room_conflict_maps_to_409() {
    let app = app().await;
    open_group(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/active/groups",
        Some(STAFF),
        Some(json!({ "template_group_id": 6, "room_id": ROOM })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("room already hosts an active session"));
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let app = app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/active/visits",
        Some(STAFF),
        Some(json!({ "student_id": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn check_in_twice_is_bad_request_and_current_follows_checkout() {
    let app = app().await;
    let group_id = open_group(&app).await;

    let (status, _) = send(&app, "GET", &format!("/active/visits/student/{STUDENT}/current"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let check_in = json!({ "student_id": STUDENT, "active_group_id": group_id });
    let (status, body) = send(&app, "POST", "/active/visits", Some(STAFF), Some(check_in.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["checked_in_by"], json!(STAFF));
    assert_eq!(body["data"]["student_name"], json!("Mia Keller"));
    let visit_id = body["data"]["id"].as_i64().expect("visit id");

    let (status, body) = send(&app, "POST", "/active/visits", Some(STAFF), Some(check_in)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("student already has an active visit"));

    let (status, body) = send(&app, "GET", &format!("/active/visits/student/{STUDENT}/current"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], json!(visit_id));

    let (status, _) = send(&app, "POST", &format!("/active/visits/{visit_id}/end"), Some(STAFF), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &format!("/active/visits/student/{STUDENT}/current"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn claim_requires_staff_and_succeeds_once() {
    let app = app().await;
    let group_id = open_group(&app).await;
    let claim = format!("/active/groups/{group_id}/claim");

    let (status, _) = send(&app, "POST", &claim, None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "POST", &claim, Some(999), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "POST", &format!("{claim}?role=lead"), Some(STAFF), None).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["role"], json!("lead"));
    assert_eq!(body["data"]["staff_name"], json!("Anna Schmidt"));

    let (status, _) = send(&app, "POST", &claim, Some(OTHER_STAFF), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/active/unclaimed", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn group_visits_are_visible_to_supervisors_only() {
    let app = app().await;
    let group_id = open_group(&app).await;
    let visits = format!("/active/groups/{group_id}/visits");
    send(
        &app,
        "POST",
        "/active/visits",
        Some(STAFF),
        Some(json!({ "student_id": STUDENT, "active_group_id": group_id })),
    )
    .await;

    let (status, _) = send(&app, "GET", &visits, Some(STAFF), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    send(&app, "POST", &format!("/active/groups/{group_id}/claim"), Some(STAFF), None).await;

    let (status, body) = send(&app, "GET", &visits, Some(STAFF), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"][0]["school_class"], json!("3b"));

    let (status, _) = send(&app, "GET", &visits, Some(OTHER_STAFF), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "GET", "/active/groups/999/visits", Some(STAFF), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scheduled_checkout_flow_over_http() {
    let app = app().await;
    let group_id = open_group(&app).await;
    send(
        &app,
        "POST",
        "/active/visits",
        Some(STAFF),
        Some(json!({ "student_id": STUDENT, "active_group_id": group_id })),
    )
    .await;

    let schedule = json!({
        "student_id": STUDENT,
        "scheduled_for": "2020-01-01T00:00:00Z",
        "reason": "picked up"
    });
    let (status, _) = send(&app, "POST", "/checkouts", None, Some(schedule.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "POST", "/checkouts", Some(STAFF), Some(schedule)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], json!("pending"));
    assert_eq!(body["data"]["scheduled_by"], json!(STAFF));
    let checkout_id = body["data"]["id"].as_i64().expect("checkout id");

    let (status, body) = send(&app, "POST", "/checkouts/process-due", Some(STAFF), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["executed"], json!(1));

    let (status, body) = send(&app, "GET", &format!("/checkouts/{checkout_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("executed"));

    let (status, _) = send(&app, "POST", &format!("/checkouts/{checkout_id}/cancel"), Some(STAFF), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", &format!("/active/visits/student/{STUDENT}/current"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analytics_counts_endpoint() {
    let app = app().await;
    open_group(&app).await;

    let (status, body) = send(&app, "GET", "/active/analytics/counts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["active_groups"], json!(1));
    assert_eq!(body["data"]["unclaimed_groups"], json!(1));

    let (status, body) = send(&app, "GET", "/active/analytics/dashboard", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["active_groups"], json!(1));
    assert_eq!(body["data"]["rooms"][0]["room_name"], json!("Werkraum"));
}
