use axum::http::StatusCode;
use axum::response::IntoResponse;
use facility_presence::errors::ErrorFamily;
use facility_presence::{AppError, ErrorKind};

#[test]
fn active_error_display_names_operation_and_kind() {
    let err = AppError::active("check_in", ErrorKind::StudentAlreadyActive);
    assert_eq!(err.to_string(), "check_in: student already has an active visit");
    assert!(err.is(ErrorKind::StudentAlreadyActive));
    assert!(!err.is(ErrorKind::VisitNotFound));
}

#[test]
fn non_domain_errors_have_no_kind() {
    let err = AppError::Db("disk full".into());
    assert_eq!(err.kind(), None);
    assert_eq!(err.to_string(), "db: disk full");
}

#[test]
fn kinds_map_to_families() {
    assert_eq!(ErrorKind::VisitNotFound.family(), ErrorFamily::NotFound);
    assert_eq!(ErrorKind::ScheduledCheckoutNotFound.family(), ErrorFamily::NotFound);
    assert_eq!(ErrorKind::ActiveGroupAlreadyEnded.family(), ErrorFamily::AlreadyEnded);
    assert_eq!(ErrorKind::SupervisionAlreadyEnded.family(), ErrorFamily::AlreadyEnded);
    assert_eq!(ErrorKind::StudentAlreadyActive.family(), ErrorFamily::StateConflict);
    assert_eq!(ErrorKind::StudentAlreadyInGroup.family(), ErrorFamily::StateConflict);
    assert_eq!(ErrorKind::InvalidTimeRange.family(), ErrorFamily::StateConflict);
    assert_eq!(ErrorKind::CheckoutNotPending.family(), ErrorFamily::StateConflict);
    assert_eq!(ErrorKind::RoomConflict.family(), ErrorFamily::RoomConflict);
}

#[test]
fn messages_have_no_trailing_period() {
    for kind in [
        ErrorKind::ActiveGroupNotFound,
        ErrorKind::CannotDeleteActiveGroup,
        ErrorKind::GroupAlreadyInCombination,
        ErrorKind::RoomConflict,
    ] {
        assert!(!kind.message().ends_with('.'), "{kind:?}");
    }
}

#[test]
fn statuses_follow_families() {
    let status = |kind| AppError::active("op", kind).status();
    assert_eq!(status(ErrorKind::VisitNotFound), StatusCode::NOT_FOUND);
    assert_eq!(status(ErrorKind::VisitAlreadyEnded), StatusCode::BAD_REQUEST);
    assert_eq!(status(ErrorKind::StaffAlreadySupervising), StatusCode::BAD_REQUEST);
    assert_eq!(status(ErrorKind::RoomConflict), StatusCode::CONFLICT);

    assert_eq!(AppError::InvalidData("x".into()).status(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
    assert_eq!(AppError::Io("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn storage_errors_are_opaque_in_responses() {
    let response = AppError::Db("no such table: visit".into()).into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["success"], serde_json::json!(false));
    assert_eq!(body["message"], serde_json::json!("internal server error"));
    assert!(!bytes.windows(5).any(|w| w == b"table"));
}

#[tokio::test]
async fn domain_errors_carry_their_message() {
    let response = AppError::active("create_active_group", ErrorKind::RoomConflict).into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
    assert_eq!(body["message"], serde_json::json!("room already hosts an active session"));
    assert_eq!(body["data"], serde_json::Value::Null);
}
