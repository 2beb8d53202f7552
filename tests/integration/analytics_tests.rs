//! Counts, dashboard and reports.

use facility_presence::models::checkout::NewScheduledCheckout;
use facility_presence::models::supervisor::NewGroupSupervisor;
use facility_presence::ErrorKind;

use super::test_helpers::{
    at, check_in_request, engine, open_group, t0, OTHER_ROOM, OTHER_STUDENT, ROOM, STAFF, STUDENT,
};

#[tokio::test]
async fn counts_separate_stale_visits_from_active_ones() {
    let (_db, engine) = engine().await;
    let running = open_group(&engine, ROOM).await;
    let ended = open_group(&engine, OTHER_ROOM).await;

    engine
        .visits
        .check_in(check_in_request(STUDENT, running.id, at(1)), at(1))
        .await
        .expect("in");
    engine
        .visits
        .check_in(check_in_request(OTHER_STUDENT, ended.id, at(1)), at(1))
        .await
        .expect("in");
    engine.groups.end(ended.id, at(10)).await.expect("end");

    engine
        .supervision
        .assign(
            &NewGroupSupervisor {
                staff_id: STAFF,
                active_group_id: running.id,
                role: "supervisor".into(),
                start_date: t0(),
                end_date: None,
            },
            at(2),
        )
        .await
        .expect("assign");
    engine.combined.create(t0(), None, &[running.id], at(3)).await.expect("combine");
    engine
        .checkouts
        .schedule(
            &NewScheduledCheckout {
                student_id: STUDENT,
                scheduled_by: STAFF,
                scheduled_for: at(100),
                reason: None,
            },
            at(4),
        )
        .await
        .expect("schedule");

    let counts = engine.analytics.counts(at(20)).await.expect("counts");
    assert_eq!(counts.active_groups, 1);
    assert_eq!(counts.active_visits, 1);
    assert_eq!(counts.stale_visits, 1);
    assert_eq!(counts.active_supervisors, 1);
    assert_eq!(counts.unclaimed_groups, 0);
    assert_eq!(counts.active_combined_groups, 1);
    assert_eq!(counts.pending_checkouts, 1);
}

#[tokio::test]
async fn dashboard_lists_occupancy_of_running_sessions() {
    let (_db, engine) = engine().await;
    let running = open_group(&engine, ROOM).await;
    let empty = open_group(&engine, OTHER_ROOM).await;
    engine
        .visits
        .check_in(check_in_request(STUDENT, running.id, at(1)), at(1))
        .await
        .expect("in");
    engine
        .visits
        .check_in(check_in_request(OTHER_STUDENT, running.id, at(2)), at(2))
        .await
        .expect("in");

    let dashboard = engine.analytics.dashboard(at(5)).await.expect("dashboard");
    assert_eq!(dashboard.counts.active_groups, 2);
    assert_eq!(dashboard.counts.unclaimed_groups, 2);
    assert_eq!(dashboard.rooms.len(), 2);

    let werkraum = &dashboard.rooms[0];
    assert_eq!(werkraum.room_id, ROOM);
    assert_eq!(werkraum.room_name.as_deref(), Some("Werkraum"));
    assert_eq!(werkraum.active_group_id, running.id);
    assert_eq!(werkraum.present_students, 2);

    assert_eq!(dashboard.rooms[1].active_group_id, empty.id);
    assert_eq!(dashboard.rooms[1].present_students, 0);
}

#[tokio::test]
async fn room_utilization_covers_the_window() {
    let (_db, engine) = engine().await;
    let group = open_group(&engine, ROOM).await;
    engine.groups.end(group.id, at(60)).await.expect("end");

    let report = engine
        .analytics
        .room_utilization(ROOM, t0(), at(120), at(200))
        .await
        .expect("utilization");
    assert_eq!(report.sessions, 1);
    assert_eq!(report.occupied_minutes, 60);
    assert!((report.utilization - 0.5).abs() < f64::EPSILON);

    let idle = engine
        .analytics
        .room_utilization(OTHER_ROOM, t0(), at(120), at(200))
        .await
        .expect("idle room");
    assert_eq!(idle.sessions, 0);
    assert!(idle.utilization.abs() < f64::EPSILON);
}

#[tokio::test]
async fn running_session_counts_until_now() {
    let (_db, engine) = engine().await;
    open_group(&engine, ROOM).await;

    let report = engine
        .analytics
        .room_utilization(ROOM, t0(), at(120), at(30))
        .await
        .expect("utilization");
    assert_eq!(report.occupied_minutes, 30);
}

#[tokio::test]
async fn student_attendance_sums_minutes_and_days() {
    let (_db, engine) = engine().await;
    let group = open_group(&engine, ROOM).await;

    let monday = engine
        .visits
        .check_in(check_in_request(STUDENT, group.id, at(0)), at(0))
        .await
        .expect("monday in");
    engine.visits.end(monday.id, at(30)).await.expect("monday out");

    let tuesday = engine
        .visits
        .check_in(check_in_request(STUDENT, group.id, at(1440)), at(1440))
        .await
        .expect("tuesday in");
    engine.visits.end(tuesday.id, at(1500)).await.expect("tuesday out");

    let report = engine
        .analytics
        .student_attendance(STUDENT, t0(), at(3 * 1440), at(4000))
        .await
        .expect("attendance");
    assert_eq!(report.visits, 2);
    assert_eq!(report.total_minutes, 90);
    assert_eq!(report.days_present, 2);

    let nobody = engine
        .analytics
        .student_attendance(OTHER_STUDENT, t0(), at(3 * 1440), at(4000))
        .await
        .expect("no visits");
    assert_eq!(nobody.visits, 0);
    assert_eq!(nobody.days_present, 0);
}

#[tokio::test]
async fn reports_reject_empty_windows() {
    let (_db, engine) = engine().await;

    let err = engine
        .analytics
        .room_utilization(ROOM, at(10), at(10), at(20))
        .await
        .expect_err("empty window");
    assert!(err.is(ErrorKind::InvalidTimeRange));

    let err = engine
        .analytics
        .student_attendance(STUDENT, at(10), at(5), at(20))
        .await
        .expect_err("reversed window");
    assert!(err.is(ErrorKind::InvalidTimeRange));
}
