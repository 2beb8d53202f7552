use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use facility_presence::models::active_group::{ActiveGroupFilter, NewActiveGroup};
use facility_presence::models::supervisor::NewGroupSupervisor;
use facility_presence::models::visit::NewVisit;
use facility_presence::persistence::active_group_repo::ActiveGroupRepo;
use facility_presence::persistence::db::{self, Database};
use facility_presence::persistence::supervisor_repo::SupervisorRepo;
use facility_presence::persistence::visit_repo::VisitRepo;

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn session(room_id: i64, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> NewActiveGroup {
    NewActiveGroup {
        template_group_id: 1,
        room_id,
        start_time: start,
        end_time: end,
    }
}

async fn setup() -> (Arc<Database>, ActiveGroupRepo) {
    let db = Arc::new(db::connect_memory().await.expect("db connect"));
    let repo = ActiveGroupRepo::new(Arc::clone(&db));
    (db, repo)
}

#[tokio::test]
async fn in_memory_connect_creates_all_tables() {
    let pool = db::connect_memory().await.expect("in-memory connect should succeed");

    for table in [
        "student",
        "staff",
        "room",
        "active_group",
        "visit",
        "group_supervisor",
        "combined_group",
        "group_mapping",
        "scheduled_checkout",
    ] {
        let query = format!("SELECT COUNT(*) FROM {table}");
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("table '{table}' should be queryable: {e}"));
        assert_eq!(row.0, 0, "table '{table}' should start empty");
    }
}

#[tokio::test]
async fn room_holds_one_unterminated_session() {
    let (_db, repo) = setup().await;

    let first = repo
        .create_if_room_free(&session(1, at(0), None), at(0))
        .await
        .expect("insert");
    assert!(first.is_some());

    let second = repo
        .create_if_room_free(&session(1, at(5), None), at(5))
        .await
        .expect("query");
    assert!(second.is_none());

    let other_room = repo
        .create_if_room_free(&session(2, at(5), None), at(5))
        .await
        .expect("insert");
    assert!(other_room.is_some());
}

#[tokio::test]
async fn backdated_session_before_running_one_is_allowed() {
    let (_db, repo) = setup().await;
    repo.create_if_room_free(&session(1, at(0), None), at(0))
        .await
        .expect("insert")
        .expect("room free");

    let backdated = repo
        .create_if_room_free(&session(1, at(-120), Some(at(-60))), at(10))
        .await
        .expect("insert");
    assert!(backdated.is_some());
}

#[tokio::test]
async fn terminated_sessions_do_not_block_the_room() {
    let (_db, repo) = setup().await;
    let first = repo
        .create_if_room_free(&session(1, at(0), None), at(0))
        .await
        .expect("insert")
        .expect("room free");
    assert!(repo.end_if_open(first.id, at(10)).await.expect("end"));

    let next = repo
        .create_if_room_free(&session(1, at(0), None), at(20))
        .await
        .expect("insert");
    assert!(next.is_some());
}

#[tokio::test]
async fn end_if_open_keeps_first_end_time() {
    let (_db, repo) = setup().await;
    let group = repo
        .create_if_room_free(&session(1, at(0), None), at(0))
        .await
        .expect("insert")
        .expect("room free");

    assert!(repo.end_if_open(group.id, at(10)).await.expect("end"));
    assert!(!repo.end_if_open(group.id, at(20)).await.expect("second end"));

    let stored = repo.get_by_id(group.id).await.expect("get").expect("exists");
    assert_eq!(stored.end_time, Some(at(10)));
    assert_eq!(repo.count_active(at(11)).await.expect("count"), 0);
}

#[tokio::test]
async fn delete_blocked_by_open_visit_only() {
    let (db, repo) = setup().await;
    let visits = VisitRepo::new(Arc::clone(&db));
    let supervisors = SupervisorRepo::new(db);
    let group = repo
        .create_if_room_free(&session(1, at(0), None), at(0))
        .await
        .expect("insert")
        .expect("room free");

    supervisors
        .create_if_not_supervising(
            &NewGroupSupervisor {
                staff_id: 7,
                active_group_id: group.id,
                role: "supervisor".into(),
                start_date: at(0),
                end_date: None,
            },
            at(1),
        )
        .await
        .expect("assign")
        .expect("assigned");
    let visit = visits
        .create_if_student_free(
            &NewVisit {
                student_id: 42,
                active_group_id: group.id,
                entry_time: at(1),
                checked_in_by: None,
            },
            at(1),
        )
        .await
        .expect("insert")
        .expect("checked in");

    assert!(!repo.delete_if_no_open_visits(group.id).await.expect("delete"));
    assert!(repo.get_by_id(group.id).await.expect("get").is_some());

    visits.end_if_open(visit.id, at(5)).await.expect("close");
    assert!(repo.delete_if_no_open_visits(group.id).await.expect("delete"));
    assert!(visits.get_by_id(visit.id).await.expect("get").is_none());
    assert!(supervisors.list(Some(group.id), None).await.expect("list").is_empty());
}

#[tokio::test]
async fn list_filters_by_room_and_state() {
    let (_db, repo) = setup().await;
    let ended = repo
        .create_if_room_free(&session(1, at(0), None), at(0))
        .await
        .expect("insert")
        .expect("free");
    repo.end_if_open(ended.id, at(5)).await.expect("end");
    repo.create_if_room_free(&session(1, at(6), None), at(6))
        .await
        .expect("insert")
        .expect("free");
    repo.create_if_room_free(&session(2, at(6), None), at(6))
        .await
        .expect("insert")
        .expect("free");

    let running = repo
        .list(
            ActiveGroupFilter {
                active: Some(true),
                room_id: None,
            },
            at(10),
        )
        .await
        .expect("list");
    assert_eq!(running.len(), 2);

    let room_one = repo
        .list(
            ActiveGroupFilter {
                active: None,
                room_id: Some(1),
            },
            at(10),
        )
        .await
        .expect("list");
    assert_eq!(room_one.len(), 2);

    let finished = repo
        .list(
            ActiveGroupFilter {
                active: Some(false),
                room_id: None,
            },
            at(10),
        )
        .await
        .expect("list");
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].id, ended.id);
}

#[tokio::test]
async fn moving_into_occupied_room_is_refused() {
    let (_db, repo) = setup().await;
    repo.create_if_room_free(&session(1, at(0), None), at(0))
        .await
        .expect("insert")
        .expect("free");
    let mover = repo
        .create_if_room_free(&session(2, at(0), None), at(0))
        .await
        .expect("insert")
        .expect("free");

    assert!(!repo.update_if_room_free(mover.id, 1, None, at(1)).await.expect("update"));
    assert!(repo.update_if_room_free(mover.id, 3, None, at(1)).await.expect("update"));
    let stored = repo.get_by_id(mover.id).await.expect("get").expect("exists");
    assert_eq!(stored.room_id, 3);
}

#[tokio::test]
async fn end_time_of_ended_group_is_not_rewritten() {
    let (_db, repo) = setup().await;
    let first = repo
        .create_if_room_free(&session(1, at(0), None), at(0))
        .await
        .expect("insert")
        .expect("free");
    assert!(repo.end_if_open(first.id, at(10)).await.expect("end"));
    repo.create_if_room_free(&session(1, at(20), None), at(20))
        .await
        .expect("insert")
        .expect("free after end");

    assert!(!repo.update_if_room_free(first.id, 1, Some(at(600)), at(30)).await.expect("update"));
    let stored = repo.get_by_id(first.id).await.expect("get").expect("exists");
    assert_eq!(stored.end_time, Some(at(10)));
}

#[tokio::test]
async fn extending_a_running_group_into_a_later_session_is_refused() {
    let (_db, repo) = setup().await;
    let early = repo
        .create_if_room_free(&session(1, at(0), Some(at(60))), at(0))
        .await
        .expect("insert")
        .expect("free");
    repo.create_if_room_free(&session(1, at(60), None), at(0))
        .await
        .expect("insert")
        .expect("adjacent slot is free");

    assert!(!repo.update_if_room_free(early.id, 1, Some(at(90)), at(5)).await.expect("update"));
    assert!(repo.update_if_room_free(early.id, 1, Some(at(30)), at(5)).await.expect("update"));
    let stored = repo.get_by_id(early.id).await.expect("get").expect("exists");
    assert_eq!(stored.end_time, Some(at(30)));
}
