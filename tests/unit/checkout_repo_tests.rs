use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use facility_presence::models::active_group::NewActiveGroup;
use facility_presence::models::checkout::{CheckoutStatus, NewScheduledCheckout};
use facility_presence::models::visit::NewVisit;
use facility_presence::persistence::active_group_repo::ActiveGroupRepo;
use facility_presence::persistence::checkout_repo::{CheckoutExecution, CheckoutRepo};
use facility_presence::persistence::db;
use facility_presence::persistence::visit_repo::VisitRepo;

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn checkout(student_id: i64, minutes: i64) -> NewScheduledCheckout {
    NewScheduledCheckout {
        student_id,
        scheduled_by: 7,
        scheduled_for: at(minutes),
        reason: None,
    }
}

struct Fixture {
    checkouts: CheckoutRepo,
    visits: VisitRepo,
    group_id: i64,
}

async fn fixture() -> Fixture {
    let db = Arc::new(db::connect_memory().await.expect("db connect"));
    let groups = ActiveGroupRepo::new(Arc::clone(&db));
    let group_id = groups
        .create_if_room_free(
            &NewActiveGroup {
                template_group_id: 1,
                room_id: 1,
                start_time: at(0),
                end_time: None,
            },
            at(0),
        )
        .await
        .expect("insert")
        .expect("free")
        .id;
    Fixture {
        checkouts: CheckoutRepo::new(Arc::clone(&db)),
        visits: VisitRepo::new(db),
        group_id,
    }
}

async fn check_in(f: &Fixture, student_id: i64, minutes: i64) -> i64 {
    f.visits
        .create_if_student_free(
            &NewVisit {
                student_id,
                active_group_id: f.group_id,
                entry_time: at(minutes),
                checked_in_by: None,
            },
            at(minutes),
        )
        .await
        .expect("insert")
        .expect("free")
        .id
}

#[tokio::test]
async fn due_list_is_pending_and_ordered() {
    let f = fixture().await;
    let late = f.checkouts.create(&checkout(42, 30), at(0)).await.expect("create");
    let early = f.checkouts.create(&checkout(43, 10), at(0)).await.expect("create");
    f.checkouts.create(&checkout(44, 90), at(0)).await.expect("create");

    assert_eq!(early.status, CheckoutStatus::Pending);
    assert_eq!(f.checkouts.count_pending().await.expect("count"), 3);

    let due = f.checkouts.list_due(at(30)).await.expect("due");
    let ids: Vec<i64> = due.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);
}

#[tokio::test]
async fn execute_closes_visit_and_is_not_repeatable() {
    let f = fixture().await;
    let visit_id = check_in(&f, 42, 5).await;
    let record = f.checkouts.create(&checkout(42, 20), at(0)).await.expect("create");

    let first = f.checkouts.execute(&record, at(25), at(25)).await.expect("execute");
    assert_eq!(first, CheckoutExecution::VisitClosed { visit_id });

    let second = f.checkouts.execute(&record, at(26), at(26)).await.expect("execute again");
    assert_eq!(second, CheckoutExecution::AlreadyProcessed);

    let stored = f.checkouts.get_by_id(record.id).await.expect("get").expect("exists");
    assert_eq!(stored.status, CheckoutStatus::Executed);
    assert_eq!(stored.executed_at, Some(at(25)));

    let visit = f.visits.get_by_id(visit_id).await.expect("get").expect("exists");
    assert_eq!(visit.exit_time, Some(at(25)));
}

#[tokio::test]
async fn exit_time_is_clamped_to_entry() {
    let f = fixture().await;
    let visit_id = check_in(&f, 42, 15).await;
    let record = f.checkouts.create(&checkout(42, 10), at(0)).await.expect("create");

    f.checkouts.execute(&record, at(10), at(20)).await.expect("execute");
    let visit = f.visits.get_by_id(visit_id).await.expect("get").expect("exists");
    assert_eq!(visit.exit_time, Some(at(15)));
}

#[tokio::test]
async fn execute_without_open_visit_still_consumes_record() {
    let f = fixture().await;
    let record = f.checkouts.create(&checkout(42, 10), at(0)).await.expect("create");

    let outcome = f.checkouts.execute(&record, at(11), at(11)).await.expect("execute");
    assert_eq!(outcome, CheckoutExecution::NoOpenVisit);
    assert_eq!(f.checkouts.count_pending().await.expect("count"), 0);
    assert!(f.checkouts.list_pending_for_student(42).await.expect("pending").is_empty());
}

#[tokio::test]
async fn cancel_only_from_pending() {
    let f = fixture().await;
    let record = f.checkouts.create(&checkout(42, 10), at(0)).await.expect("create");

    assert!(f.checkouts.cancel_if_pending(record.id, 8, at(5)).await.expect("cancel"));
    assert!(!f.checkouts.cancel_if_pending(record.id, 8, at(6)).await.expect("second cancel"));

    let stored = f.checkouts.get_by_id(record.id).await.expect("get").expect("exists");
    assert_eq!(stored.status, CheckoutStatus::Cancelled);
    assert_eq!(stored.cancelled_by, Some(8));
    assert!(f.checkouts.list_due(at(20)).await.expect("due").is_empty());

    let executed = f.checkouts.execute(&stored, at(20), at(20)).await.expect("execute");
    assert_eq!(executed, CheckoutExecution::AlreadyProcessed);
    assert_eq!(f.checkouts.list_for_student(42).await.expect("history").len(), 1);
}
