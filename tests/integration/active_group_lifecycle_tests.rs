//! Room session lifecycle: occupancy, ending, deletion.

use facility_presence::models::active_group::{ActiveGroupFilter, ActiveGroupPatch, NewActiveGroup};
use facility_presence::models::supervisor::NewGroupSupervisor;
use facility_presence::ErrorKind;

use super::test_helpers::{at, check_in_request, engine, open_group, t0, OTHER_ROOM, ROOM, STAFF, STUDENT};

#[tokio::test]
async fn second_open_session_in_same_room_is_a_room_conflict() {
    let (_db, engine) = engine().await;
    open_group(&engine, ROOM).await;

    let err = engine
        .groups
        .create(
            NewActiveGroup {
                template_group_id: 200,
                room_id: ROOM,
                start_time: at(5),
                end_time: None,
            },
            at(5),
        )
        .await
        .expect_err("room is occupied");
    assert!(err.is(ErrorKind::RoomConflict));
}

#[tokio::test]
async fn room_is_free_again_after_the_session_ends() {
    let (_db, engine) = engine().await;
    let first = open_group(&engine, ROOM).await;
    engine.groups.end(first.id, at(30)).await.expect("end");

    let second = engine
        .groups
        .create(
            NewActiveGroup {
                template_group_id: 200,
                room_id: ROOM,
                start_time: at(31),
                end_time: None,
            },
            at(31),
        )
        .await
        .expect("room free after end");
    assert_eq!(second.room_id, ROOM);
}

#[tokio::test]
async fn end_before_start_is_rejected() {
    let (_db, engine) = engine().await;
    let err = engine
        .groups
        .create(
            NewActiveGroup {
                template_group_id: 1,
                room_id: ROOM,
                start_time: at(10),
                end_time: Some(at(5)),
            },
            at(10),
        )
        .await
        .expect_err("invalid range");
    assert!(err.is(ErrorKind::InvalidTimeRange));
}

#[tokio::test]
async fn ending_twice_preserves_first_end_time() {
    let (_db, engine) = engine().await;
    let group = open_group(&engine, ROOM).await;

    let ended = engine.groups.end(group.id, at(60)).await.expect("first end");
    assert_eq!(ended.end_time, Some(at(60)));

    let err = engine.groups.end(group.id, at(90)).await.expect_err("second end");
    assert!(err.is(ErrorKind::ActiveGroupAlreadyEnded));

    let stored = engine.groups.get(group.id).await.expect("get");
    assert_eq!(stored.end_time, Some(at(60)));
}

#[tokio::test]
async fn ending_does_not_close_open_visits() {
    let (_db, engine) = engine().await;
    let group = open_group(&engine, ROOM).await;
    let visit = engine
        .visits
        .check_in(check_in_request(STUDENT, group.id, at(1)), at(1))
        .await
        .expect("check in");

    engine.groups.end(group.id, at(60)).await.expect("end");

    let still_open = engine.visits.get(visit.id).await.expect("get visit");
    assert!(still_open.is_active());
}

#[tokio::test]
async fn delete_is_blocked_by_open_visit_but_not_by_supervisor() {
    let (_db, engine) = engine().await;
    let group = open_group(&engine, ROOM).await;
    engine
        .supervision
        .assign(
            &NewGroupSupervisor {
                staff_id: STAFF,
                active_group_id: group.id,
                role: "supervisor".into(),
                start_date: t0(),
                end_date: None,
            },
            t0(),
        )
        .await
        .expect("assign");
    let visit = engine
        .visits
        .check_in(check_in_request(STUDENT, group.id, at(1)), at(1))
        .await
        .expect("check in");

    let err = engine.groups.delete(group.id).await.expect_err("open visit blocks");
    assert!(err.is(ErrorKind::CannotDeleteActiveGroup));

    engine.visits.end(visit.id, at(20)).await.expect("check out");
    engine.groups.delete(group.id).await.expect("delete");

    let err = engine.groups.get(group.id).await.expect_err("gone");
    assert!(err.is(ErrorKind::ActiveGroupNotFound));
    assert!(engine.supervision.list(Some(group.id)).await.expect("list").is_empty());
}

#[tokio::test]
async fn moving_into_an_occupied_room_conflicts() {
    let (_db, engine) = engine().await;
    open_group(&engine, ROOM).await;
    let other = open_group(&engine, OTHER_ROOM).await;

    let err = engine
        .groups
        .update(
            other.id,
            ActiveGroupPatch {
                room_id: Some(ROOM),
                end_time: None,
            },
            at(5),
        )
        .await
        .expect_err("occupied");
    assert!(err.is(ErrorKind::RoomConflict));

    let moved = engine
        .groups
        .update(
            other.id,
            ActiveGroupPatch {
                room_id: Some(9),
                end_time: Some(at(120)),
            },
            at(5),
        )
        .await
        .expect("move to free room");
    assert_eq!(moved.room_id, 9);
    assert_eq!(moved.end_time, Some(at(120)));
}

#[tokio::test]
async fn list_filters_by_active_state_and_room() {
    let (_db, engine) = engine().await;
    let running = open_group(&engine, ROOM).await;
    let finished = open_group(&engine, OTHER_ROOM).await;
    engine.groups.end(finished.id, at(10)).await.expect("end");

    let active = engine
        .groups
        .list(
            ActiveGroupFilter {
                active: Some(true),
                room_id: None,
            },
            at(20),
        )
        .await
        .expect("list active");
    assert_eq!(active.iter().map(|g| g.id).collect::<Vec<_>>(), vec![running.id]);

    let closed = engine
        .groups
        .list(
            ActiveGroupFilter {
                active: Some(false),
                room_id: Some(OTHER_ROOM),
            },
            at(20),
        )
        .await
        .expect("list closed");
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].id, finished.id);
}

#[tokio::test]
async fn unclaimed_lists_only_running_unsupervised_sessions() {
    let (_db, engine) = engine().await;
    let claimed = open_group(&engine, ROOM).await;
    let free = open_group(&engine, OTHER_ROOM).await;
    engine
        .supervision
        .claim(claimed.id, STAFF, None, at(1))
        .await
        .expect("claim");

    let unclaimed = engine.groups.list_unclaimed(at(2)).await.expect("unclaimed");
    assert_eq!(unclaimed.iter().map(|g| g.id).collect::<Vec<_>>(), vec![free.id]);

    let with_supervisors = engine.groups.get_with_supervisors(claimed.id).await.expect("with supervisors");
    assert_eq!(with_supervisors.supervisors.len(), 1);
    assert_eq!(with_supervisors.supervisors[0].staff_id, STAFF);
}

#[tokio::test]
async fn get_with_visits_returns_all_visits_of_the_session() {
    let (_db, engine) = engine().await;
    let group = open_group(&engine, ROOM).await;
    let visit = engine
        .visits
        .check_in(check_in_request(STUDENT, group.id, at(1)), at(1))
        .await
        .expect("check in");
    engine.visits.end(visit.id, at(2)).await.expect("out");
    engine
        .visits
        .check_in(check_in_request(STUDENT, group.id, at(3)), at(3))
        .await
        .expect("check in again");

    let loaded = engine.groups.get_with_visits(group.id).await.expect("with visits");
    assert_eq!(loaded.group.id, group.id);
    assert_eq!(loaded.visits.len(), 2);
}

#[tokio::test]
async fn ended_session_cannot_be_reopened_by_update() {
    let (_db, engine) = engine().await;
    let first = open_group(&engine, ROOM).await;
    engine.groups.end(first.id, at(10)).await.expect("end");
    let second = engine
        .groups
        .create(
            NewActiveGroup {
                template_group_id: 200,
                room_id: ROOM,
                start_time: at(20),
                end_time: None,
            },
            at(20),
        )
        .await
        .expect("room is free again");

    let err = engine
        .groups
        .update(
            first.id,
            ActiveGroupPatch {
                room_id: None,
                end_time: Some(at(600)),
            },
            at(30),
        )
        .await
        .expect_err("ended session");
    assert!(err.is(ErrorKind::ActiveGroupAlreadyEnded));
    assert_eq!(engine.groups.get(first.id).await.expect("get").end_time, Some(at(10)));

    let running = engine
        .groups
        .list(
            ActiveGroupFilter {
                active: Some(true),
                room_id: Some(ROOM),
            },
            at(30),
        )
        .await
        .expect("list");
    assert_eq!(running.iter().map(|g| g.id).collect::<Vec<_>>(), vec![second.id]);
}

#[tokio::test]
async fn extending_a_session_over_the_next_booking_conflicts() {
    let (_db, engine) = engine().await;
    let morning = engine
        .groups
        .create(
            NewActiveGroup {
                template_group_id: 200,
                room_id: ROOM,
                start_time: t0(),
                end_time: Some(at(60)),
            },
            t0(),
        )
        .await
        .expect("morning");
    engine
        .groups
        .create(
            NewActiveGroup {
                template_group_id: 201,
                room_id: ROOM,
                start_time: at(60),
                end_time: None,
            },
            t0(),
        )
        .await
        .expect("afternoon");

    let err = engine
        .groups
        .update(
            morning.id,
            ActiveGroupPatch {
                room_id: None,
                end_time: Some(at(90)),
            },
            at(5),
        )
        .await
        .expect_err("overlaps afternoon");
    assert!(err.is(ErrorKind::RoomConflict));
    assert_eq!(engine.groups.get(morning.id).await.expect("get").end_time, Some(at(60)));
}
