use std::sync::Arc;

use facility_presence::models::directory::{Room, Staff, Student};
use facility_presence::persistence::db;
use facility_presence::persistence::directory_repo::DirectoryRepo;

async fn repo() -> DirectoryRepo {
    let db = db::connect_memory().await.expect("db connect");
    DirectoryRepo::new(Arc::new(db))
}

#[tokio::test]
async fn upsert_inserts_then_replaces() {
    let repo = repo().await;
    let mut student = Student {
        id: 42,
        first_name: "Mia".into(),
        last_name: "Keller".into(),
        school_class: Some("3b".into()),
    };
    repo.upsert_student(&student).await.expect("insert");
    student.school_class = Some("4b".into());
    repo.upsert_student(&student).await.expect("replace");

    let stored = repo.get_student(42).await.expect("get").expect("exists");
    assert_eq!(stored, student);
}

#[tokio::test]
async fn unknown_ids_are_none() {
    let repo = repo().await;
    assert!(repo.get_student(1).await.expect("student").is_none());
    assert!(repo.get_staff(1).await.expect("staff").is_none());
    assert!(repo.get_room(1).await.expect("room").is_none());
}

#[tokio::test]
async fn staff_and_room_round_trip() {
    let repo = repo().await;
    let staff = Staff {
        id: 7,
        first_name: "Anna".into(),
        last_name: "Schmidt".into(),
    };
    repo.upsert_staff(&staff).await.expect("staff");
    repo.upsert_room(&Room { id: 3, name: "Aula".into() }).await.expect("room");

    assert_eq!(repo.get_staff(7).await.expect("get"), Some(staff));
    assert_eq!(repo.get_room(3).await.expect("get").map(|r| r.name).as_deref(), Some("Aula"));
}
