//! Integration tests for the User repository using in-memory SurrealDB.

use chrono::NaiveDate;
use latchkey_core::error::LatchkeyError;
use latchkey_core::models::user::{CreateUser, UserRole, UserStatus};
use latchkey_core::repository::UserRepository;
use latchkey_db::repository::SurrealUserRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> SurrealUserRepository<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    latchkey_db::run_migrations(&db).await.unwrap();
    SurrealUserRepository::new(db)
}

fn candidate(email: &str) -> CreateUser {
    CreateUser {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: email.into(),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
        phone_number: Some("514-555-1234".into()),
        date_of_birth: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
        address: None,
        city: Some("Montreal".into()),
        postal_code: Some("H2X1A4".into()),
        role: UserRole::User,
        status: UserStatus::Pending,
    }
}

#[tokio::test]
async fn create_and_find_user() {
    let repo = setup().await;

    let user = repo.create(candidate("ada@example.com")).await.unwrap();
    assert!(!user.id.is_nil());
    assert_eq!(user.email, "ada@example.com");
    assert_eq!(user.status, UserStatus::Pending);
    assert_eq!(user.role, UserRole::User);
    assert_eq!(user.date_of_birth, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
    assert_eq!(user.address, None);

    let by_id = repo.find_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(by_id.email, "ada@example.com");
    assert_eq!(by_id.city.as_deref(), Some("Montreal"));

    let by_email = repo.find_by_email("ada@example.com").await.unwrap().unwrap();
    assert_eq!(by_email.id, user.id);
    assert_eq!(by_email.password_hash, user.password_hash);
}

#[tokio::test]
async fn missing_users_are_none() {
    let repo = setup().await;
    assert!(repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    assert!(repo.find_by_email("nobody@example.com").await.unwrap().is_none());
    assert!(!repo.exists_by_email("nobody@example.com").await.unwrap());
}

#[tokio::test]
async fn duplicate_email_is_already_exists() {
    let repo = setup().await;
    repo.create(candidate("dup@example.com")).await.unwrap();
    assert!(repo.exists_by_email("dup@example.com").await.unwrap());

    let err = repo.create(candidate("dup@example.com")).await.unwrap_err();
    match err {
        LatchkeyError::UserAlreadyExists { email } => assert_eq!(email, "dup@example.com"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn save_persists_status_change() {
    let repo = setup().await;
    let mut user = repo.create(candidate("bob@example.com")).await.unwrap();

    user.status = UserStatus::Active;
    user.phone_number = None;
    let saved = repo.save(&user).await.unwrap();
    assert_eq!(saved.status, UserStatus::Active);

    let fetched = repo.find_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, UserStatus::Active);
    assert_eq!(fetched.phone_number, None);
}

#[tokio::test]
async fn save_of_unknown_user_fails() {
    let repo = setup().await;
    let mut user = repo.create(candidate("carol@example.com")).await.unwrap();
    user.id = Uuid::new_v4();
    user.email = "ghost@example.com".into();

    let err = repo.save(&user).await.unwrap_err();
    assert_eq!(err.code(), "DATABASE_ERROR");
    assert!(repo.find_by_id(user.id).await.unwrap().is_none());
}
