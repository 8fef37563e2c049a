//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    let version = latchkey_db::run_migrations(&db).await.unwrap();
    assert_eq!(version, 1);

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    assert!(info_str.contains("user"), "missing user table");
    assert!(info_str.contains("refresh_token"), "missing refresh_token table");
    assert!(info_str.contains("otp_challenge"), "missing otp_challenge table");
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    assert_eq!(latchkey_db::run_migrations(&db).await.unwrap(), 1);
    assert_eq!(latchkey_db::run_migrations(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn status_assert_rejects_unknown_values() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    latchkey_db::run_migrations(&db).await.unwrap();

    let result = db
        .query(
            "CREATE user SET first_name = 'A', last_name = 'B', \
             email = 'a@b.com', password_hash = 'x', \
             date_of_birth = '2000-01-01', role = 'USER', \
             status = 'LOCKED'",
        )
        .await
        .unwrap()
        .check();
    assert!(result.is_err());
}
