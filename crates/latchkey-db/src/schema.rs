//! Schema definitions and migration runner for SurrealDB.
//!
//! All tables are SCHEMAFULL. UUIDs and dates of birth are stored as
//! strings; enums as strings with ASSERT constraints.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1: users, refresh tokens, OTP challenges
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD first_name ON TABLE user TYPE string;
DEFINE FIELD last_name ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD phone_number ON TABLE user TYPE option<string>;
DEFINE FIELD date_of_birth ON TABLE user TYPE string;
DEFINE FIELD address ON TABLE user TYPE option<string>;
DEFINE FIELD city ON TABLE user TYPE option<string>;
DEFINE FIELD postal_code ON TABLE user TYPE option<string>;
DEFINE FIELD role ON TABLE user TYPE string \
    ASSERT $value IN ['USER', 'ADMIN'];
DEFINE FIELD status ON TABLE user TYPE string \
    ASSERT $value IN ['PENDING', 'ACTIVE', 'SUSPENDED'];
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;

-- =======================================================================
-- Refresh tokens
-- =======================================================================
DEFINE TABLE refresh_token SCHEMAFULL;
DEFINE FIELD user_id ON TABLE refresh_token TYPE string;
DEFINE FIELD token ON TABLE refresh_token TYPE string;
DEFINE FIELD expiry_date ON TABLE refresh_token TYPE datetime;
DEFINE FIELD revoked ON TABLE refresh_token TYPE bool DEFAULT false;
DEFINE FIELD ip_address ON TABLE refresh_token TYPE option<string>;
DEFINE FIELD user_agent ON TABLE refresh_token TYPE option<string>;
DEFINE FIELD created_at ON TABLE refresh_token TYPE datetime;
DEFINE FIELD replaced_by ON TABLE refresh_token TYPE option<string>;
DEFINE INDEX idx_refresh_token_token ON TABLE refresh_token \
    COLUMNS token UNIQUE;
DEFINE INDEX idx_refresh_token_user_device ON TABLE refresh_token \
    COLUMNS user_id, ip_address, user_agent, revoked;

-- =======================================================================
-- OTP challenges (record id = normalized email)
-- =======================================================================
DEFINE TABLE otp_challenge SCHEMAFULL;
DEFINE FIELD code ON TABLE otp_challenge TYPE string;
DEFINE FIELD expires_at ON TABLE otp_challenge TYPE datetime;
DEFINE INDEX idx_otp_challenge_expires ON TABLE otp_challenge \
    COLUMNS expires_at;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Apply every migration newer than the recorded schema version and
/// return the version the database is at afterwards.
///
/// Safe to call on every start: an up-to-date database is left alone.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let start = current_version(db).await?;
    let mut version = start;
    for migration in MIGRATIONS.iter().filter(|m| m.version > start) {
        apply(db, migration).await?;
        version = migration.version;
    }
    Ok(version)
}

async fn current_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    Ok(records.first().map(|m| m.version).unwrap_or(0))
}

async fn apply<C: Connection>(db: &Surreal<C>, migration: &Migration) -> Result<(), DbError> {
    info!(
        version = migration.version,
        name = migration.name,
        "Applying migration"
    );

    db.query(migration.sql).await?.check().map_err(|e| {
        DbError::Migration(format!(
            "v{} '{}' failed: {e}",
            migration.version, migration.name
        ))
    })?;

    db.query("CREATE _migration SET version = $version, name = $name")
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| {
            DbError::Migration(format!("recording v{} failed: {e}", migration.version))
        })?;

    info!(version = migration.version, "Migration applied");
    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
