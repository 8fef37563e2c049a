//! Latchkey Database: SurrealDB connection management, migrations and
//! store implementations for the `latchkey-core` repository traits.

mod connection;
mod error;
mod schema;

pub mod repository;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use repository::{SurrealChallengeCache, SurrealRefreshTokenRepository, SurrealUserRepository};
pub use schema::{run_migrations, schema_v1};
