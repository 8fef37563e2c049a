//! SurrealDB implementation of [`UserRepository`].

use chrono::{DateTime, NaiveDate, Utc};
use latchkey_core::error::LatchkeyResult;
use latchkey_core::models::user::{CreateUser, User, UserRole, UserStatus};
use latchkey_core::repository::UserRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct UserRow {
    first_name: String,
    last_name: String,
    email: String,
    password_hash: String,
    phone_number: Option<String>,
    date_of_birth: String,
    address: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    role: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    first_name: String,
    last_name: String,
    email: String,
    password_hash: String,
    phone_number: Option<String>,
    date_of_birth: String,
    address: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    role: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_role(s: &str) -> Result<UserRole, DbError> {
    UserRole::parse(s).ok_or_else(|| DbError::decode("user", format!("unknown role: {s}")))
}

fn parse_status(s: &str) -> Result<UserStatus, DbError> {
    UserStatus::parse(s).ok_or_else(|| DbError::decode("user", format!("unknown status: {s}")))
}

fn parse_date(s: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| DbError::decode("user", format!("invalid date of birth {s}: {e}")))
}

impl UserRow {
    fn into_user(self, id: Uuid) -> Result<User, DbError> {
        Ok(User {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_hash: self.password_hash,
            phone_number: self.phone_number,
            date_of_birth: parse_date(&self.date_of_birth)?,
            address: self.address,
            city: self.city,
            postal_code: self.postal_code,
            role: parse_role(&self.role)?,
            status: parse_status(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::decode("user", format!("invalid UUID: {e}")))?;
        UserRow {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_hash: self.password_hash,
            phone_number: self.phone_number,
            date_of_birth: self.date_of_birth,
            address: self.address,
            city: self.city,
            postal_code: self.postal_code,
            role: self.role,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_user(id)
    }
}

/// SurrealDB implementation of the User repository.
///
/// Emails are stored exactly as given; callers normalize them first.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> LatchkeyResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let email = input.email.clone();

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 first_name = $first_name, last_name = $last_name, \
                 email = $email, password_hash = $password_hash, \
                 phone_number = $phone_number, \
                 date_of_birth = $date_of_birth, \
                 address = $address, city = $city, \
                 postal_code = $postal_code, \
                 role = $role, status = $status",
            )
            .bind(("id", id_str.clone()))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .bind(("email", input.email))
            .bind(("password_hash", input.password_hash))
            .bind(("phone_number", input.phone_number))
            .bind((
                "date_of_birth",
                input.date_of_birth.format(DATE_FORMAT).to_string(),
            ))
            .bind(("address", input.address))
            .bind(("city", input.city))
            .bind(("postal_code", input.postal_code))
            .bind(("role", input.role.as_str().to_string()))
            .bind(("status", input.status.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::write(e, "user", &email))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn save(&self, user: &User) -> LatchkeyResult<User> {
        let id_str = user.id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('user', $id) SET \
                 first_name = $first_name, last_name = $last_name, \
                 email = $email, password_hash = $password_hash, \
                 phone_number = $phone_number, \
                 date_of_birth = $date_of_birth, \
                 address = $address, city = $city, \
                 postal_code = $postal_code, \
                 role = $role, status = $status, \
                 updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("first_name", user.first_name.clone()))
            .bind(("last_name", user.last_name.clone()))
            .bind(("email", user.email.clone()))
            .bind(("password_hash", user.password_hash.clone()))
            .bind(("phone_number", user.phone_number.clone()))
            .bind((
                "date_of_birth",
                user.date_of_birth.format(DATE_FORMAT).to_string(),
            ))
            .bind(("address", user.address.clone()))
            .bind(("city", user.city.clone()))
            .bind(("postal_code", user.postal_code.clone()))
            .bind(("role", user.role.as_str().to_string()))
            .bind(("status", user.status.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::write(e, "user", &user.email))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(user.id)?)
    }

    async fn find_by_id(&self, id: Uuid) -> LatchkeyResult<Option<User>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('user', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_user(id)?)),
            None => Ok(None),
        }
    }

    async fn find_by_email(&self, email: &str) -> LatchkeyResult<Option<User>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM user WHERE email = $email")
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_user()?)),
            None => Ok(None),
        }
    }

    async fn exists_by_email(&self, email: &str) -> LatchkeyResult<bool> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM user WHERE email = $email GROUP ALL")
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }
}
