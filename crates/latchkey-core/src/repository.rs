//! Store traits for data access abstraction.
//!
//! All operations are async. Lookups that may legitimately miss return
//! `Option`; the calling service decides which domain error a miss is.

use std::time::Duration;

use uuid::Uuid;

use crate::error::LatchkeyResult;
use crate::models::refresh_token::{Device, RefreshToken};
use crate::models::user::{CreateUser, User};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Insert a new account. A unique-email violation must surface as
    /// [`LatchkeyError::UserAlreadyExists`](crate::error::LatchkeyError::UserAlreadyExists).
    fn create(&self, input: CreateUser) -> impl Future<Output = LatchkeyResult<User>> + Send;
    /// Persist every mutable field of an existing account.
    fn save(&self, user: &User) -> impl Future<Output = LatchkeyResult<User>> + Send;
    fn find_by_id(&self, id: Uuid) -> impl Future<Output = LatchkeyResult<Option<User>>> + Send;
    /// `email` must already be normalized.
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = LatchkeyResult<Option<User>>> + Send;
    fn exists_by_email(&self, email: &str) -> impl Future<Output = LatchkeyResult<bool>> + Send;
}

// ---------------------------------------------------------------------------
// Refresh tokens
// ---------------------------------------------------------------------------

pub trait RefreshTokenRepository: Send + Sync {
    /// Insert or update by id.
    fn save(
        &self,
        token: &RefreshToken,
    ) -> impl Future<Output = LatchkeyResult<RefreshToken>> + Send;
    /// Persist `successor` and the already-revoked `previous` together:
    /// either both writes land or neither does.
    fn rotate(
        &self,
        previous: &RefreshToken,
        successor: &RefreshToken,
    ) -> impl Future<Output = LatchkeyResult<RefreshToken>> + Send;
    fn find_by_token(
        &self,
        token: &str,
    ) -> impl Future<Output = LatchkeyResult<Option<RefreshToken>>> + Send;
    /// The non-revoked token for this user on this device, if any.
    fn find_active_by_user_and_device(
        &self,
        user_id: Uuid,
        device: &Device,
    ) -> impl Future<Output = LatchkeyResult<Option<RefreshToken>>> + Send;
}

// ---------------------------------------------------------------------------
// OTP challenges
// ---------------------------------------------------------------------------

/// Key/value store with per-key TTL holding pending OTP codes, keyed by
/// normalized email. Expired entries must be invisible to `get` and
/// `exists`.
pub trait ChallengeCache: Send + Sync {
    fn put(
        &self,
        email: &str,
        code: &str,
        ttl: Duration,
    ) -> impl Future<Output = LatchkeyResult<()>> + Send;
    fn get(&self, email: &str) -> impl Future<Output = LatchkeyResult<Option<String>>> + Send;
    fn delete(&self, email: &str) -> impl Future<Output = LatchkeyResult<()>> + Send;
    fn exists(&self, email: &str) -> impl Future<Output = LatchkeyResult<bool>> + Send;
}
