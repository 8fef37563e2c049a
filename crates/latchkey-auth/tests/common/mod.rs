//! Shared fixtures for the auth integration tests: an in-memory store,
//! recording test doubles and a fully wired set of services.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use latchkey_auth::password::{StoredCredentialVerifier, hash_password};
use latchkey_auth::{
    AuthConfig, ChallengeService, LoginService, OtpDispatcher, RegisterCommand, SecureRandom,
    SessionRotationService, TokenSigner,
};
use latchkey_core::error::{LatchkeyError, LatchkeyResult};
use latchkey_core::models::refresh_token::{Device, RefreshToken};
use latchkey_core::models::user::{CreateUser, User, UserRole, UserStatus};
use latchkey_core::ports::{CredentialVerifier, Notifier};
use latchkey_core::repository::{ChallengeCache, RefreshTokenRepository, UserRepository};
use latchkey_db::repository::{
    SurrealChallengeCache, SurrealRefreshTokenRepository, SurrealUserRepository,
};
use secrecy::SecretString;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

pub type Users = SurrealUserRepository<Db>;
pub type Cache = SurrealChallengeCache<Db>;
pub type Tokens = SurrealRefreshTokenRepository<Db>;

pub const PASSWORD: &str = "Passw0rd";

pub async fn memory_db() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    latchkey_db::run_migrations(&db).await.unwrap();
    db
}

pub fn test_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: STANDARD.encode([42u8; 32]),
        ..Default::default()
    }
}

pub fn secret(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

pub fn register_command(email: &str) -> RegisterCommand {
    RegisterCommand {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: email.into(),
        password: secret(PASSWORD),
        phone_number: None,
        date_of_birth: "2000-01-01".into(),
        address: None,
        city: None,
        postal_code: None,
    }
}

/// Insert an account directly, bypassing registration.
pub async fn insert_user<U: UserRepository>(users: &U, email: &str, status: UserStatus) -> User {
    users
        .create(CreateUser {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: email.into(),
            password_hash: hash_password(PASSWORD, None).unwrap(),
            phone_number: None,
            date_of_birth: NaiveDate::from_ymd_opt(1990, 12, 9).unwrap(),
            address: None,
            city: None,
            postal_code: None,
            role: UserRole::User,
            status,
        })
        .await
        .unwrap()
}

pub fn is_six_digits(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Notifier that records every delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn send_otp(&self, email: &str, code: &str) -> LatchkeyResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), code.to_string()));
        Ok(())
    }
}

/// Counts calls before delegating to the real verifier.
pub struct SpyVerifier {
    pub calls: AtomicUsize,
    inner: StoredCredentialVerifier<Users>,
}

impl SpyVerifier {
    pub fn new(users: Arc<Users>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            inner: StoredCredentialVerifier::new(users, None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialVerifier for SpyVerifier {
    async fn authenticate(&self, email: &str, password: &SecretString) -> LatchkeyResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.authenticate(email, password).await
    }
}

/// User store whose `create` always fails.
pub struct FailingCreate<U>(pub U);

impl<U: UserRepository> UserRepository for FailingCreate<U> {
    async fn create(&self, _input: CreateUser) -> LatchkeyResult<User> {
        Err(LatchkeyError::Database("disk full".into()))
    }

    async fn save(&self, user: &User) -> LatchkeyResult<User> {
        self.0.save(user).await
    }

    async fn find_by_id(&self, id: Uuid) -> LatchkeyResult<Option<User>> {
        self.0.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> LatchkeyResult<Option<User>> {
        self.0.find_by_email(email).await
    }

    async fn exists_by_email(&self, email: &str) -> LatchkeyResult<bool> {
        self.0.exists_by_email(email).await
    }
}

/// Challenge cache whose `put` always fails.
pub struct FailingPut<C>(pub C);

impl<C: ChallengeCache> ChallengeCache for FailingPut<C> {
    async fn put(&self, _email: &str, _code: &str, _ttl: Duration) -> LatchkeyResult<()> {
        Err(LatchkeyError::Database("cache unavailable".into()))
    }

    async fn get(&self, email: &str) -> LatchkeyResult<Option<String>> {
        self.0.get(email).await
    }

    async fn delete(&self, email: &str) -> LatchkeyResult<()> {
        self.0.delete(email).await
    }

    async fn exists(&self, email: &str) -> LatchkeyResult<bool> {
        self.0.exists(email).await
    }
}

/// Challenge cache whose `delete` always fails.
pub struct FailingDelete<C>(pub C);

impl<C: ChallengeCache> ChallengeCache for FailingDelete<C> {
    async fn put(&self, email: &str, code: &str, ttl: Duration) -> LatchkeyResult<()> {
        self.0.put(email, code, ttl).await
    }

    async fn get(&self, email: &str) -> LatchkeyResult<Option<String>> {
        self.0.get(email).await
    }

    async fn delete(&self, _email: &str) -> LatchkeyResult<()> {
        Err(LatchkeyError::Database("cache unavailable".into()))
    }

    async fn exists(&self, email: &str) -> LatchkeyResult<bool> {
        self.0.exists(email).await
    }
}

/// Token store whose `rotate` always fails.
pub struct FailingRotate<R>(pub R);

impl<R: RefreshTokenRepository> RefreshTokenRepository for FailingRotate<R> {
    async fn save(&self, token: &RefreshToken) -> LatchkeyResult<RefreshToken> {
        self.0.save(token).await
    }

    async fn rotate(
        &self,
        _previous: &RefreshToken,
        _successor: &RefreshToken,
    ) -> LatchkeyResult<RefreshToken> {
        Err(LatchkeyError::Database("write conflict".into()))
    }

    async fn find_by_token(&self, token: &str) -> LatchkeyResult<Option<RefreshToken>> {
        self.0.find_by_token(token).await
    }

    async fn find_active_by_user_and_device(
        &self,
        user_id: Uuid,
        device: &Device,
    ) -> LatchkeyResult<Option<RefreshToken>> {
        self.0.find_active_by_user_and_device(user_id, device).await
    }
}

// ---------------------------------------------------------------------------
// Wired services
// ---------------------------------------------------------------------------

pub struct Harness {
    pub db: Surreal<Db>,
    pub users: Arc<Users>,
    pub cache: Arc<Cache>,
    pub tokens: Arc<Tokens>,
    pub dispatcher: Arc<OtpDispatcher<RecordingNotifier>>,
    pub challenges: Arc<ChallengeService<Users, Cache, RecordingNotifier>>,
    pub signer: Arc<TokenSigner>,
    pub sessions: SessionRotationService<Users, Tokens>,
    pub verifier: Arc<SpyVerifier>,
    pub login: LoginService<Users, Cache, SpyVerifier, RecordingNotifier>,
}

impl Harness {
    pub async fn new() -> Self {
        let db = memory_db().await;
        let config = test_config();
        let random = Arc::new(SecureRandom::seeded(7));

        let users = Arc::new(SurrealUserRepository::new(db.clone()));
        let cache = Arc::new(SurrealChallengeCache::new(db.clone()));
        let tokens = Arc::new(SurrealRefreshTokenRepository::new(db.clone()));
        let dispatcher = Arc::new(OtpDispatcher::new(RecordingNotifier::default()));
        let signer = Arc::new(TokenSigner::new(&config).unwrap());

        let challenges = Arc::new(ChallengeService::new(
            Arc::clone(&users),
            Arc::clone(&cache),
            Arc::clone(&dispatcher),
            Arc::clone(&random),
            Duration::from_secs(config.otp_ttl_secs),
        ));
        let sessions = SessionRotationService::new(
            Arc::clone(&users),
            Arc::clone(&tokens),
            Arc::clone(&signer),
            random,
            config.refresh_token_lifetime_days,
        );
        let verifier = Arc::new(SpyVerifier::new(Arc::clone(&users)));
        let login = LoginService::new(
            Arc::clone(&users),
            Arc::clone(&verifier),
            Arc::clone(&challenges),
            Arc::clone(&signer),
        );

        Self {
            db,
            users,
            cache,
            tokens,
            dispatcher,
            challenges,
            signer,
            sessions,
            verifier,
            login,
        }
    }

    /// Deliveries that reached the notifier, after waiting for any in
    /// flight.
    pub async fn delivered(&self) -> Vec<(String, String)> {
        self.dispatcher.drain().await;
        self.dispatcher.notifier().sent()
    }
}
