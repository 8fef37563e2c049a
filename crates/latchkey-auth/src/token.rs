//! HS256 access token issuance and verification.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use jsonwebtoken::crypto::rust_crypto;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use latchkey_core::models::user::{User, UserRole};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;

/// Minimum decoded length of the signing secret (256 bits).
const MIN_SECRET_BYTES: usize = 32;

/// JWT claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject: the user id as a decimal 128-bit integer.
    pub sub: String,
    pub email: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub role: UserRole,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

impl AccessTokenClaims {
    /// The user id carried in `sub`.
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        self.sub
            .parse::<u128>()
            .map(Uuid::from_u128)
            .map_err(|_| AuthError::TokenInvalid("subject is not a user id".into()))
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Render a user id the way it appears in the `sub` claim.
pub fn subject_for(user_id: Uuid) -> String {
    user_id.as_u128().to_string()
}

/// Pin the process-wide jsonwebtoken backend to RustCrypto.
///
/// SurrealDB enables jsonwebtoken's `aws_lc_rs` feature in the same build,
/// and with both backends compiled in none is chosen automatically.
/// Later calls are no-ops.
fn install_crypto_provider() {
    let _ = rust_crypto::DEFAULT_PROVIDER.install_default();
}

/// Signs and verifies access tokens with a process-wide HMAC secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime_secs: i64,
}

impl TokenSigner {
    /// Build a signer from [`AuthConfig::jwt_secret`].
    ///
    /// Fails with [`AuthError::Crypto`] when the secret is not valid
    /// base64 or decodes to fewer than 32 bytes.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        install_crypto_provider();

        let secret = STANDARD
            .decode(config.jwt_secret.trim())
            .map_err(|e| AuthError::Crypto(format!("JWT secret is not base64: {e}")))?;
        if secret.len() < MIN_SECRET_BYTES {
            return Err(AuthError::Crypto(format!(
                "JWT secret must be at least {MIN_SECRET_BYTES} bytes, got {}",
                secret.len()
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&secret),
            decoding_key: DecodingKey::from_secret(&secret),
            lifetime_secs: i64::try_from(config.access_token_lifetime_secs).unwrap_or(i64::MAX),
        })
    }

    /// Issue a signed access token for `user`.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = AccessTokenClaims {
            sub: subject_for(user.id),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            iat: now,
            exp: now.saturating_add(self.lifetime_secs),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
    }

    /// Verify signature and expiry (no leeway) and return the claims.
    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp", "iat"]);

        jsonwebtoken::decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use latchkey_core::models::user::UserStatus;

    use super::*;

    fn config_with_secret(secret: &[u8]) -> AuthConfig {
        AuthConfig {
            jwt_secret: STANDARD.encode(secret),
            ..Default::default()
        }
    }

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            phone_number: None,
            date_of_birth: NaiveDate::from_ymd_opt(1990, 12, 10).unwrap(),
            address: None,
            city: None,
            postal_code: None,
            role: UserRole::Admin,
            status: UserStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn jwt_roundtrip() {
        let signer = TokenSigner::new(&config_with_secret(&[7u8; 32])).unwrap();
        let user = test_user();

        let token = signer.issue(&user).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.sub, user.id.as_u128().to_string());
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.first_name, "Ada");
        assert_eq!(claims.role(), UserRole::Admin);
        assert_eq!(claims.exp - claims.iat, 900);
        assert!(claims.expires_at().unwrap() > Utc::now());
    }

    #[test]
    fn signer_pins_a_crypto_provider() {
        let first = TokenSigner::new(&config_with_secret(&[7u8; 32])).unwrap();
        let second = TokenSigner::new(&config_with_secret(&[7u8; 32])).unwrap();

        assert!(rust_crypto::DEFAULT_PROVIDER.install_default().is_err());

        let token = first.issue(&test_user()).unwrap();
        assert!(second.verify(&token).is_ok());
    }

    #[test]
    fn claims_use_camel_case_names() {
        let signer = TokenSigner::new(&config_with_secret(&[7u8; 32])).unwrap();
        let token = signer.issue(&test_user()).unwrap();

        let payload = token.split('.').nth(1).unwrap();
        let json = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .unwrap();
        let json = String::from_utf8(json).unwrap();
        assert!(json.contains("\"firstName\":\"Ada\""));
        assert!(json.contains("\"lastName\":\"Lovelace\""));
        assert!(json.contains("\"role\":\"ADMIN\""));
    }

    #[test]
    fn different_key_is_rejected() {
        let signer = TokenSigner::new(&config_with_secret(&[7u8; 32])).unwrap();
        let other = TokenSigner::new(&config_with_secret(&[8u8; 32])).unwrap();

        let token = signer.issue(&test_user()).unwrap();
        assert!(matches!(
            other.verify(&token),
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[test]
    fn malformed_token_is_rejected() {
        let signer = TokenSigner::new(&config_with_secret(&[7u8; 32])).unwrap();
        assert!(matches!(
            signer.verify("not-a-valid-token"),
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = TokenSigner::new(&config_with_secret(&[7u8; 32])).unwrap();
        let now = Utc::now().timestamp();
        let claims = AccessTokenClaims {
            sub: subject_for(Uuid::new_v4()),
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            role: UserRole::User,
            iat: now - 120,
            exp: now - 60,
        };
        let token =
            jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &signer.encoding_key)
                .unwrap();

        assert!(matches!(signer.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn short_or_non_base64_secret_is_rejected() {
        assert!(TokenSigner::new(&config_with_secret(&[1u8; 16])).is_err());

        let config = AuthConfig {
            jwt_secret: "not base64!".into(),
            ..Default::default()
        };
        assert!(TokenSigner::new(&config).is_err());
    }
}
