//! Authentication configuration.

/// Configuration for the authentication services.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base64-encoded HMAC-SHA256 signing secret. Must decode to at
    /// least 32 bytes.
    pub jwt_secret: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Refresh token lifetime in days (default: 7).
    pub refresh_token_lifetime_days: u32,
    /// How long an issued OTP code stays valid (default: 600 = 10 minutes).
    pub otp_ttl_secs: u64,
    /// Optional pepper prepended to passwords before Argon2id hashing
    /// and verification.
    pub pepper: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_token_lifetime_secs: 900,
            refresh_token_lifetime_days: 7,
            otp_ttl_secs: 600,
            pepper: None,
        }
    }
}
