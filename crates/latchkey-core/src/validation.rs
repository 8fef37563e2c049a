//! Field-level and cross-field invariants for users, OTP codes and
//! refresh tokens.
//!
//! Pure functions, no I/O. Every service calls the matching validator
//! before it writes to a store. Date comparisons use the current wall
//! clock.

use std::sync::LazyLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{LatchkeyError, LatchkeyResult};
use crate::models::refresh_token::RefreshToken;
use crate::models::user::{CreateUser, User};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9+_.-]+@([A-Za-z0-9.-]+\.[A-Za-z]{2,})$").expect("valid email regex")
});

static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9]([-. ]?[0-9]){9}$").expect("valid phone regex"));

static POSTAL_CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]\d[A-Za-z]\d[A-Za-z]\d$").expect("valid postal code regex")
});

static OTP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{6}$").expect("valid otp regex"));

static BASE64URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+={0,2}$").expect("valid base64url regex"));

const MIN_AGE: u32 = 18;
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_NAME_LENGTH: usize = 50;
const MAX_ADDRESS_LENGTH: usize = 255;
const MAX_CITY_LENGTH: usize = 100;
/// 64 random bytes encode to 88 padded base64url characters.
pub const MIN_REFRESH_TOKEN_LENGTH: usize = 80;

const MASKED: &str = "***";

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Validate a candidate account and its plaintext password before the
/// password is hashed and the account persisted.
pub fn validate_user_for_creation(user: &CreateUser, password: &SecretString) -> LatchkeyResult<()> {
    validate_names(&user.first_name, &user.last_name)?;
    validate_contact(&user.email, user.phone_number.as_deref())?;
    validate_address(
        user.address.as_deref(),
        user.city.as_deref(),
        user.postal_code.as_deref(),
    )?;
    validate_age(user.date_of_birth)?;
    validate_password(password)
}

/// Validate an existing account before it is saved.
///
/// `password_change` is `None` when the credential is not being
/// changed; the strength policy is skipped only in that case.
pub fn validate_user_for_update(
    user: &User,
    password_change: Option<&SecretString>,
) -> LatchkeyResult<()> {
    if user.id.is_nil() {
        return Err(LatchkeyError::user_invalid(
            "id",
            "null",
            "ID is required for update",
        ));
    }
    validate_names(&user.first_name, &user.last_name)?;
    validate_contact(&user.email, user.phone_number.as_deref())?;
    validate_address(
        user.address.as_deref(),
        user.city.as_deref(),
        user.postal_code.as_deref(),
    )?;
    validate_age(user.date_of_birth)?;
    match password_change {
        Some(password) => validate_password(password),
        None => Ok(()),
    }
}

fn validate_names(first_name: &str, last_name: &str) -> LatchkeyResult<()> {
    for (field, value) in [("firstName", first_name), ("lastName", last_name)] {
        if value.trim().is_empty() {
            return Err(LatchkeyError::user_invalid(field, value, "is required"));
        }
        if value.chars().count() > MAX_NAME_LENGTH {
            return Err(LatchkeyError::user_invalid(
                field,
                value,
                format!("must not exceed {MAX_NAME_LENGTH} characters"),
            ));
        }
    }
    Ok(())
}

fn validate_contact(email: &str, phone_number: Option<&str>) -> LatchkeyResult<()> {
    if email.trim().is_empty() {
        return Err(LatchkeyError::user_invalid("email", email, "Email is required"));
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(LatchkeyError::user_invalid(
            "email",
            email,
            "Invalid email format",
        ));
    }
    if let Some(phone) = phone_number.filter(|p| !p.trim().is_empty())
        && !PHONE_PATTERN.is_match(phone)
    {
        return Err(LatchkeyError::user_invalid(
            "phoneNumber",
            phone,
            "Invalid phone number format",
        ));
    }
    Ok(())
}

fn validate_address(
    address: Option<&str>,
    city: Option<&str>,
    postal_code: Option<&str>,
) -> LatchkeyResult<()> {
    if let Some(address) = address
        && address.chars().count() > MAX_ADDRESS_LENGTH
    {
        return Err(LatchkeyError::user_invalid(
            "address",
            address,
            format!("Address must not exceed {MAX_ADDRESS_LENGTH} characters"),
        ));
    }
    if let Some(city) = city
        && city.chars().count() > MAX_CITY_LENGTH
    {
        return Err(LatchkeyError::user_invalid(
            "city",
            city,
            format!("City must not exceed {MAX_CITY_LENGTH} characters"),
        ));
    }
    if let Some(postal) = postal_code.filter(|p| !p.trim().is_empty())
        && !POSTAL_CODE_PATTERN.is_match(postal)
    {
        return Err(LatchkeyError::user_invalid(
            "postalCode",
            postal,
            "Postal code must match A1A1A1",
        ));
    }
    Ok(())
}

fn validate_age(date_of_birth: NaiveDate) -> LatchkeyResult<()> {
    let today = Utc::now().date_naive();
    if date_of_birth > today {
        return Err(LatchkeyError::user_invalid(
            "dateOfBirth",
            date_of_birth.to_string(),
            "Date of birth cannot be in the future",
        ));
    }
    let age = today.years_since(date_of_birth).unwrap_or(0);
    if age < MIN_AGE {
        return Err(LatchkeyError::user_invalid(
            "dateOfBirth",
            date_of_birth.to_string(),
            format!("User must be at least {MIN_AGE} years old"),
        ));
    }
    Ok(())
}

fn validate_password(password: &SecretString) -> LatchkeyResult<()> {
    let password = password.expose_secret();
    let rules: [(bool, String); 5] = [
        (!password.trim().is_empty(), "Password is required".into()),
        (
            password.chars().count() >= MIN_PASSWORD_LENGTH,
            format!("Password must be at least {MIN_PASSWORD_LENGTH} characters long"),
        ),
        (
            password.chars().any(|c| c.is_ascii_uppercase()),
            "Password must contain at least one uppercase letter".into(),
        ),
        (
            password.chars().any(|c| c.is_ascii_lowercase()),
            "Password must contain at least one lowercase letter".into(),
        ),
        (
            password.chars().any(|c| c.is_ascii_digit()),
            "Password must contain at least one digit".into(),
        ),
    ];
    match rules.into_iter().find(|(ok, _)| !ok) {
        Some((_, reason)) => Err(LatchkeyError::user_invalid("password", MASKED, reason)),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// OTP codes
// ---------------------------------------------------------------------------

pub fn validate_otp_format(code: &str) -> LatchkeyResult<()> {
    if code.trim().is_empty() {
        return Err(LatchkeyError::OtpInvalidFormat {
            reason: "code is required".into(),
        });
    }
    if !OTP_PATTERN.is_match(code) {
        return Err(LatchkeyError::OtpInvalidFormat {
            reason: "code must be exactly 6 digits".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Refresh tokens
// ---------------------------------------------------------------------------

pub fn validate_refresh_token_for_creation(token: &RefreshToken) -> LatchkeyResult<()> {
    if token.user_id.is_nil() {
        return Err(LatchkeyError::refresh_token_invalid(
            "user.id",
            "User ID is required",
        ));
    }

    if token.token.trim().is_empty() {
        return Err(LatchkeyError::refresh_token_invalid(
            "token",
            "token is required",
        ));
    }
    if token.token.len() < MIN_REFRESH_TOKEN_LENGTH {
        return Err(LatchkeyError::refresh_token_invalid("token", "token too short"));
    }
    if !BASE64URL_PATTERN.is_match(&token.token) {
        return Err(LatchkeyError::refresh_token_invalid(
            "token",
            "must be base64url (A-Za-z0-9_- with optional '=' padding)",
        ));
    }

    if token.expiry_date <= Utc::now() {
        return Err(LatchkeyError::refresh_token_invalid(
            "expiryDate",
            "Expiry date must be in the future",
        ));
    }
    if token.created_at >= token.expiry_date {
        return Err(LatchkeyError::refresh_token_invalid(
            "createdAt",
            "Creation date must be before expiry date",
        ));
    }

    if token.revoked {
        return Err(LatchkeyError::refresh_token_invalid(
            "revoked",
            "Revoked must be false on creation",
        ));
    }
    if token.replaced_by.is_some() {
        return Err(LatchkeyError::refresh_token_invalid(
            "replacedBy",
            "ReplacedBy may only be set when revoking",
        ));
    }
    Ok(())
}

/// `successor_required` is true for rotation and false for logout.
pub fn validate_refresh_token_for_revocation(
    token: &RefreshToken,
    successor_required: bool,
) -> LatchkeyResult<()> {
    if !token.revoked {
        return Err(LatchkeyError::refresh_token_invalid(
            "revoked",
            "Revoked must be true when revoking",
        ));
    }
    if successor_required && token.replaced_by.is_none() {
        return Err(LatchkeyError::refresh_token_invalid(
            "replacedBy",
            "ReplacedBy must reference the new token when revoking",
        ));
    }
    Ok(())
}
