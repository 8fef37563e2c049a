//! Domain models for Latchkey.
//!
//! OTP challenges are not modelled here: they live only as cache
//! entries behind [`crate::repository::ChallengeCache`].

pub mod refresh_token;
pub mod user;
