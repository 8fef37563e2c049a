//! Latchkey Auth: registration, OTP challenges, password login,
//! access-token signing and refresh-token rotation.

pub mod challenge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod login;
pub mod password;
pub mod random;
pub mod registration;
pub mod service;
pub mod session;
pub mod token;

pub use challenge::{ChallengeService, OtpCommand};
pub use config::AuthConfig;
pub use dispatch::{AfterCommit, LogNotifier, OtpDispatcher};
pub use error::AuthError;
pub use login::{LoginCommand, LoginOutcome, LoginService};
pub use random::SecureRandom;
pub use registration::{RegisterCommand, RegisterOutcome, RegistrationService};
pub use service::{AuthService, SessionGrant};
pub use session::{RefreshSuccess, SessionRotationService};
pub use token::{AccessTokenClaims, TokenSigner};
