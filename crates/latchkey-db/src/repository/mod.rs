//! SurrealDB repository implementations.

mod challenge;
mod refresh_token;
mod user;

pub use challenge::SurrealChallengeCache;
pub use refresh_token::SurrealRefreshTokenRepository;
pub use user::SurrealUserRepository;
