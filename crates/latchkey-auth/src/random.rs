//! Instance-owned cryptographic random source for OTP codes and
//! refresh tokens.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

const OTP_SPACE: u32 = 1_000_000;

/// A CSPRNG behind a short mutex.
///
/// The lock is never held across an `.await`.
pub struct SecureRandom {
    rng: Mutex<StdRng>,
}

impl SecureRandom {
    /// Seeded from the operating system. Use this in production.
    pub fn from_os_rng() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic generator for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Uniform 6-digit code, zero-padded (`000000`..=`999999`).
    pub fn otp_code(&self) -> String {
        let n = self.lock().random_range(0..OTP_SPACE);
        format!("{n:06}")
    }

    pub fn fill_bytes(&self, dest: &mut [u8]) {
        self.lock().fill_bytes(dest);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SecureRandom {
    fn default() -> Self {
        Self::from_os_rng()
    }
}
