//! Post-commit OTP delivery.
//!
//! A write path collects deliveries in an [`AfterCommit`] while it
//! runs. Only once every write has succeeded is the queue handed to
//! [`OtpDispatcher::dispatch`]; an early return drops the queue and
//! nothing is sent.

use std::sync::{Arc, Mutex, PoisonError};

use latchkey_core::error::LatchkeyResult;
use latchkey_core::ports::Notifier;
use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinSet;
use tracing::{error, info};

struct PendingOtp {
    email: String,
    code: SecretString,
}

/// Side effects owned by one commit boundary.
#[must_use = "deliveries are discarded unless handed to OtpDispatcher::dispatch"]
#[derive(Default)]
pub struct AfterCommit {
    otps: Vec<PendingOtp>,
}

impl AfterCommit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_otp(&mut self, email: impl Into<String>, code: impl Into<String>) {
        self.otps.push(PendingOtp {
            email: email.into(),
            code: SecretString::from(code.into()),
        });
    }

    pub fn len(&self) -> usize {
        self.otps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.otps.is_empty()
    }
}

/// Runs committed deliveries on background tasks.
///
/// Failures are logged and swallowed. Call [`drain`](Self::drain)
/// before shutdown to wait for in-flight deliveries.
pub struct OtpDispatcher<N: Notifier + 'static> {
    notifier: Arc<N>,
    tasks: Mutex<JoinSet<()>>,
}

impl<N: Notifier + 'static> OtpDispatcher<N> {
    pub fn new(notifier: N) -> Self {
        Self {
            notifier: Arc::new(notifier),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Release the deliveries of a committed boundary.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, after: AfterCommit) {
        if after.is_empty() {
            return;
        }
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        // reap finished deliveries
        while tasks.try_join_next().is_some() {}
        for PendingOtp { email, code } in after.otps {
            let notifier = Arc::clone(&self.notifier);
            tasks.spawn(async move {
                match notifier.send_otp(&email, code.expose_secret()).await {
                    Ok(()) => info!(%email, "OTP delivered"),
                    Err(e) => error!(%email, error = %e, "OTP delivery failed"),
                }
            });
        }
    }

    /// Wait for every delivery dispatched so far.
    pub async fn drain(&self) {
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "OTP delivery task aborted");
            }
        }
    }
}

/// Development transport: records the request in the log. The code
/// itself is never written.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send_otp(&self, email: &str, _code: &str) -> LatchkeyResult<()> {
        info!(%email, "OTP email would be sent");
        Ok(())
    }
}
