use std::sync::Arc;
use std::time::Duration;

use dashmap::{mapref::entry::Entry, DashMap};
use rand::Rng;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::models::user::normalize_email;

pub const OTP_LENGTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub code: String,
    pub expires_at: OffsetDateTime,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("no verification code was requested for this email")]
    NotFound,
    #[error("verification code has expired")]
    Expired,
    #[error("verification code is invalid ({remaining} attempts left)")]
    Mismatch { remaining: u32 },
    #[error("too many invalid attempts")]
    TooManyAttempts,
}

/// Process-local store of pending email verification codes keyed by
/// normalized email. Not shared across instances.
#[derive(Debug)]
pub struct OtpStore {
    entries: DashMap<String, OtpRecord>,
    max_attempts: u32,
}

impl OtpStore {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            entries: DashMap::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Uniformly random code in `100000..=999999`.
    pub fn generate() -> String {
        rand::rng().random_range(100_000..=999_999u32).to_string()
    }

    /// Replaces any pending code for the email.
    pub fn store(&self, email: &str, code: &str, expires_at: OffsetDateTime) {
        self.sweep_expired(OffsetDateTime::now_utc());
        self.entries.insert(
            normalize_email(email),
            OtpRecord {
                code: code.to_string(),
                expires_at,
                attempts: 0,
            },
        );
    }

    pub fn get(&self, email: &str) -> Option<OtpRecord> {
        let key = normalize_email(email);
        let now = OffsetDateTime::now_utc();
        // remove_if keeps the check and the removal under one shard lock
        if self
            .entries
            .remove_if(&key, |_, record| record.expires_at <= now)
            .is_some()
        {
            return None;
        }
        self.entries.get(&key).map(|record| record.value().clone())
    }

    pub fn delete(&self, email: &str) {
        self.entries.remove(&normalize_email(email));
    }

    /// Consumes the code on success, so a code validates at most once.
    pub fn verify(&self, email: &str, code: &str, now: OffsetDateTime) -> Result<(), OtpError> {
        match self.entries.entry(normalize_email(email)) {
            Entry::Vacant(_) => Err(OtpError::NotFound),
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at <= now {
                    occupied.remove();
                    return Err(OtpError::Expired);
                }

                let matches: bool = occupied
                    .get()
                    .code
                    .as_bytes()
                    .ct_eq(code.trim().as_bytes())
                    .into();
                if matches {
                    occupied.remove();
                    return Ok(());
                }

                let record = occupied.get_mut();
                record.attempts += 1;
                if record.attempts >= self.max_attempts {
                    occupied.remove();
                    Err(OtpError::TooManyAttempts)
                } else {
                    Err(OtpError::Mismatch {
                        remaining: self.max_attempts - record.attempts,
                    })
                }
            }
        }
    }

    pub fn sweep_expired(&self, now: OffsetDateTime) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, record| record.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn spawn_sweeper(store: Arc<OtpStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = store.sweep_expired(OffsetDateTime::now_utc());
            if removed > 0 {
                debug!(removed, remaining = store.len(), "swept expired verification codes");
            }
        }
    })
}
