//! Provisioner credential verification.
//!
//! A provisioner is the authorization principal for issuance and
//! revocation: a stable name plus a deployment-injected secret. The
//! secret is compared in constant time and a failure never reveals
//! which part of the credential was wrong. Repeated failures lock the
//! authenticator out for a cooldown period.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Consecutive failures before lockout.
const MAX_FAILURES: u32 = 5;

/// How long a lockout lasts.
const LOCKOUT_DURATION: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Deliberately opaque — does not say whether name or secret failed.
    #[error("provisioner credential rejected")]
    Rejected,

    #[error("too many failed attempts — locked for {remaining_secs} seconds")]
    LockedOut { remaining_secs: u64 },
}

/// The configured provisioner principal.
pub struct Provisioner {
    name: String,
    secret: Zeroizing<String>,
}

impl Provisioner {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: Zeroizing::new(secret.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Constant-time check of a presented secret.
    pub fn verify_secret(&self, presented: &str) -> bool {
        let a = self.secret.as_bytes();
        let b = presented.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        a.ct_eq(b).into()
    }
}

/// Proof of a successful credential check for one lifecycle call.
///
/// Minted per issuance/revocation request and dropped when the call
/// completes — never persisted, never reused.
#[derive(Debug)]
pub struct AuthToken {
    provisioner: String,
    minted_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn provisioner(&self) -> &str {
        &self.provisioner
    }

    pub fn minted_at(&self) -> DateTime<Utc> {
        self.minted_at
    }
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Lockout tracker for failed credential attempts.
#[derive(Debug)]
pub struct Authenticator {
    provisioner: Provisioner,
    failures: u32,
    locked_until: Option<Instant>,
}

impl Authenticator {
    pub fn new(provisioner: Provisioner) -> Self {
        Self {
            provisioner,
            failures: 0,
            locked_until: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked_until
            .map(|until| Instant::now() < until)
            .unwrap_or(false)
    }

    /// Validate a presented secret and mint a single-use token.
    ///
    /// Lockout is checked before the secret so a locked-out caller
    /// learns nothing about credential validity.
    pub fn authenticate(&mut self, secret: &str) -> Result<AuthToken, AuthError> {
        if let Some(until) = self.locked_until {
            if Instant::now() < until {
                let remaining = until.saturating_duration_since(Instant::now());
                return Err(AuthError::LockedOut {
                    remaining_secs: remaining.as_secs(),
                });
            }
            // Lockout expired
            self.locked_until = None;
            self.failures = 0;
        }

        if self.provisioner.verify_secret(secret) {
            self.failures = 0;
            self.locked_until = None;
            Ok(AuthToken {
                provisioner: self.provisioner.name().to_string(),
                minted_at: Utc::now(),
            })
        } else {
            self.failures += 1;
            if self.failures >= MAX_FAILURES {
                self.locked_until = Some(Instant::now() + LOCKOUT_DURATION);
                Err(AuthError::LockedOut {
                    remaining_secs: LOCKOUT_DURATION.as_secs(),
                })
            } else {
                Err(AuthError::Rejected)
            }
        }
    }
}
