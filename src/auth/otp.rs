// One-time passcodes used as login credentials.
//
// A challenge is issued per (email, role). The code itself is only ever sent
// to the mailer; storage keeps a SHA-256 digest bound to the email and role.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::models::{OtpChallenge, Role};

pub const OTP_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    pub ttl: Duration,
    pub max_attempts: u32,
    pub resend_interval: Duration,
}

impl OtpPolicy {
    pub fn from_config(security: &SecurityConfig) -> Self {
        Self {
            ttl: Duration::minutes(security.otp_ttl_minutes),
            max_attempts: security.otp_max_attempts,
            resend_interval: Duration::seconds(security.otp_resend_seconds),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("no active code for this account")]
    NoChallenge,

    #[error("code has already been used")]
    Consumed,

    #[error("code has expired")]
    Expired,

    #[error("code does not match")]
    Mismatch,

    #[error("too many failed attempts")]
    Locked,

    #[error("a code was sent recently, retry in {0} seconds")]
    ResendTooSoon(i64),
}

/// Random six digit code, zero padded
pub fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{:0width$}", n, width = OTP_LENGTH)
}

pub fn digest(email: &str, role: Role, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(b":");
    hasher.update(role.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Create a fresh challenge, refusing if the previous one was sent too recently.
/// Returns the challenge to store and the plain code to mail.
pub fn issue(
    policy: &OtpPolicy,
    previous: Option<&OtpChallenge>,
    email: &str,
    role: Role,
    now: DateTime<Utc>,
) -> Result<(OtpChallenge, String), OtpError> {
    if let Some(previous) = previous {
        let next_allowed = previous.issued_at + policy.resend_interval;
        if !previous.consumed && now < next_allowed {
            return Err(OtpError::ResendTooSoon((next_allowed - now).num_seconds().max(1)));
        }
    }

    let code = generate_code();
    let challenge = OtpChallenge {
        email: email.to_string(),
        role,
        code_hash: digest(email, role, &code),
        issued_at: now,
        expires_at: now + policy.ttl,
        attempts: 0,
        consumed: false,
    };

    Ok((challenge, code))
}

/// Check `code` against the challenge, recording the attempt on it.
///
/// The caller must persist the challenge afterwards whatever the outcome, so
/// that failed attempts count and a successful code cannot be replayed. The
/// write has to be conditional on the challenge as it was read.
pub fn verify(
    policy: &OtpPolicy,
    challenge: &mut OtpChallenge,
    code: &str,
    now: DateTime<Utc>,
) -> Result<(), OtpError> {
    if challenge.consumed {
        return Err(OtpError::Consumed);
    }
    if challenge.attempts >= policy.max_attempts {
        return Err(OtpError::Locked);
    }
    if now >= challenge.expires_at {
        return Err(OtpError::Expired);
    }

    challenge.attempts += 1;

    let presented = digest(&challenge.email, challenge.role, code);
    let matches: bool = presented.as_bytes().ct_eq(challenge.code_hash.as_bytes()).into();
    if !matches {
        if challenge.attempts >= policy.max_attempts {
            return Err(OtpError::Locked);
        }
        return Err(OtpError::Mismatch);
    }

    challenge.consumed = true;
    Ok(())
}
