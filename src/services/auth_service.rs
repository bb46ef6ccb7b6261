use chrono::Utc;
use thiserror::Error;

use crate::app::AppState;
use crate::auth::otp::{self, OtpError, OtpPolicy};
use crate::auth::SessionError;
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::mail::{MailError, MailMessage};
use crate::models::{normalize_email, Identity, Role};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no {0} account for this email")]
    UnknownAccount(Role),

    #[error("account is not active")]
    Inactive,

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UnknownAccount(role) => ApiError::not_found(format!("No {} account found for this email", role)),
            AuthError::Inactive => ApiError::forbidden("Account is not active, contact support"),
            AuthError::Otp(e) => e.into(),
            AuthError::Session(e) => e.into(),
            AuthError::Mail(e) => e.into(),
            AuthError::Database(e) => e.into(),
        }
    }
}

/// OTP login for every role: register, send a code, trade the code for a session
pub struct AuthService<'a> {
    state: &'a AppState,
    policy: OtpPolicy,
}

impl<'a> AuthService<'a> {
    const VERIFY_RETRIES: usize = 5;

    pub fn new(state: &'a AppState) -> Self {
        Self {
            state,
            policy: OtpPolicy::from_config(&state.config.security),
        }
    }

    /// Store a new identity and mail its first login code.
    ///
    /// If the code cannot be issued the identity is removed again, so a failed
    /// signup can simply be retried.
    pub async fn register(&self, identity: Identity) -> Result<Identity, AuthError> {
        let identity = self.state.store.create_identity(identity).await?;

        if identity.can_log_in() {
            if let Err(e) = self.send_code(identity.role, &identity.email).await {
                tracing::warn!("First code for {} {} failed, rolling back signup: {}", identity.role, identity.id, e);
                self.state.store.delete_identity(identity.id).await?;
                return Err(e);
            }
        }

        tracing::info!("Registered {} {}", identity.role, identity.id);
        Ok(identity)
    }

    /// Mail a fresh code to an existing, active account
    pub async fn request_code(&self, role: Role, email: &str) -> Result<(), AuthError> {
        let identity = self
            .state
            .store
            .find_identity_by_email(role, email)
            .await?
            .ok_or(AuthError::UnknownAccount(role))?;

        if !identity.can_log_in() {
            return Err(AuthError::Inactive);
        }

        self.send_code(role, &identity.email).await
    }

    /// Record one attempt against the stored challenge.
    ///
    /// The attempt is written only if the challenge is unchanged since it was
    /// read; a concurrent verify forces a re-read, so a consumed code is seen
    /// as consumed and every attempt is counted.
    async fn check_code(&self, role: Role, email: &str, code: &str) -> Result<Result<(), OtpError>, AuthError> {
        for _ in 0..Self::VERIFY_RETRIES {
            let current = self
                .state
                .store
                .find_otp(role, email)
                .await?
                .ok_or(OtpError::NoChallenge)?;

            let mut next = current.clone();
            let outcome = otp::verify(&self.policy, &mut next, code, Utc::now());
            if next == current {
                // Nothing was recorded (consumed, locked or expired)
                return Ok(outcome);
            }

            match self.state.store.swap_otp(&current, &next).await {
                Ok(()) => return Ok(outcome),
                Err(DatabaseError::Stale(_)) => {
                    tracing::debug!("{} challenge for {} changed during verify, retrying", role, current.email);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!("Gave up verifying {} code for {} under contention", role, normalize_email(email));
        Ok(Err(OtpError::Mismatch))
    }

    async fn send_code(&self, role: Role, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        let previous = self.state.store.find_otp(role, &email).await?;
        let (challenge, code) = otp::issue(&self.policy, previous.as_ref(), &email, role, Utc::now())?;

        self.state.store.save_otp(&challenge).await?;
        self.state
            .mailer
            .send(MailMessage::otp(&email, role, &code, self.policy.ttl.num_minutes()))
            .await?;

        tracing::debug!("Issued {} login code for {}", role, email);
        Ok(())
    }

    /// Check a code and, on success, mark the account verified and mint a session token
    pub async fn verify_code(&self, role: Role, email: &str, code: &str) -> Result<(Identity, String), AuthError> {
        let outcome = self.check_code(role, email, code).await?;
        if let Err(e) = outcome {
            tracing::info!("Rejected {} login code for {}: {}", role, normalize_email(email), e);
            return Err(e.into());
        }

        let mut identity = self
            .state
            .store
            .find_identity_by_email(role, email)
            .await?
            .ok_or(AuthError::UnknownAccount(role))?;

        if !identity.can_log_in() {
            return Err(AuthError::Inactive);
        }

        if !identity.is_verified {
            identity.is_verified = true;
            identity.updated_at = Utc::now();
            identity = self.state.store.update_identity(&identity).await?;
        }

        let token = self.state.sessions.issue(&identity)?;
        tracing::info!("{} {} signed in", identity.role, identity.id);
        Ok((identity, token))
    }
}
