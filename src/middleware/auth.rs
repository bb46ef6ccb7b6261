use std::marker::PhantomData;
use std::ops::Deref;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::app::AppState;
use crate::auth::cookie::session_token;
use crate::auth::{Session, SessionError};
use crate::error::ApiError;
use crate::models::{Identity, Role};

/// Any signed-in caller. The token comes from the `token` cookie or a
/// Bearer header; a missing or invalid token is a 401.
#[axum::async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(SessionError::Missing)?;
        Ok(state.sessions.verify(&token)?)
    }
}

/// Marker for the role a route requires
pub trait RoleGate: Send + Sync + 'static {
    const ROLE: Role;
}

pub struct UserGate;
pub struct EmployeeGate;
pub struct FieldExecGate;
pub struct AdminGate;

impl RoleGate for UserGate {
    const ROLE: Role = Role::User;
}

impl RoleGate for EmployeeGate {
    const ROLE: Role = Role::Employee;
}

impl RoleGate for FieldExecGate {
    const ROLE: Role = Role::FieldExec;
}

impl RoleGate for AdminGate {
    const ROLE: Role = Role::Admin;
}

/// Resolve the account behind a verified token.
///
/// Tokens outlive the state they were minted from, so the store decides: a
/// deleted account, or one whose role no longer matches, is signed out (401)
/// and a deactivated one is refused (403).
pub async fn current_identity(state: &AppState, session: &Session) -> Result<Identity, ApiError> {
    let identity = state
        .store
        .find_identity(session.id)
        .await?
        .filter(|identity| identity.role == session.role)
        .ok_or_else(|| {
            tracing::info!("{} session {} no longer matches an account", session.role, session.id);
            ApiError::unauthorized("Session no longer matches an account, please log in again")
        })?;

    if !identity.can_log_in() {
        tracing::warn!("Inactive {} {} used a live session", identity.role, identity.id);
        return Err(ApiError::forbidden("Account is not active, contact support"));
    }
    Ok(identity)
}

/// A session whose role matched `R`, backed by a live, active account.
/// Valid sessions of another role get 403.
pub struct Authorized<R: RoleGate> {
    session: Session,
    identity: Identity,
    _gate: PhantomData<fn() -> R>,
}

impl<R: RoleGate> Authorized<R> {
    /// The account as currently stored
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn into_identity(self) -> Identity {
        self.identity
    }
}

impl<R: RoleGate> Deref for Authorized<R> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

#[axum::async_trait]
impl<R: RoleGate> FromRequestParts<AppState> for Authorized<R> {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;

        if session.role != R::ROLE {
            tracing::warn!(
                "{} session {} refused on {} route {}",
                session.role,
                session.id,
                R::ROLE,
                parts.uri.path()
            );
            return Err(ApiError::forbidden("You do not have access to this resource"));
        }

        let identity = current_identity(state, &session).await?;
        Ok(Self {
            session,
            identity,
            _gate: PhantomData,
        })
    }
}

pub type UserSession = Authorized<UserGate>;
pub type EmployeeSession = Authorized<EmployeeGate>;
pub type FieldExecSession = Authorized<FieldExecGate>;
pub type AdminSession = Authorized<AdminGate>;
