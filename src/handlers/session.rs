// handlers/session.rs - Login code flow shared by every role, plus
// GET /api/auth/whoami and POST /api/auth/logout

use axum::extract::State;
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::app::AppState;
use crate::auth::cookie::{cleared_session_cookie, session_cookie};
use crate::auth::Session;
use crate::error::ApiError;
use crate::middleware::{current_identity, ApiResponse, ApiResult};
use crate::models::Role;
use crate::services::AuthService;
use crate::validation::validate_otp;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    #[validate(email)]
    pub email: String,

    #[validate(custom = "validate_otp")]
    pub otp: String,
}

/// Mail a login code to an existing account of `role`
pub async fn send_login_code(state: &AppState, role: Role, request: LoginRequest) -> ApiResult<()> {
    AuthService::new(state).request_code(role, &request.email).await?;
    Ok(ApiResponse::message("OTP sent to your email"))
}

/// Trade a login code for the session cookie
pub async fn verify_login_code(
    state: &AppState,
    role: Role,
    jar: CookieJar,
    request: VerifyRequest,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    let (identity, token) = AuthService::new(state)
        .verify_code(role, &request.email, &request.otp)
        .await?;

    let cookie = session_cookie(token, state.sessions.ttl(), state.secure_cookies());
    Ok((
        jar.add(cookie),
        ApiResponse::success("Logged in", json!({ "user": identity })),
    ))
}

/// GET /api/auth/whoami - the caller as seen by the session token, if the
/// account behind it is still live
pub async fn whoami(State(state): State<AppState>, session: Session) -> ApiResult<Session> {
    current_identity(&state, &session).await?;
    Ok(ApiResponse::success("Session is valid", session))
}

/// POST /api/auth/logout - always succeeds, with or without a session
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, ApiResponse<()>) {
    (
        jar.add(cleared_session_cookie(state.secure_cookies())),
        ApiResponse::message("Logged out"),
    )
}
