// handlers/field_exec.rs - /api/field-exec/* handlers: login, profile and employee recruitment

use axum::extract::State;
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::handlers::session::{self, LoginRequest, VerifyRequest};
use crate::middleware::{ApiResponse, ApiResult, FieldExecSession};
use crate::models::{Identity, Profile, Role};
use crate::validation::{validate_not_blank, validate_phone, validate_pincode, ValidatedJson};

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<()> {
    session::send_login_code(&state, Role::FieldExec, request).await
}

pub async fn verify(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<VerifyRequest>,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    session::verify_login_code(&state, Role::FieldExec, jar, request).await
}

pub async fn profile_get(session: FieldExecSession) -> ApiResult<Identity> {
    Ok(ApiResponse::success("Profile", session.into_identity()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,

    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,

    #[validate(custom = "validate_pincode")]
    pub pincode: Option<String>,

    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 100))]
    pub block: Option<String>,
}

/// PUT /api/field-exec/profile - update contact details and working area
pub async fn profile_put(
    State(state): State<AppState>,
    session: FieldExecSession,
    ValidatedJson(update): ValidatedJson<ProfileUpdate>,
) -> ApiResult<Identity> {
    let mut identity = session.into_identity();

    if let Some(name) = update.name {
        identity.name = name.trim().to_string();
    }
    if let Some(phone) = update.phone {
        identity.phone = phone;
    }
    if let Profile::FieldExec { pincode, block } = &mut identity.profile {
        if let Some(new_pincode) = update.pincode {
            *pincode = new_pincode;
        }
        if let Some(new_block) = update.block {
            *block = new_block.trim().to_string();
        }
    }
    identity.updated_at = Utc::now();

    let identity = state.store.update_identity(&identity).await?;
    Ok(ApiResponse::success("Profile updated", identity))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecruitRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(custom = "validate_phone")]
    pub phone: String,

    pub category_id: Uuid,
}

/// POST /api/field-exec/employees - recruit an employee, inactive until an admin approves
pub async fn recruits_create(
    State(state): State<AppState>,
    session: FieldExecSession,
    ValidatedJson(request): ValidatedJson<RecruitRequest>,
) -> ApiResult<Identity> {
    let category = state
        .store
        .find_category(request.category_id)
        .await?
        .filter(|category| category.is_active)
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    let mut recruit = Identity::new(
        &request.email,
        &request.name,
        &request.phone,
        Profile::Employee {
            category_id: Some(category.id),
            recruited_by: Some(session.id),
            bank: None,
        },
        Utc::now(),
    );
    recruit.is_active = false;

    let recruit = state.store.create_identity(recruit).await?;
    tracing::info!("Field executive {} recruited employee {}", session.id, recruit.id);
    Ok(ApiResponse::created("Employee recruited, pending admin approval", recruit))
}

pub async fn recruits_list(State(state): State<AppState>, session: FieldExecSession) -> ApiResult<Vec<Identity>> {
    let recruits = state
        .store
        .list_identities(Role::Employee)
        .await?
        .into_iter()
        .filter(|identity| identity.recruited_by() == Some(session.id))
        .collect();
    Ok(ApiResponse::success("Recruited employees", recruits))
}
