// handlers/admin.rs - /api/admin/* handlers: admin accounts, staff, catalog and bookings

use axum::extract::{Path, State};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::app::AppState;
use crate::auth::Session;
use crate::database::BookingFilter;
use crate::error::ApiError;
use crate::handlers::session::{self, LoginRequest, VerifyRequest};
use crate::middleware::{current_identity, AdminSession, ApiResponse, ApiResult};
use crate::models::{Booking, BookingEvent, Career, Category, Identity, Profile, Role, Schedule};
use crate::services::{AuthService, BookingService};
use crate::validation::{field_errors, validate_not_blank, validate_phone, validate_pincode, ValidatedJson};

#[derive(Debug, Deserialize, Validate)]
pub struct StaffRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(custom = "validate_phone")]
    pub phone: String,
}

fn require_superadmin(admin: &Identity) -> Result<(), ApiError> {
    if !admin.is_superadmin() {
        tracing::warn!("Admin {} attempted a superadmin action", admin.id);
        return Err(ApiError::forbidden("Only the superadmin can do this"));
    }
    Ok(())
}

/**
 * POST /api/admin/signup - Create an admin account
 *
 * While no admin exists the first signup needs no session and becomes the
 * superadmin. After that only the superadmin may add admins.
 */
pub async fn signup(
    State(state): State<AppState>,
    session: Option<Session>,
    ValidatedJson(request): ValidatedJson<StaffRequest>,
) -> ApiResult<Identity> {
    let bootstrap = state.store.count_identities(Role::Admin).await? == 0;

    if !bootstrap {
        let session = session.ok_or_else(|| ApiError::unauthorized("Please log in to continue"))?;
        if session.role != Role::Admin {
            return Err(ApiError::forbidden("You do not have access to this resource"));
        }
        require_superadmin(&current_identity(&state, &session).await?)?;
    }

    let identity = Identity::new(
        &request.email,
        &request.name,
        &request.phone,
        Profile::Admin { superadmin: bootstrap },
        Utc::now(),
    );
    let identity = AuthService::new(&state).register(identity).await?;

    if bootstrap {
        tracing::info!("Bootstrapped superadmin {}", identity.id);
    }
    Ok(ApiResponse::created("Admin created, OTP sent to email", identity))
}

pub async fn signin(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<()> {
    session::send_login_code(&state, Role::Admin, request).await
}

pub async fn verify(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<VerifyRequest>,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    session::verify_login_code(&state, Role::Admin, jar, request).await
}

/// DELETE /api/admin/admins/:id - superadmin only, never yourself
pub async fn admins_delete(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    require_superadmin(session.identity())?;

    if id == session.id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let target = state
        .store
        .find_identity(id)
        .await?
        .filter(|identity| identity.role == Role::Admin)
        .ok_or_else(|| ApiError::not_found("Admin not found"))?;

    state.store.delete_identity(target.id).await?;
    tracing::info!("Admin {} deleted admin {}", session.id, target.id);
    Ok(ApiResponse::message("Admin deleted"))
}

// Staff

pub async fn employees_list(State(state): State<AppState>, _session: AdminSession) -> ApiResult<Vec<Identity>> {
    let employees = state.store.list_identities(Role::Employee).await?;
    Ok(ApiResponse::success("Employees", employees))
}

pub async fn employees_by_category(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(category_id): Path<Uuid>,
) -> ApiResult<Vec<Identity>> {
    state
        .store
        .find_category(category_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    let employees = state
        .store
        .list_identities(Role::Employee)
        .await?
        .into_iter()
        .filter(|identity| identity.employee_category() == Some(category_id))
        .collect();
    Ok(ApiResponse::success("Employees", employees))
}

async fn set_employee_active(state: &AppState, session: &AdminSession, id: Uuid, active: bool) -> ApiResult<Identity> {
    let mut employee = state
        .store
        .find_identity(id)
        .await?
        .filter(|identity| identity.role == Role::Employee)
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    employee.is_active = active;
    employee.updated_at = Utc::now();
    let employee = state.store.update_identity(&employee).await?;

    tracing::info!(
        "Admin {} {} employee {}",
        session.id,
        if active { "activated" } else { "deactivated" },
        employee.id
    );
    let message = if active { "Employee activated" } else { "Employee deactivated" };
    Ok(ApiResponse::success(message, employee))
}

pub async fn employees_activate(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Identity> {
    set_employee_active(&state, &session, id, true).await
}

pub async fn employees_deactivate(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Identity> {
    set_employee_active(&state, &session, id, false).await
}

#[derive(Debug, Deserialize, Validate)]
pub struct FieldExecRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(custom = "validate_phone")]
    pub phone: String,

    #[validate(custom = "validate_pincode")]
    pub pincode: String,

    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 100))]
    pub block: String,
}

pub async fn field_execs_create(
    State(state): State<AppState>,
    _session: AdminSession,
    ValidatedJson(request): ValidatedJson<FieldExecRequest>,
) -> ApiResult<Identity> {
    let identity = Identity::new(
        &request.email,
        &request.name,
        &request.phone,
        Profile::FieldExec {
            pincode: request.pincode,
            block: request.block.trim().to_string(),
        },
        Utc::now(),
    );
    let identity = AuthService::new(&state).register(identity).await?;
    Ok(ApiResponse::created("Field executive created", identity))
}

pub async fn field_execs_list(State(state): State<AppState>, _session: AdminSession) -> ApiResult<Vec<Identity>> {
    let field_execs = state.store.list_identities(Role::FieldExec).await?;
    Ok(ApiResponse::success("Field executives", field_execs))
}

// Catalog

fn price_band(min_price: i64, max_price: i64) -> Result<(), ValidationError> {
    if max_price < min_price {
        let mut error = ValidationError::new("max_price");
        error.message = Some("must not be below min_price".into());
        return Err(error);
    }
    Ok(())
}

fn category_band(request: &CategoryRequest) -> Result<(), ValidationError> {
    price_band(request.min_price, request.max_price)
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "category_band"))]
pub struct CategoryRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 1000))]
    pub description: String,

    #[validate(range(min = 1, message = "must be greater than zero"))]
    pub min_price: i64,

    pub max_price: i64,
}

pub async fn categories_create(
    State(state): State<AppState>,
    _session: AdminSession,
    ValidatedJson(request): ValidatedJson<CategoryRequest>,
) -> ApiResult<Category> {
    let category = Category::new(
        &request.name,
        &request.description,
        request.min_price,
        request.max_price,
        Utc::now(),
    );
    let category = state.store.create_category(category).await?;
    Ok(ApiResponse::created("Category created", category))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryUpdate {
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    #[validate(range(min = 1, message = "must be greater than zero"))]
    pub min_price: Option<i64>,

    #[validate(range(min = 1, message = "must be greater than zero"))]
    pub max_price: Option<i64>,

    pub is_active: Option<bool>,
}

pub async fn categories_update(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(id): Path<Uuid>,
    ValidatedJson(update): ValidatedJson<CategoryUpdate>,
) -> ApiResult<Category> {
    let mut category = state
        .store
        .find_category(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    if let Some(name) = update.name {
        category.name = name.trim().to_string();
    }
    if let Some(description) = update.description {
        category.description = description.trim().to_string();
    }
    if let Some(min_price) = update.min_price {
        category.min_price = min_price;
    }
    if let Some(max_price) = update.max_price {
        category.max_price = max_price;
    }
    if let Some(is_active) = update.is_active {
        category.is_active = is_active;
    }

    // The band is checked on the merged result
    if let Err(error) = price_band(category.min_price, category.max_price) {
        let mut errors = validator::ValidationErrors::new();
        errors.add("max_price", error);
        return Err(ApiError::validation_error("Invalid request data", Some(field_errors(&errors))));
    }

    category.updated_at = Utc::now();
    let category = state.store.update_category(&category).await?;
    Ok(ApiResponse::success("Category updated", category))
}

/// DELETE /api/admin/categories/:id - soft delete, existing bookings keep their category
pub async fn categories_delete(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Category> {
    let mut category = state
        .store
        .find_category(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    category.is_active = false;
    category.updated_at = Utc::now();
    let category = state.store.update_category(&category).await?;
    Ok(ApiResponse::success("Category deleted", category))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CareerRequest {
    #[validate(length(min = 2, max = 100))]
    pub title: String,

    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,

    #[serde(default)]
    #[validate(length(max = 200))]
    pub location: String,
}

pub async fn careers_create(
    State(state): State<AppState>,
    _session: AdminSession,
    ValidatedJson(request): ValidatedJson<CareerRequest>,
) -> ApiResult<Career> {
    let career = Career::new(&request.title, &request.description, &request.location, Utc::now());
    let career = state.store.create_career(career).await?;
    Ok(ApiResponse::created("Career posted", career))
}

/// DELETE /api/admin/careers/:id - closes the posting
pub async fn careers_delete(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Career> {
    let mut career = state
        .store
        .find_career(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Career not found"))?;

    career.is_active = false;
    let career = state.store.update_career(&career).await?;
    Ok(ApiResponse::success("Career closed", career))
}

// Bookings

pub async fn bookings_list(State(state): State<AppState>, _session: AdminSession) -> ApiResult<Vec<Booking>> {
    let bookings = state.store.list_bookings(BookingFilter::All).await?;
    Ok(ApiResponse::success("Bookings", bookings))
}

#[derive(Debug, Deserialize, Validate)]
pub struct OfferRequest {
    pub employee_id: Uuid,
}

/// POST /api/admin/bookings/:id/schedules - offer a paid booking to an employee
pub async fn bookings_offer(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<OfferRequest>,
) -> ApiResult<Schedule> {
    let schedule = BookingService::new(state.store.as_ref())
        .offer(id, request.employee_id)
        .await?;
    Ok(ApiResponse::created("Booking offered", schedule))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefundRequest {
    #[validate(range(min = 1, message = "must be greater than zero"))]
    pub amount: i64,

    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 100))]
    pub refund_id: String,
}

/// POST /api/admin/bookings/:id/refund - settle the refund of a cancelled, paid booking
pub async fn bookings_refund(
    State(state): State<AppState>,
    session: AdminSession,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<RefundRequest>,
) -> ApiResult<Booking> {
    let service = BookingService::new(state.store.as_ref());
    let booking = service.find(id).await?;
    let booking = service
        .apply(
            &booking,
            BookingEvent::Refund {
                amount: request.amount,
                refund_id: request.refund_id.trim().to_string(),
            },
        )
        .await?;

    tracing::info!("Admin {} refunded booking {}", session.id, booking.id);
    Ok(ApiResponse::success("Refund recorded", booking))
}
