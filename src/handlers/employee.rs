// handlers/employee.rs - /api/employee/* handlers: login, bank details, offers and assigned work

use axum::extract::{Path, State};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::app::AppState;
use crate::database::BookingFilter;
use crate::error::ApiError;
use crate::handlers::session::{self, LoginRequest, VerifyRequest};
use crate::middleware::{ApiResponse, ApiResult, EmployeeSession};
use crate::models::{BankDetails, Booking, BookingEvent, BookingStatus, Identity, Profile, Role, Schedule};
use crate::services::BookingService;
use crate::validation::{validate_account_number, validate_ifsc, ValidatedJson};

/// Inactive employees are refused here with 403
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<()> {
    session::send_login_code(&state, Role::Employee, request).await
}

pub async fn verify(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<VerifyRequest>,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    session::verify_login_code(&state, Role::Employee, jar, request).await
}

pub async fn profile_get(session: EmployeeSession) -> ApiResult<Identity> {
    Ok(ApiResponse::success("Profile", session.into_identity()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct BankRequest {
    #[validate(length(min = 2, max = 100))]
    pub account_holder: String,

    #[validate(custom = "validate_account_number")]
    pub account_number: String,

    #[validate(custom = "validate_ifsc")]
    pub ifsc: String,
}

/// PUT /api/employee/bank - replace payout bank details
pub async fn bank_put(
    State(state): State<AppState>,
    session: EmployeeSession,
    ValidatedJson(request): ValidatedJson<BankRequest>,
) -> ApiResult<Identity> {
    let mut identity = session.into_identity();

    let Profile::Employee { bank, .. } = &mut identity.profile else {
        tracing::error!("Employee {} has a {} profile", identity.id, identity.profile.role());
        return Err(ApiError::internal_server_error("An error occurred while processing your request"));
    };
    *bank = Some(BankDetails {
        account_holder: request.account_holder.trim().to_string(),
        account_number: request.account_number,
        ifsc: request.ifsc,
    });
    identity.updated_at = Utc::now();

    let identity = state.store.update_identity(&identity).await?;
    Ok(ApiResponse::success("Bank details updated", identity))
}

pub async fn schedules_list(State(state): State<AppState>, session: EmployeeSession) -> ApiResult<Vec<Schedule>> {
    let schedules = state.store.list_schedules_for_employee(session.id).await?;
    Ok(ApiResponse::success("Schedules", schedules))
}

/// POST /api/employee/schedules/:id/accept - take an offered booking
pub async fn schedules_accept(
    State(state): State<AppState>,
    session: EmployeeSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    let (schedule, booking) = BookingService::new(state.store.as_ref())
        .accept(id, session.id)
        .await?;
    Ok(ApiResponse::success(
        "Booking accepted",
        json!({ "schedule": schedule, "booking": booking }),
    ))
}

pub async fn bookings_list(State(state): State<AppState>, session: EmployeeSession) -> ApiResult<Vec<Booking>> {
    let bookings = state
        .store
        .list_bookings(BookingFilter::ForEmployee(session.id))
        .await?;
    Ok(ApiResponse::success("Bookings", bookings))
}

/// Employees may only move work forward to these two states
fn work_status(value: &str) -> Option<BookingStatus> {
    match value.parse() {
        Ok(status @ (BookingStatus::Started | BookingStatus::Completed)) => Some(status),
        _ => None,
    }
}

fn validate_work_status(value: &str) -> Result<(), ValidationError> {
    if work_status(value).is_some() {
        return Ok(());
    }
    let mut error = ValidationError::new("status");
    error.message = Some("must be 'started' or 'completed'".into());
    Err(error)
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    #[validate(custom = "validate_work_status")]
    pub status: String,
}

/// PUT /api/employee/bookings/:id/status - start or complete assigned work
pub async fn bookings_status(
    State(state): State<AppState>,
    session: EmployeeSession,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<StatusRequest>,
) -> ApiResult<Booking> {
    let service = BookingService::new(state.store.as_ref());
    let booking = service.find(id).await?;
    if booking.employee_id != Some(session.id) {
        return Err(ApiError::not_found("Booking not found"));
    }

    let employee_id = session.id;
    let event = match work_status(&request.status) {
        Some(BookingStatus::Started) => BookingEvent::Start { employee_id },
        Some(BookingStatus::Completed) => BookingEvent::Complete { employee_id },
        _ => return Err(ApiError::bad_request("Unsupported status")),
    };

    let booking = service.apply(&booking, event).await?;
    Ok(ApiResponse::success(format!("Booking {}", booking.status), booking))
}
