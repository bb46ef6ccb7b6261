// handlers/user.rs - /api/user/* handlers: signup, OTP login, profile and bookings

use axum::extract::{Path, State};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::database::BookingFilter;
use crate::error::ApiError;
use crate::handlers::session::{self, LoginRequest, VerifyRequest};
use crate::middleware::{ApiResponse, ApiResult, UserSession};
use crate::models::{Booking, BookingEvent, Identity, Profile, Role};
use crate::services::{AuthService, BookingRequest, BookingService};
use crate::validation::{validate_not_blank, validate_phone, ValidatedJson};

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(custom = "validate_phone")]
    pub phone: String,

    #[validate(length(max = 500))]
    pub address: Option<String>,
}

/// POST /api/user/signup - create an unverified account and mail its first code
pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SignupRequest>,
) -> ApiResult<Identity> {
    let identity = Identity::new(
        &request.email,
        &request.name,
        &request.phone,
        Profile::User { address: request.address },
        Utc::now(),
    );

    let identity = AuthService::new(&state).register(identity).await?;
    Ok(ApiResponse::created("Account created, OTP sent to your email", identity))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<()> {
    session::send_login_code(&state, Role::User, request).await
}

pub async fn verify(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<VerifyRequest>,
) -> Result<(CookieJar, ApiResponse<Value>), ApiError> {
    session::verify_login_code(&state, Role::User, jar, request).await
}

pub async fn profile_get(session: UserSession) -> ApiResult<Identity> {
    Ok(ApiResponse::success("Profile", session.into_identity()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,

    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,

    #[validate(length(max = 500))]
    pub address: Option<String>,
}

pub async fn profile_put(
    State(state): State<AppState>,
    session: UserSession,
    ValidatedJson(update): ValidatedJson<ProfileUpdate>,
) -> ApiResult<Identity> {
    let mut identity = session.into_identity();

    if let Some(name) = update.name {
        identity.name = name.trim().to_string();
    }
    if let Some(phone) = update.phone {
        identity.phone = phone;
    }
    if let Some(address) = update.address {
        identity.profile = Profile::User { address: Some(address.trim().to_string()) };
    }
    identity.updated_at = Utc::now();

    let identity = state.store.update_identity(&identity).await?;
    Ok(ApiResponse::success("Profile updated", identity))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub category_id: Uuid,

    #[validate(range(min = 1, message = "must be greater than zero"))]
    pub amount: i64,

    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 100))]
    pub order_id: String,

    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 500))]
    pub address: String,

    pub scheduled_for: Option<DateTime<Utc>>,
}

/// POST /api/user/bookings - new pending booking against an order id
pub async fn bookings_create(
    State(state): State<AppState>,
    session: UserSession,
    ValidatedJson(request): ValidatedJson<CreateBookingRequest>,
) -> ApiResult<Booking> {
    let booking = BookingService::new(state.store.as_ref())
        .create(
            session.id,
            BookingRequest {
                category_id: request.category_id,
                amount: request.amount,
                order_id: request.order_id,
                address: request.address,
                scheduled_for: request.scheduled_for,
            },
        )
        .await?;
    Ok(ApiResponse::created("Booking created", booking))
}

pub async fn bookings_list(State(state): State<AppState>, session: UserSession) -> ApiResult<Vec<Booking>> {
    let bookings = state.store.list_bookings(BookingFilter::ForUser(session.id)).await?;
    Ok(ApiResponse::success("Bookings", bookings))
}

pub async fn bookings_show(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Booking> {
    let booking = BookingService::new(state.store.as_ref())
        .find_for_user(id, session.id)
        .await?;
    Ok(ApiResponse::success("Booking", booking))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentRequest {
    #[validate(custom = "validate_not_blank")]
    #[validate(length(max = 100))]
    pub payment_id: String,
}

/// POST /api/user/bookings/:id/payment - record the captured payment
pub async fn bookings_payment(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<PaymentRequest>,
) -> ApiResult<Booking> {
    let service = BookingService::new(state.store.as_ref());
    let booking = service.find_for_user(id, session.id).await?;
    let booking = service
        .apply(&booking, BookingEvent::CapturePayment { payment_id: request.payment_id.trim().to_string() })
        .await?;
    Ok(ApiResponse::success("Payment recorded", booking))
}

/// POST /api/user/bookings/:id/cancel - paid bookings get a refund request
pub async fn bookings_cancel(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Booking> {
    let service = BookingService::new(state.store.as_ref());
    let booking = service.find_for_user(id, session.id).await?;
    let booking = service.apply(&booking, BookingEvent::Cancel).await?;
    Ok(ApiResponse::success("Booking cancelled", booking))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: u8,

    #[validate(length(max = 1000))]
    pub feedback: Option<String>,
}

pub async fn bookings_review(
    State(state): State<AppState>,
    session: UserSession,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ReviewRequest>,
) -> ApiResult<Booking> {
    let service = BookingService::new(state.store.as_ref());
    let booking = service.find_for_user(id, session.id).await?;
    let booking = service
        .apply(
            &booking,
            BookingEvent::Rate {
                rating: request.rating,
                feedback: request.feedback.map(|f| f.trim().to_string()),
            },
        )
        .await?;
    Ok(ApiResponse::success("Thanks for your review", booking))
}
