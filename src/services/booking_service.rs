use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::database::{DatabaseError, Store};
use crate::error::ApiError;
use crate::models::{
    transition, Booking, BookingEvent, BookingStatus, Identity, InvalidTransition, NewBooking, Role, Schedule,
};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("booking not found")]
    NotFound,

    #[error("category not found")]
    CategoryNotFound,

    #[error("category is not accepting bookings")]
    CategoryInactive,

    #[error("amount must be between {min} and {max}")]
    PriceOutOfRange { min: i64, max: i64 },

    #[error("schedule not found")]
    ScheduleNotFound,

    #[error("employee not found")]
    EmployeeNotFound,

    #[error("employee is not active")]
    EmployeeInactive,

    #[error("employee does not work in this category")]
    WrongCategory,

    #[error("only paid bookings can be offered, this one is {0}")]
    NotOfferable(BookingStatus),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotFound
            | BookingError::CategoryNotFound
            | BookingError::ScheduleNotFound
            | BookingError::EmployeeNotFound => ApiError::not_found(capitalize(&err.to_string())),
            BookingError::PriceOutOfRange { .. } => {
                let mut fields = HashMap::new();
                fields.insert("amount".to_string(), err.to_string());
                ApiError::validation_error("Invalid request data", Some(fields))
            }
            BookingError::WrongCategory => ApiError::bad_request(capitalize(&err.to_string())),
            BookingError::CategoryInactive | BookingError::EmployeeInactive | BookingError::NotOfferable(_) => {
                ApiError::conflict(capitalize(&err.to_string()))
            }
            BookingError::Transition(e) => e.into(),
            BookingError::Database(e) => e.into(),
        }
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Booking input as received from a user
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub category_id: Uuid,
    pub amount: i64,
    pub order_id: String,
    pub address: String,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Booking lifecycle on top of the store. Every state change goes through
/// `models::transition` and is written with the version it was read at.
pub struct BookingService<'a> {
    store: &'a dyn Store,
}

impl<'a> BookingService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn create(&self, user_id: Uuid, request: BookingRequest) -> Result<Booking, BookingError> {
        let category = self
            .store
            .find_category(request.category_id)
            .await?
            .ok_or(BookingError::CategoryNotFound)?;

        if !category.is_active {
            return Err(BookingError::CategoryInactive);
        }
        if !category.accepts_price(request.amount) {
            return Err(BookingError::PriceOutOfRange {
                min: category.min_price,
                max: category.max_price,
            });
        }

        let booking = Booking::new(
            NewBooking {
                user_id,
                category_id: category.id,
                amount: request.amount,
                order_id: request.order_id.trim().to_string(),
                address: request.address.trim().to_string(),
                scheduled_for: request.scheduled_for,
            },
            Utc::now(),
        );

        let booking = self.store.create_booking(booking).await?;
        tracing::info!("User {} created booking {} for order {}", user_id, booking.id, booking.payment.order_id);
        Ok(booking)
    }

    pub async fn find(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        self.store.find_booking(booking_id).await?.ok_or(BookingError::NotFound)
    }

    /// A user's own booking. Someone else's booking reads as not found.
    pub async fn find_for_user(&self, booking_id: Uuid, user_id: Uuid) -> Result<Booking, BookingError> {
        let booking = self.find(booking_id).await?;
        if booking.user_id != user_id {
            return Err(BookingError::NotFound);
        }
        Ok(booking)
    }

    /// Apply an event and persist the result
    pub async fn apply(&self, booking: &Booking, event: BookingEvent) -> Result<Booking, BookingError> {
        let event_name = event.name();
        let next = transition(booking, event, Utc::now())?;
        let saved = self.store.save_booking(&next, booking.version).await?;

        tracing::info!(
            "Booking {}: {} -> {} ({})",
            saved.id,
            booking.status,
            saved.status,
            event_name
        );
        Ok(saved)
    }

    /// Offer a paid booking to an active employee
    pub async fn offer(&self, booking_id: Uuid, employee_id: Uuid) -> Result<Schedule, BookingError> {
        let booking = self.find(booking_id).await?;
        if booking.status != BookingStatus::Confirmed {
            return Err(BookingError::NotOfferable(booking.status));
        }

        let employee = self.active_employee(employee_id).await?;
        if let Some(category_id) = employee.employee_category() {
            if category_id != booking.category_id {
                return Err(BookingError::WrongCategory);
            }
        }

        let schedule = self
            .store
            .create_schedule(Schedule::offer(booking.id, employee.id, Utc::now()))
            .await?;
        tracing::info!("Offered booking {} to employee {}", booking.id, employee.id);
        Ok(schedule)
    }

    async fn active_employee(&self, employee_id: Uuid) -> Result<Identity, BookingError> {
        let employee = self
            .store
            .find_identity(employee_id)
            .await?
            .filter(|identity| identity.role == Role::Employee)
            .ok_or(BookingError::EmployeeNotFound)?;

        if !employee.is_active {
            return Err(BookingError::EmployeeInactive);
        }
        Ok(employee)
    }

    /// Accept an offer: the schedule and the booking assignment are written together.
    /// The employee must still be active when accepting.
    pub async fn accept(&self, schedule_id: Uuid, employee_id: Uuid) -> Result<(Schedule, Booking), BookingError> {
        self.active_employee(employee_id).await?;

        let schedule = self
            .store
            .find_schedule(schedule_id)
            .await?
            .filter(|schedule| schedule.employee_id == employee_id)
            .ok_or(BookingError::ScheduleNotFound)?;

        let booking = self.find(schedule.booking_id).await?;
        let next = transition(&booking, BookingEvent::Accept { employee_id }, Utc::now())?;

        let (schedule, saved) = self
            .store
            .accept_schedule(schedule.id, &next, booking.version)
            .await?;

        tracing::info!("Employee {} accepted booking {}", employee_id, saved.id);
        Ok((schedule, saved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::models::{Category, Profile};

    async fn setup() -> (MemoryStore, Category) {
        let store = MemoryStore::new();
        let category = store
            .create_category(Category::new("Cleaning", "Home cleaning", 100, 1000, Utc::now()))
            .await
            .unwrap();
        (store, category)
    }

    fn request(category_id: Uuid, amount: i64, order_id: &str) -> BookingRequest {
        BookingRequest {
            category_id,
            amount,
            order_id: order_id.to_string(),
            address: "7 Park Lane".to_string(),
            scheduled_for: None,
        }
    }

    #[tokio::test]
    async fn rejects_price_outside_band() {
        let (store, category) = setup().await;
        let service = BookingService::new(&store);
        let err = service
            .create(Uuid::new_v4(), request(category.id, 5000, "O9"))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::PriceOutOfRange { min: 100, max: 1000 }));
        assert!(store.list_bookings(crate::database::BookingFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_users_booking_is_not_found() {
        let (store, category) = setup().await;
        let service = BookingService::new(&store);
        let owner = Uuid::new_v4();
        let booking = service.create(owner, request(category.id, 500, "O1")).await.unwrap();

        assert!(service.find_for_user(booking.id, owner).await.is_ok());
        assert!(matches!(
            service.find_for_user(booking.id, Uuid::new_v4()).await,
            Err(BookingError::NotFound)
        ));
    }

    async fn seed_employee(store: &MemoryStore, email: &str, category: &Category) -> Identity {
        store
            .create_identity(Identity::new(
                email,
                "Pat",
                "9123456780",
                Profile::Employee { category_id: Some(category.id), recruited_by: None, bank: None },
                Utc::now(),
            ))
            .await
            .unwrap()
    }

    async fn paid_booking(service: &BookingService<'_>, category: &Category, order_id: &str) -> Booking {
        let booking = service.create(Uuid::new_v4(), request(category.id, 500, order_id)).await.unwrap();
        service
            .apply(&booking, BookingEvent::CapturePayment { payment_id: format!("pay_{}", order_id) })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn offer_and_accept() {
        let (store, category) = setup().await;
        let service = BookingService::new(&store);
        let employee = seed_employee(&store, "pat@example.com", &category).await;
        let other = seed_employee(&store, "lee@example.com", &category).await;

        let booking = service.create(Uuid::new_v4(), request(category.id, 500, "O1")).await.unwrap();
        assert!(matches!(
            service.offer(booking.id, employee.id).await,
            Err(BookingError::NotOfferable(BookingStatus::Pending))
        ));

        let booking = service
            .apply(&booking, BookingEvent::CapturePayment { payment_id: "pay_1".into() })
            .await
            .unwrap();
        let schedule = service.offer(booking.id, employee.id).await.unwrap();

        // another employee cannot accept someone else's offer
        assert!(matches!(
            service.accept(schedule.id, other.id).await,
            Err(BookingError::ScheduleNotFound)
        ));

        let (schedule, booking) = service.accept(schedule.id, employee.id).await.unwrap();
        assert!(schedule.accepted);
        assert_eq!(booking.status, BookingStatus::Assigned);
        assert_eq!(booking.employee_id, Some(employee.id));
    }

    #[tokio::test]
    async fn stale_copy_loses_the_race() {
        let (store, category) = setup().await;
        let service = BookingService::new(&store);
        let booking = service.create(Uuid::new_v4(), request(category.id, 500, "O1")).await.unwrap();

        service.apply(&booking, BookingEvent::Cancel).await.unwrap();
        let err = service
            .apply(&booking, BookingEvent::CapturePayment { payment_id: "late".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Database(DatabaseError::VersionConflict(_))));
    }

    #[tokio::test]
    async fn deactivated_employee_cannot_accept() {
        let (store, category) = setup().await;
        let service = BookingService::new(&store);
        let mut pat = seed_employee(&store, "pat@example.com", &category).await;
        let booking = paid_booking(&service, &category, "O1").await;
        let schedule = service.offer(booking.id, pat.id).await.unwrap();

        pat.is_active = false;
        store.update_identity(&pat).await.unwrap();

        assert!(matches!(
            service.accept(schedule.id, pat.id).await,
            Err(BookingError::EmployeeInactive)
        ));
        let booking = service.find(booking.id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(!store.find_schedule(schedule.id).await.unwrap().unwrap().accepted);
    }
}
