use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Booking, Career, Category, Identity, OtpChallenge, Role, Schedule};

use super::manager::DatabaseError;

/// Which bookings to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingFilter {
    All,
    ForUser(Uuid),
    ForEmployee(Uuid),
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        match self {
            BookingFilter::All => true,
            BookingFilter::ForUser(id) => booking.user_id == *id,
            BookingFilter::ForEmployee(id) => booking.employee_id == Some(*id),
        }
    }
}

/// Persistence for every entity the service owns.
///
/// Lists are returned oldest first. Bookings are written with an expected
/// version; a mismatch yields `DatabaseError::VersionConflict` and nothing is
/// written.
#[async_trait]
pub trait Store: Send + Sync {
    // Identities
    async fn create_identity(&self, identity: Identity) -> Result<Identity, DatabaseError>;
    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, DatabaseError>;
    async fn find_identity_by_email(&self, role: Role, email: &str) -> Result<Option<Identity>, DatabaseError>;
    async fn update_identity(&self, identity: &Identity) -> Result<Identity, DatabaseError>;
    async fn delete_identity(&self, id: Uuid) -> Result<bool, DatabaseError>;
    async fn list_identities(&self, role: Role) -> Result<Vec<Identity>, DatabaseError>;
    async fn count_identities(&self, role: Role) -> Result<i64, DatabaseError>;

    // Login challenges
    async fn find_otp(&self, role: Role, email: &str) -> Result<Option<OtpChallenge>, DatabaseError>;

    /// Install a freshly issued challenge, replacing any previous one.
    /// Writing back a challenge that is already stored yields `Stale`.
    async fn save_otp(&self, challenge: &OtpChallenge) -> Result<(), DatabaseError>;

    /// Replace `current` with `next` only if the stored challenge still equals
    /// `current`. Otherwise nothing is written and `Stale` is returned.
    async fn swap_otp(&self, current: &OtpChallenge, next: &OtpChallenge) -> Result<(), DatabaseError>;

    // Catalog
    async fn create_category(&self, category: Category) -> Result<Category, DatabaseError>;
    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, DatabaseError>;
    async fn list_categories(&self, include_inactive: bool) -> Result<Vec<Category>, DatabaseError>;
    async fn update_category(&self, category: &Category) -> Result<Category, DatabaseError>;

    async fn create_career(&self, career: Career) -> Result<Career, DatabaseError>;
    async fn find_career(&self, id: Uuid) -> Result<Option<Career>, DatabaseError>;
    async fn list_careers(&self, include_closed: bool) -> Result<Vec<Career>, DatabaseError>;
    async fn update_career(&self, career: &Career) -> Result<Career, DatabaseError>;

    // Bookings
    async fn create_booking(&self, booking: Booking) -> Result<Booking, DatabaseError>;
    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, DatabaseError>;
    async fn find_booking_by_order(&self, order_id: &str) -> Result<Option<Booking>, DatabaseError>;
    async fn list_bookings(&self, filter: BookingFilter) -> Result<Vec<Booking>, DatabaseError>;
    async fn save_booking(&self, booking: &Booking, expected_version: i64) -> Result<Booking, DatabaseError>;

    // Schedules
    async fn create_schedule(&self, schedule: Schedule) -> Result<Schedule, DatabaseError>;
    async fn find_schedule(&self, id: Uuid) -> Result<Option<Schedule>, DatabaseError>;
    async fn list_schedules_for_employee(&self, employee_id: Uuid) -> Result<Vec<Schedule>, DatabaseError>;

    /// Mark the schedule accepted and save the booking in one atomic step
    async fn accept_schedule(
        &self,
        schedule_id: Uuid,
        booking: &Booking,
        expected_version: i64,
    ) -> Result<(Schedule, Booking), DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
    async fn close(&self);
}
