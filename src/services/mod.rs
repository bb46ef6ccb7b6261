pub mod auth_service;
pub mod booking_service;

pub use auth_service::{AuthError, AuthService};
pub use booking_service::{BookingError, BookingRequest, BookingService};
