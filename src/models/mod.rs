pub mod booking;
pub mod catalog;
pub mod identity;
pub mod otp;
pub mod schedule;

pub use booking::{
    transition, Booking, BookingEvent, BookingStatus, InvalidTransition, NewBooking, Payment,
    PaymentStatus, Refund, RefundStatus,
};
pub use catalog::{Career, Category};
pub use identity::{normalize_email, BankDetails, Identity, Profile, Role};
pub use otp::OtpChallenge;
pub use schedule::Schedule;
