use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Assigned,
    Started,
    Completed,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Assigned => "assigned",
            BookingStatus::Started => "started",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Refunded => "refunded",
        }
    }

    /// Completed, cancelled and refunded bookings take no further work
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Refunded
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "assigned" => Ok(BookingStatus::Assigned),
            // older clients send "in-progress" for the same state
            "started" | "in-progress" => Ok(BookingStatus::Started),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "refunded" => Ok(BookingStatus::Refunded),
            other => Err(format!("unknown booking status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Captured,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Captured => "captured",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(PaymentStatus::Created),
            "captured" => Ok(PaymentStatus::Captured),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Requested,
    Processed,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Requested => "requested",
            RefundStatus::Processed => "processed",
        }
    }
}

impl FromStr for RefundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested" => Ok(RefundStatus::Requested),
            "processed" => Ok(RefundStatus::Processed),
            other => Err(format!("unknown refund status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    // Wire name predates this service and existing clients read it as-is.
    #[serde(rename = "intialamount")]
    pub initial_amount: i64,
    pub order_id: String,
    pub payment_id: Option<String>,
    #[serde(rename = "payment_status")]
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub amount: i64,
    pub refund_id: Option<String>,
    pub status: RefundStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub employee_id: Option<Uuid>,
    pub status: BookingStatus,
    pub address: String,
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub payment: Payment,
    pub refund: Option<Refund>,
    pub rating: Option<u8>,
    pub feedback: Option<String>,
    pub is_paid: bool,
    pub is_done: bool,
    pub is_active: bool,
    /// Bumped by the store on every successful write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new booking, already validated against its category
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub category_id: Uuid,
    pub amount: i64,
    pub order_id: String,
    pub address: String,
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn new(input: NewBooking, now: DateTime<Utc>) -> Self {
        let mut booking = Self {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            category_id: input.category_id,
            employee_id: None,
            status: BookingStatus::Pending,
            address: input.address,
            scheduled_for: input.scheduled_for,
            payment: Payment {
                initial_amount: input.amount,
                order_id: input.order_id,
                payment_id: None,
                status: PaymentStatus::Created,
            },
            refund: None,
            rating: None,
            feedback: None,
            is_paid: false,
            is_done: false,
            is_active: true,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        booking.sync_flags();
        booking
    }

    fn sync_flags(&mut self) {
        self.is_paid = self.payment.status == PaymentStatus::Captured;
        self.is_done = self.status == BookingStatus::Completed;
        self.is_active = !self.status.is_terminal();
    }
}

/// Everything that can happen to a booking after it is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingEvent {
    CapturePayment { payment_id: String },
    Accept { employee_id: Uuid },
    Start { employee_id: Uuid },
    Complete { employee_id: Uuid },
    Cancel,
    Refund { amount: i64, refund_id: String },
    Rate { rating: u8, feedback: Option<String> },
}

impl BookingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BookingEvent::CapturePayment { .. } => "capture payment for",
            BookingEvent::Accept { .. } => "accept",
            BookingEvent::Start { .. } => "start",
            BookingEvent::Complete { .. } => "complete",
            BookingEvent::Cancel => "cancel",
            BookingEvent::Refund { .. } => "refund",
            BookingEvent::Rate { .. } => "rate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTransition {
    #[error("cannot {event} a booking that is {from}")]
    NotAllowed { from: BookingStatus, event: &'static str },

    #[error("booking is assigned to another employee")]
    NotAssignee,

    #[error("booking has already been rated")]
    AlreadyRated,

    #[error("rating must be between 1 and 5")]
    InvalidRating,

    #[error("no refund is due for this booking")]
    NoRefundDue,

    #[error("refund amount must be between 1 and {max}")]
    RefundAmount { max: i64 },
}

/// Apply `event` to `booking`, returning the next state.
///
/// This is the only place booking status, payment, refund and rating fields
/// change. The input is never modified, so a rejected event leaves the caller's
/// copy exactly as it was. `is_paid`, `is_done` and `is_active` are recomputed
/// from the resulting status on every accepted event.
pub fn transition(
    booking: &Booking,
    event: BookingEvent,
    now: DateTime<Utc>,
) -> Result<Booking, InvalidTransition> {
    use BookingStatus::*;

    let mut next = booking.clone();

    match (booking.status, event) {
        (Pending, BookingEvent::CapturePayment { payment_id }) => {
            next.payment.payment_id = Some(payment_id);
            next.payment.status = PaymentStatus::Captured;
            next.status = Confirmed;
        }
        (Confirmed, BookingEvent::Accept { employee_id }) => {
            next.employee_id = Some(employee_id);
            next.status = Assigned;
        }
        (Assigned, BookingEvent::Start { employee_id }) => {
            ensure_assignee(booking, employee_id)?;
            next.status = Started;
        }
        (Started, BookingEvent::Complete { employee_id }) => {
            ensure_assignee(booking, employee_id)?;
            next.status = Completed;
        }
        (Pending | Confirmed | Assigned, BookingEvent::Cancel) => {
            if booking.payment.status == PaymentStatus::Captured {
                next.refund = Some(Refund {
                    amount: booking.payment.initial_amount,
                    refund_id: None,
                    status: RefundStatus::Requested,
                });
            }
            next.status = Cancelled;
        }
        (Cancelled, BookingEvent::Refund { amount, refund_id }) => {
            let requested = booking
                .refund
                .as_ref()
                .filter(|refund| refund.status == RefundStatus::Requested)
                .ok_or(InvalidTransition::NoRefundDue)?;

            if amount <= 0 || amount > requested.amount {
                return Err(InvalidTransition::RefundAmount { max: requested.amount });
            }

            next.refund = Some(Refund {
                amount,
                refund_id: Some(refund_id),
                status: RefundStatus::Processed,
            });
            next.status = Refunded;
        }
        (Completed, BookingEvent::Rate { rating, feedback }) => {
            if booking.rating.is_some() {
                return Err(InvalidTransition::AlreadyRated);
            }
            if !(1..=5).contains(&rating) {
                return Err(InvalidTransition::InvalidRating);
            }
            next.rating = Some(rating);
            next.feedback = feedback;
        }
        (from, event) => {
            return Err(InvalidTransition::NotAllowed { from, event: event.name() });
        }
    }

    next.sync_flags();
    next.updated_at = now;
    Ok(next)
}

fn ensure_assignee(booking: &Booking, employee_id: Uuid) -> Result<(), InvalidTransition> {
    match booking.employee_id {
        Some(assigned) if assigned == employee_id => Ok(()),
        _ => Err(InvalidTransition::NotAssignee),
    }
}
