use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An offer of a booking to a candidate employee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub employee_id: Uuid,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    pub fn offer(booking_id: Uuid, employee_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            employee_id,
            accepted: false,
            created_at: now,
        }
    }
}
