use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bookable service type with its allowed price band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub min_price: i64,
    pub max_price: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn new(name: &str, description: &str, min_price: i64, max_price: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            min_price,
            max_price,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn accepts_price(&self, amount: i64) -> bool {
        (self.min_price..=self.max_price).contains(&amount)
    }
}

/// Public job posting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Career {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Career {
    pub fn new(title: &str, description: &str, location: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.trim().to_string(),
            description: description.trim().to_string(),
            location: location.trim().to_string(),
            is_active: true,
            created_at: now,
        }
    }
}
