use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::Role;

/// Stored login challenge. Only the digest of the code is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub email: String,
    pub role: Role,
    pub code_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    pub consumed: bool,
}
