use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller role. Carried explicitly on every identity and in every session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "employee")]
    Employee,
    #[serde(rename = "field-exec")]
    FieldExec,
    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Employee => "employee",
            Role::FieldExec => "field-exec",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "employee" => Ok(Role::Employee),
            "field-exec" => Ok(Role::FieldExec),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub account_holder: String,
    pub account_number: String,
    pub ifsc: String,
}

/// Role-specific fields. The variant always matches the owning identity's role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Profile {
    User {
        address: Option<String>,
    },
    Employee {
        category_id: Option<Uuid>,
        recruited_by: Option<Uuid>,
        bank: Option<BankDetails>,
    },
    FieldExec {
        pincode: String,
        block: String,
    },
    Admin {
        superadmin: bool,
    },
}

impl Profile {
    pub fn role(&self) -> Role {
        match self {
            Profile::User { .. } => Role::User,
            Profile::Employee { .. } => Role::Employee,
            Profile::FieldExec { .. } => Role::FieldExec,
            Profile::Admin { .. } => Role::Admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub role: Role,
    pub is_verified: bool,
    pub is_active: bool,
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Build a fresh, unverified identity. The role comes from the profile variant.
    pub fn new(email: &str, name: &str, phone: &str, profile: Profile, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            name: name.trim().to_string(),
            phone: phone.trim().to_string(),
            role: profile.role(),
            is_verified: false,
            is_active: true,
            profile,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_superadmin(&self) -> bool {
        matches!(self.profile, Profile::Admin { superadmin: true })
    }

    /// Employees recruited in the field start inactive until an admin approves them
    pub fn can_log_in(&self) -> bool {
        self.is_active
    }

    pub fn employee_category(&self) -> Option<Uuid> {
        match &self.profile {
            Profile::Employee { category_id, .. } => *category_id,
            _ => None,
        }
    }

    pub fn recruited_by(&self) -> Option<Uuid> {
        match &self.profile {
            Profile::Employee { recruited_by, .. } => *recruited_by,
            _ => None,
        }
    }
}

/// Emails are compared case-insensitively everywhere
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_names() {
        assert_eq!(serde_json::to_value(Role::FieldExec).unwrap(), "field-exec");
        assert_eq!("field-exec".parse::<Role>().unwrap(), Role::FieldExec);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn role_follows_profile() {
        let now = Utc::now();
        let identity = Identity::new(
            " Ravi@Example.com ",
            "Ravi",
            "9876543210",
            Profile::FieldExec { pincode: "560001".into(), block: "North".into() },
            now,
        );
        assert_eq!(identity.role, Role::FieldExec);
        assert_eq!(identity.email, "ravi@example.com");
        assert!(!identity.is_verified);
    }

    #[test]
    fn superadmin_flag() {
        let now = Utc::now();
        let admin = Identity::new("a@example.com", "Asha", "9876543210", Profile::Admin { superadmin: true }, now);
        let user = Identity::new("u@example.com", "Uma", "9876543210", Profile::User { address: None }, now);
        assert!(admin.is_superadmin());
        assert!(!user.is_superadmin());
    }
}
