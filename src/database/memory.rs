use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{normalize_email, Booking, Career, Category, Identity, OtpChallenge, Role, Schedule};

use super::manager::DatabaseError;
use super::store::{BookingFilter, Store};

#[derive(Default)]
struct Tables {
    identities: HashMap<Uuid, Identity>,
    otps: HashMap<(Role, String), OtpChallenge>,
    categories: HashMap<Uuid, Category>,
    careers: HashMap<Uuid, Career>,
    bookings: HashMap<Uuid, Booking>,
    schedules: HashMap<Uuid, Schedule>,
}

/// In-process store. A single lock guards every table, so multi-record
/// operations are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn oldest_first<T, F>(mut rows: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<chrono::Utc>,
{
    rows.sort_by_key(|row| key(row));
    rows
}

const SUPERADMIN_TAKEN: &str = "a superadmin already exists";

fn check_version(current: &Booking, expected_version: i64) -> Result<(), DatabaseError> {
    if current.version != expected_version {
        return Err(DatabaseError::VersionConflict(current.id));
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_identity(&self, identity: Identity) -> Result<Identity, DatabaseError> {
        let mut tables = self.tables.write().await;
        let taken = tables
            .identities
            .values()
            .any(|existing| existing.role == identity.role && existing.email == identity.email);
        if taken {
            return Err(DatabaseError::Conflict(format!(
                "{} account already exists for {}",
                identity.role, identity.email
            )));
        }
        if identity.is_superadmin() && tables.identities.values().any(Identity::is_superadmin) {
            return Err(DatabaseError::Conflict(SUPERADMIN_TAKEN.to_string()));
        }
        tables.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, DatabaseError> {
        Ok(self.tables.read().await.identities.get(&id).cloned())
    }

    async fn find_identity_by_email(&self, role: Role, email: &str) -> Result<Option<Identity>, DatabaseError> {
        let email = normalize_email(email);
        let tables = self.tables.read().await;
        Ok(tables
            .identities
            .values()
            .find(|identity| identity.role == role && identity.email == email)
            .cloned())
    }

    async fn update_identity(&self, identity: &Identity) -> Result<Identity, DatabaseError> {
        let mut tables = self.tables.write().await;
        match tables.identities.get_mut(&identity.id) {
            Some(existing) => {
                *existing = identity.clone();
                Ok(identity.clone())
            }
            None => Err(DatabaseError::NotFound(format!("identity {}", identity.id))),
        }
    }

    async fn delete_identity(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.tables.write().await.identities.remove(&id).is_some())
    }

    async fn list_identities(&self, role: Role) -> Result<Vec<Identity>, DatabaseError> {
        let tables = self.tables.read().await;
        let rows = tables
            .identities
            .values()
            .filter(|identity| identity.role == role)
            .cloned()
            .collect();
        Ok(oldest_first(rows, |identity: &Identity| identity.created_at))
    }

    async fn count_identities(&self, role: Role) -> Result<i64, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.identities.values().filter(|identity| identity.role == role).count() as i64)
    }

    async fn find_otp(&self, role: Role, email: &str) -> Result<Option<OtpChallenge>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.otps.get(&(role, normalize_email(email))).cloned())
    }

    async fn save_otp(&self, challenge: &OtpChallenge) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let key = (challenge.role, challenge.email.clone());

        if let Some(stored) = tables.otps.get(&key) {
            if stored.code_hash == challenge.code_hash && stored.issued_at == challenge.issued_at {
                return Err(DatabaseError::Stale(format!("{} challenge for {}", challenge.role, challenge.email)));
            }
        }
        tables.otps.insert(key, challenge.clone());
        Ok(())
    }

    async fn swap_otp(&self, current: &OtpChallenge, next: &OtpChallenge) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let key = (current.role, current.email.clone());

        match tables.otps.get_mut(&key) {
            Some(stored) if stored == current => {
                *stored = next.clone();
                Ok(())
            }
            _ => Err(DatabaseError::Stale(format!("{} challenge for {}", current.role, current.email))),
        }
    }

    async fn create_category(&self, category: Category) -> Result<Category, DatabaseError> {
        let mut tables = self.tables.write().await;
        let taken = tables
            .categories
            .values()
            .any(|existing| existing.name.eq_ignore_ascii_case(&category.name));
        if taken {
            return Err(DatabaseError::Conflict(format!("category '{}' already exists", category.name)));
        }
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, DatabaseError> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self, include_inactive: bool) -> Result<Vec<Category>, DatabaseError> {
        let tables = self.tables.read().await;
        let rows = tables
            .categories
            .values()
            .filter(|category| include_inactive || category.is_active)
            .cloned()
            .collect();
        Ok(oldest_first(rows, |category: &Category| category.created_at))
    }

    async fn update_category(&self, category: &Category) -> Result<Category, DatabaseError> {
        let mut tables = self.tables.write().await;
        match tables.categories.get_mut(&category.id) {
            Some(existing) => {
                *existing = category.clone();
                Ok(category.clone())
            }
            None => Err(DatabaseError::NotFound(format!("category {}", category.id))),
        }
    }

    async fn create_career(&self, career: Career) -> Result<Career, DatabaseError> {
        self.tables.write().await.careers.insert(career.id, career.clone());
        Ok(career)
    }

    async fn find_career(&self, id: Uuid) -> Result<Option<Career>, DatabaseError> {
        Ok(self.tables.read().await.careers.get(&id).cloned())
    }

    async fn list_careers(&self, include_closed: bool) -> Result<Vec<Career>, DatabaseError> {
        let tables = self.tables.read().await;
        let rows = tables
            .careers
            .values()
            .filter(|career| include_closed || career.is_active)
            .cloned()
            .collect();
        Ok(oldest_first(rows, |career: &Career| career.created_at))
    }

    async fn update_career(&self, career: &Career) -> Result<Career, DatabaseError> {
        let mut tables = self.tables.write().await;
        match tables.careers.get_mut(&career.id) {
            Some(existing) => {
                *existing = career.clone();
                Ok(career.clone())
            }
            None => Err(DatabaseError::NotFound(format!("career {}", career.id))),
        }
    }

    async fn create_booking(&self, booking: Booking) -> Result<Booking, DatabaseError> {
        let mut tables = self.tables.write().await;
        let taken = tables
            .bookings
            .values()
            .any(|existing| existing.payment.order_id == booking.payment.order_id);
        if taken {
            return Err(DatabaseError::Conflict(format!(
                "order {} already has a booking",
                booking.payment.order_id
            )));
        }
        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, DatabaseError> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn find_booking_by_order(&self, order_id: &str) -> Result<Option<Booking>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .find(|booking| booking.payment.order_id == order_id)
            .cloned())
    }

    async fn list_bookings(&self, filter: BookingFilter) -> Result<Vec<Booking>, DatabaseError> {
        let tables = self.tables.read().await;
        let rows = tables
            .bookings
            .values()
            .filter(|booking| filter.matches(booking))
            .cloned()
            .collect();
        Ok(oldest_first(rows, |booking: &Booking| booking.created_at))
    }

    async fn save_booking(&self, booking: &Booking, expected_version: i64) -> Result<Booking, DatabaseError> {
        let mut tables = self.tables.write().await;
        let current = tables
            .bookings
            .get_mut(&booking.id)
            .ok_or_else(|| DatabaseError::NotFound(format!("booking {}", booking.id)))?;
        check_version(current, expected_version)?;

        let mut saved = booking.clone();
        saved.version = expected_version + 1;
        *current = saved.clone();
        Ok(saved)
    }

    async fn create_schedule(&self, schedule: Schedule) -> Result<Schedule, DatabaseError> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.schedules.values().any(|existing| {
            existing.booking_id == schedule.booking_id && existing.employee_id == schedule.employee_id
        });
        if duplicate {
            return Err(DatabaseError::Conflict("booking already offered to this employee".to_string()));
        }
        tables.schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn find_schedule(&self, id: Uuid) -> Result<Option<Schedule>, DatabaseError> {
        Ok(self.tables.read().await.schedules.get(&id).cloned())
    }

    async fn list_schedules_for_employee(&self, employee_id: Uuid) -> Result<Vec<Schedule>, DatabaseError> {
        let tables = self.tables.read().await;
        let rows = tables
            .schedules
            .values()
            .filter(|schedule| schedule.employee_id == employee_id)
            .cloned()
            .collect();
        Ok(oldest_first(rows, |schedule: &Schedule| schedule.created_at))
    }

    async fn accept_schedule(
        &self,
        schedule_id: Uuid,
        booking: &Booking,
        expected_version: i64,
    ) -> Result<(Schedule, Booking), DatabaseError> {
        let mut tables = self.tables.write().await;

        // Validate both records before touching either
        let schedule = tables
            .schedules
            .get(&schedule_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("schedule {}", schedule_id)))?;
        if schedule.accepted {
            return Err(DatabaseError::Conflict("schedule already accepted".to_string()));
        }
        let current = tables
            .bookings
            .get(&booking.id)
            .ok_or_else(|| DatabaseError::NotFound(format!("booking {}", booking.id)))?;
        check_version(current, expected_version)?;

        let mut saved_booking = booking.clone();
        saved_booking.version = expected_version + 1;
        tables.bookings.insert(saved_booking.id, saved_booking.clone());

        let schedule = tables
            .schedules
            .get_mut(&schedule_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("schedule {}", schedule_id)))?;
        schedule.accepted = true;

        Ok((schedule.clone(), saved_booking))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{transition, BookingEvent, NewBooking, Profile};
    use chrono::{Duration, Utc};

    fn booking(order_id: &str) -> Booking {
        Booking::new(
            NewBooking {
                user_id: Uuid::new_v4(),
                category_id: Uuid::new_v4(),
                amount: 500,
                order_id: order_id.to_string(),
                address: "4 Hill Street".to_string(),
                scheduled_for: None,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn email_is_unique_per_role() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let user = Identity::new("sam@example.com", "Sam", "9876543210", Profile::User { address: None }, now);
        store.create_identity(user).await.unwrap();

        let again = Identity::new("SAM@example.com", "Sam", "9876543210", Profile::User { address: None }, now);
        assert!(matches!(store.create_identity(again).await, Err(DatabaseError::Conflict(_))));

        let admin = Identity::new("sam@example.com", "Sam", "9876543210", Profile::Admin { superadmin: false }, now);
        assert!(store.create_identity(admin).await.is_ok());
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = MemoryStore::new();
        let created = store.create_booking(booking("O1")).await.unwrap();

        let cancelled = transition(&created, BookingEvent::Cancel, Utc::now()).unwrap();
        let saved = store.save_booking(&cancelled, created.version).await.unwrap();
        assert_eq!(saved.version, created.version + 1);

        // a second writer still holding the original copy loses
        let paid = transition(
            &created,
            BookingEvent::CapturePayment { payment_id: "p1".into() },
            Utc::now(),
        )
        .unwrap();
        let err = store.save_booking(&paid, created.version).await.unwrap_err();
        assert!(matches!(err, DatabaseError::VersionConflict(id) if id == created.id));
    }

    #[tokio::test]
    async fn order_ids_are_unique() {
        let store = MemoryStore::new();
        store.create_booking(booking("O1")).await.unwrap();
        assert!(matches!(store.create_booking(booking("O1")).await, Err(DatabaseError::Conflict(_))));
    }

    #[tokio::test]
    async fn accept_schedule_is_all_or_nothing() {
        let store = MemoryStore::new();
        let created = store.create_booking(booking("O2")).await.unwrap();
        let employee = Uuid::new_v4();
        let schedule = store
            .create_schedule(Schedule::offer(created.id, employee, Utc::now()))
            .await
            .unwrap();

        let paid = transition(&created, BookingEvent::CapturePayment { payment_id: "p".into() }, Utc::now()).unwrap();
        let paid = store.save_booking(&paid, created.version).await.unwrap();
        let assigned = transition(&paid, BookingEvent::Accept { employee_id: employee }, Utc::now()).unwrap();

        // wrong version: schedule must stay unaccepted
        assert!(store.accept_schedule(schedule.id, &assigned, created.version).await.is_err());
        assert!(!store.find_schedule(schedule.id).await.unwrap().unwrap().accepted);

        let (schedule, booking) = store.accept_schedule(schedule.id, &assigned, paid.version).await.unwrap();
        assert!(schedule.accepted);
        assert_eq!(booking.employee_id, Some(employee));
    }

    fn challenge(code_hash: &str) -> OtpChallenge {
        let now = Utc::now();
        OtpChallenge {
            email: "sam@example.com".into(),
            role: Role::User,
            code_hash: code_hash.into(),
            issued_at: now,
            expires_at: now + Duration::minutes(10),
            attempts: 0,
            consumed: false,
        }
    }

    #[tokio::test]
    async fn only_one_superadmin() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let root = Identity::new("root@example.com", "Root", "9876543210", Profile::Admin { superadmin: true }, now);
        store.create_identity(root).await.unwrap();

        let rival = Identity::new("rival@example.com", "Rival", "9876543210", Profile::Admin { superadmin: true }, now);
        assert!(matches!(store.create_identity(rival).await, Err(DatabaseError::Conflict(_))));

        let helper = Identity::new("help@example.com", "Help", "9876543210", Profile::Admin { superadmin: false }, now);
        assert!(store.create_identity(helper).await.is_ok());
        assert_eq!(store.count_identities(Role::Admin).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn swap_otp_needs_the_stored_copy() {
        let store = MemoryStore::new();
        let issued = challenge("aa");
        store.save_otp(&issued).await.unwrap();

        let mut consumed = issued.clone();
        consumed.attempts = 1;
        consumed.consumed = true;
        store.swap_otp(&issued, &consumed).await.unwrap();

        // a writer still holding the unconsumed copy cannot reopen it
        let mut reopened = issued.clone();
        reopened.attempts = 1;
        let err = store.swap_otp(&issued, &reopened).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Stale(_)));
        assert!(matches!(store.save_otp(&reopened).await, Err(DatabaseError::Stale(_))));

        let stored = store.find_otp(Role::User, "sam@example.com").await.unwrap().unwrap();
        assert!(stored.consumed);
    }

    #[tokio::test]
    async fn fresh_challenge_replaces_the_old_one() {
        let store = MemoryStore::new();
        store.save_otp(&challenge("aa")).await.unwrap();
        store.save_otp(&challenge("bb")).await.unwrap();

        let stored = store.find_otp(Role::User, "sam@example.com").await.unwrap().unwrap();
        assert_eq!(stored.code_hash, "bb");
        assert!(!stored.consumed);
    }
}
