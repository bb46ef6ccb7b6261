use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{
    normalize_email, Booking, BookingStatus, Career, Category, Identity, OtpChallenge, Payment,
    PaymentStatus, Profile, Refund, RefundStatus, Role, Schedule,
};

use super::manager::DatabaseError;
use super::store::{BookingFilter, Store};

const IDENTITY_COLUMNS: &str =
    "id, email, name, phone, role, is_verified, is_active, profile, created_at, updated_at";

const BOOKING_COLUMNS: &str = "id, user_id, category_id, employee_id, status, address, scheduled_for, \
     initial_amount, order_id, payment_id, payment_status, refund_amount, refund_id, refund_status, \
     rating, feedback, is_paid, is_done, is_active, version, created_at, updated_at";

/// Postgres-backed store. Rows are mapped through private row structs so the
/// domain types stay free of sqlx derives.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }
}

fn corrupt(what: &str, detail: String) -> DatabaseError {
    DatabaseError::Corrupt(format!("{}: {}", what, detail))
}

fn otp_attempts(attempts: u32) -> i32 {
    i32::try_from(attempts).unwrap_or(i32::MAX)
}

fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.constraint() == Some(constraint))
}

/// Unique violations become `Conflict`; everything else passes through
fn map_unique(err: sqlx::Error, message: impl Into<String>) -> DatabaseError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => DatabaseError::Conflict(message.into()),
        _ => DatabaseError::Sqlx(err),
    }
}

#[derive(FromRow)]
struct IdentityRow {
    id: Uuid,
    email: String,
    name: String,
    phone: String,
    role: String,
    is_verified: bool,
    is_active: bool,
    profile: Json<Profile>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IdentityRow> for Identity {
    type Error = DatabaseError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        let role: Role = row.role.parse().map_err(|e| corrupt("identity", e))?;
        let profile = row.profile.0;
        if profile.role() != role {
            return Err(corrupt("identity", format!("{} has a {} profile", row.id, profile.role())));
        }

        Ok(Identity {
            id: row.id,
            email: row.email,
            name: row.name,
            phone: row.phone,
            role,
            is_verified: row.is_verified,
            is_active: row.is_active,
            profile,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct OtpRow {
    email: String,
    role: String,
    code_hash: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    attempts: i32,
    consumed: bool,
}

impl TryFrom<OtpRow> for OtpChallenge {
    type Error = DatabaseError;

    fn try_from(row: OtpRow) -> Result<Self, Self::Error> {
        Ok(OtpChallenge {
            email: row.email,
            role: row.role.parse().map_err(|e| corrupt("otp challenge", e))?,
            code_hash: row.code_hash,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            attempts: u32::try_from(row.attempts).map_err(|e| corrupt("otp challenge", e.to_string()))?,
            consumed: row.consumed,
        })
    }
}

#[derive(FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    description: String,
    min_price: i64,
    max_price: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            description: row.description,
            min_price: row.min_price,
            max_price: row.max_price,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CareerRow {
    id: Uuid,
    title: String,
    description: String,
    location: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<CareerRow> for Career {
    fn from(row: CareerRow) -> Self {
        Career {
            id: row.id,
            title: row.title,
            description: row.description,
            location: row.location,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    category_id: Uuid,
    employee_id: Option<Uuid>,
    status: String,
    address: String,
    scheduled_for: Option<DateTime<Utc>>,
    initial_amount: i64,
    order_id: String,
    payment_id: Option<String>,
    payment_status: String,
    refund_amount: Option<i64>,
    refund_id: Option<String>,
    refund_status: Option<String>,
    rating: Option<i16>,
    feedback: Option<String>,
    is_paid: bool,
    is_done: bool,
    is_active: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = DatabaseError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status: BookingStatus = row.status.parse().map_err(|e| corrupt("booking", e))?;
        let payment_status: PaymentStatus = row.payment_status.parse().map_err(|e| corrupt("booking", e))?;

        let refund = match (row.refund_amount, row.refund_status) {
            (Some(amount), Some(status)) => Some(Refund {
                amount,
                refund_id: row.refund_id,
                status: status.parse::<RefundStatus>().map_err(|e| corrupt("booking", e))?,
            }),
            (None, None) => None,
            _ => return Err(corrupt("booking", format!("{} has a partial refund record", row.id))),
        };

        let rating = row
            .rating
            .map(u8::try_from)
            .transpose()
            .map_err(|e| corrupt("booking", e.to_string()))?;

        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            category_id: row.category_id,
            employee_id: row.employee_id,
            status,
            address: row.address,
            scheduled_for: row.scheduled_for,
            payment: Payment {
                initial_amount: row.initial_amount,
                order_id: row.order_id,
                payment_id: row.payment_id,
                status: payment_status,
            },
            refund,
            rating,
            feedback: row.feedback,
            is_paid: row.is_paid,
            is_done: row.is_done,
            is_active: row.is_active,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ScheduleRow {
    id: Uuid,
    booking_id: Uuid,
    employee_id: Uuid,
    accepted: bool,
    created_at: DateTime<Utc>,
}

impl From<ScheduleRow> for Schedule {
    fn from(row: ScheduleRow) -> Self {
        Schedule {
            id: row.id,
            booking_id: row.booking_id,
            employee_id: row.employee_id,
            accepted: row.accepted,
            created_at: row.created_at,
        }
    }
}

fn identities(rows: Vec<IdentityRow>) -> Result<Vec<Identity>, DatabaseError> {
    rows.into_iter().map(Identity::try_from).collect()
}

fn bookings(rows: Vec<BookingRow>) -> Result<Vec<Booking>, DatabaseError> {
    rows.into_iter().map(Booking::try_from).collect()
}

/// Conditional booking write shared by `save_booking` and `accept_schedule`.
/// Returns `None` when no row matched the id and expected version.
async fn update_booking<'e, E>(
    executor: E,
    booking: &Booking,
    expected_version: i64,
) -> Result<Option<Booking>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let refund = booking.refund.as_ref();
    let sql = format!(
        "UPDATE bookings SET employee_id = $3, status = $4, address = $5, scheduled_for = $6, \
         payment_id = $7, payment_status = $8, refund_amount = $9, refund_id = $10, refund_status = $11, \
         rating = $12, feedback = $13, is_paid = $14, is_done = $15, is_active = $16, updated_at = $17, \
         version = version + 1 \
         WHERE id = $1 AND version = $2 RETURNING {}",
        BOOKING_COLUMNS
    );

    let row = sqlx::query_as::<_, BookingRow>(&sql)
        .bind(booking.id)
        .bind(expected_version)
        .bind(booking.employee_id)
        .bind(booking.status.as_str())
        .bind(&booking.address)
        .bind(booking.scheduled_for)
        .bind(&booking.payment.payment_id)
        .bind(booking.payment.status.as_str())
        .bind(refund.map(|r| r.amount))
        .bind(refund.and_then(|r| r.refund_id.clone()))
        .bind(refund.map(|r| r.status.as_str()))
        .bind(booking.rating.map(i16::from))
        .bind(&booking.feedback)
        .bind(booking.is_paid)
        .bind(booking.is_done)
        .bind(booking.is_active)
        .bind(booking.updated_at)
        .fetch_optional(executor)
        .await?;

    row.map(Booking::try_from).transpose()
}

impl PgStore {
    /// Tell a stale version apart from a missing booking
    async fn missed_booking_write(&self, id: Uuid) -> DatabaseError {
        match sqlx::query_scalar::<_, i64>("SELECT version FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(Some(_)) => DatabaseError::VersionConflict(id),
            Ok(None) => DatabaseError::NotFound(format!("booking {}", id)),
            Err(e) => DatabaseError::Sqlx(e),
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_identity(&self, identity: Identity) -> Result<Identity, DatabaseError> {
        let sql = format!(
            "INSERT INTO identities ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {cols}",
            cols = IDENTITY_COLUMNS
        );
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(identity.id)
            .bind(&identity.email)
            .bind(&identity.name)
            .bind(&identity.phone)
            .bind(identity.role.as_str())
            .bind(identity.is_verified)
            .bind(identity.is_active)
            .bind(Json(&identity.profile))
            .bind(identity.created_at)
            .bind(identity.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                let message = if violates(&e, "identities_one_superadmin_idx") {
                    "a superadmin already exists".to_string()
                } else {
                    format!("{} account already exists for {}", identity.role, identity.email)
                };
                map_unique(e, message)
            })?;
        row.try_into()
    }

    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, DatabaseError> {
        let sql = format!("SELECT {} FROM identities WHERE id = $1", IDENTITY_COLUMNS);
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Identity::try_from).transpose()
    }

    async fn find_identity_by_email(&self, role: Role, email: &str) -> Result<Option<Identity>, DatabaseError> {
        let sql = format!("SELECT {} FROM identities WHERE role = $1 AND email = $2", IDENTITY_COLUMNS);
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(role.as_str())
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        row.map(Identity::try_from).transpose()
    }

    async fn update_identity(&self, identity: &Identity) -> Result<Identity, DatabaseError> {
        let sql = format!(
            "UPDATE identities SET name = $2, phone = $3, is_verified = $4, is_active = $5, profile = $6, \
             updated_at = $7 WHERE id = $1 RETURNING {}",
            IDENTITY_COLUMNS
        );
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(identity.id)
            .bind(&identity.name)
            .bind(&identity.phone)
            .bind(identity.is_verified)
            .bind(identity.is_active)
            .bind(Json(&identity.profile))
            .bind(identity.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("identity {}", identity.id)))?;
        row.try_into()
    }

    async fn delete_identity(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_identities(&self, role: Role) -> Result<Vec<Identity>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM identities WHERE role = $1 ORDER BY created_at",
            IDENTITY_COLUMNS
        );
        let rows = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await?;
        identities(rows)
    }

    async fn count_identities(&self, role: Role) -> Result<i64, DatabaseError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM identities WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn find_otp(&self, role: Role, email: &str) -> Result<Option<OtpChallenge>, DatabaseError> {
        let row = sqlx::query_as::<_, OtpRow>(
            "SELECT email, role, code_hash, issued_at, expires_at, attempts, consumed \
             FROM otp_challenges WHERE role = $1 AND email = $2",
        )
        .bind(role.as_str())
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;
        row.map(OtpChallenge::try_from).transpose()
    }

    async fn save_otp(&self, challenge: &OtpChallenge) -> Result<(), DatabaseError> {
        // Only a different challenge may replace the stored one
        let result = sqlx::query(
            "INSERT INTO otp_challenges (email, role, code_hash, issued_at, expires_at, attempts, consumed) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (role, email) DO UPDATE SET code_hash = EXCLUDED.code_hash, \
             issued_at = EXCLUDED.issued_at, expires_at = EXCLUDED.expires_at, \
             attempts = EXCLUDED.attempts, consumed = EXCLUDED.consumed \
             WHERE otp_challenges.code_hash <> EXCLUDED.code_hash \
             OR otp_challenges.issued_at <> EXCLUDED.issued_at",
        )
        .bind(&challenge.email)
        .bind(challenge.role.as_str())
        .bind(&challenge.code_hash)
        .bind(challenge.issued_at)
        .bind(challenge.expires_at)
        .bind(otp_attempts(challenge.attempts))
        .bind(challenge.consumed)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::Stale(format!("{} challenge for {}", challenge.role, challenge.email)));
        }
        Ok(())
    }

    async fn swap_otp(&self, current: &OtpChallenge, next: &OtpChallenge) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE otp_challenges SET attempts = $1, consumed = $2 \
             WHERE role = $3 AND email = $4 AND code_hash = $5 AND issued_at = $6 \
             AND attempts = $7 AND consumed = $8",
        )
        .bind(otp_attempts(next.attempts))
        .bind(next.consumed)
        .bind(current.role.as_str())
        .bind(&current.email)
        .bind(&current.code_hash)
        .bind(current.issued_at)
        .bind(otp_attempts(current.attempts))
        .bind(current.consumed)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::Stale(format!("{} challenge for {}", current.role, current.email)));
        }
        Ok(())
    }

    async fn create_category(&self, category: Category) -> Result<Category, DatabaseError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "INSERT INTO categories (id, name, description, min_price, max_price, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.min_price)
        .bind(category.max_price)
        .bind(category.is_active)
        .bind(category.created_at)
        .bind(category.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, format!("category '{}' already exists", category.name)))?;
        Ok(row.into())
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, DatabaseError> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Category::from))
    }

    async fn list_categories(&self, include_inactive: bool) -> Result<Vec<Category>, DatabaseError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT * FROM categories WHERE is_active OR $1 ORDER BY created_at",
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn update_category(&self, category: &Category) -> Result<Category, DatabaseError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "UPDATE categories SET name = $2, description = $3, min_price = $4, max_price = $5, \
             is_active = $6, updated_at = $7 WHERE id = $1 RETURNING *",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.min_price)
        .bind(category.max_price)
        .bind(category.is_active)
        .bind(category.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique(e, format!("category '{}' already exists", category.name)))?
        .ok_or_else(|| DatabaseError::NotFound(format!("category {}", category.id)))?;
        Ok(row.into())
    }

    async fn create_career(&self, career: Career) -> Result<Career, DatabaseError> {
        let row = sqlx::query_as::<_, CareerRow>(
            "INSERT INTO careers (id, title, description, location, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(career.id)
        .bind(&career.title)
        .bind(&career.description)
        .bind(&career.location)
        .bind(career.is_active)
        .bind(career.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_career(&self, id: Uuid) -> Result<Option<Career>, DatabaseError> {
        let row = sqlx::query_as::<_, CareerRow>("SELECT * FROM careers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Career::from))
    }

    async fn list_careers(&self, include_closed: bool) -> Result<Vec<Career>, DatabaseError> {
        let rows = sqlx::query_as::<_, CareerRow>(
            "SELECT * FROM careers WHERE is_active OR $1 ORDER BY created_at",
        )
        .bind(include_closed)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Career::from).collect())
    }

    async fn update_career(&self, career: &Career) -> Result<Career, DatabaseError> {
        let row = sqlx::query_as::<_, CareerRow>(
            "UPDATE careers SET title = $2, description = $3, location = $4, is_active = $5 \
             WHERE id = $1 RETURNING *",
        )
        .bind(career.id)
        .bind(&career.title)
        .bind(&career.description)
        .bind(&career.location)
        .bind(career.is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("career {}", career.id)))?;
        Ok(row.into())
    }

    async fn create_booking(&self, booking: Booking) -> Result<Booking, DatabaseError> {
        let refund = booking.refund.as_ref();
        let sql = format!(
            "INSERT INTO bookings ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
             $14, $15, $16, $17, $18, $19, $20, $21, $22) RETURNING {cols}",
            cols = BOOKING_COLUMNS
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(booking.id)
            .bind(booking.user_id)
            .bind(booking.category_id)
            .bind(booking.employee_id)
            .bind(booking.status.as_str())
            .bind(&booking.address)
            .bind(booking.scheduled_for)
            .bind(booking.payment.initial_amount)
            .bind(&booking.payment.order_id)
            .bind(&booking.payment.payment_id)
            .bind(booking.payment.status.as_str())
            .bind(refund.map(|r| r.amount))
            .bind(refund.and_then(|r| r.refund_id.clone()))
            .bind(refund.map(|r| r.status.as_str()))
            .bind(booking.rating.map(i16::from))
            .bind(&booking.feedback)
            .bind(booking.is_paid)
            .bind(booking.is_done)
            .bind(booking.is_active)
            .bind(booking.version)
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                map_unique(e, format!("order {} already has a booking", booking.payment.order_id))
            })?;
        row.try_into()
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, DatabaseError> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Booking::try_from).transpose()
    }

    async fn find_booking_by_order(&self, order_id: &str) -> Result<Option<Booking>, DatabaseError> {
        let sql = format!("SELECT {} FROM bookings WHERE order_id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Booking::try_from).transpose()
    }

    async fn list_bookings(&self, filter: BookingFilter) -> Result<Vec<Booking>, DatabaseError> {
        let query = match filter {
            BookingFilter::All => {
                let sql = format!("SELECT {} FROM bookings ORDER BY created_at", BOOKING_COLUMNS);
                sqlx::query_as::<_, BookingRow>(&sql).fetch_all(&self.pool).await
            }
            BookingFilter::ForUser(user_id) => {
                let sql = format!(
                    "SELECT {} FROM bookings WHERE user_id = $1 ORDER BY created_at",
                    BOOKING_COLUMNS
                );
                sqlx::query_as::<_, BookingRow>(&sql)
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await
            }
            BookingFilter::ForEmployee(employee_id) => {
                let sql = format!(
                    "SELECT {} FROM bookings WHERE employee_id = $1 ORDER BY created_at",
                    BOOKING_COLUMNS
                );
                sqlx::query_as::<_, BookingRow>(&sql)
                    .bind(employee_id)
                    .fetch_all(&self.pool)
                    .await
            }
        };
        bookings(query?)
    }

    async fn save_booking(&self, booking: &Booking, expected_version: i64) -> Result<Booking, DatabaseError> {
        match update_booking(&self.pool, booking, expected_version).await? {
            Some(saved) => Ok(saved),
            None => Err(self.missed_booking_write(booking.id).await),
        }
    }

    async fn create_schedule(&self, schedule: Schedule) -> Result<Schedule, DatabaseError> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            "INSERT INTO schedules (id, booking_id, employee_id, accepted, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(schedule.id)
        .bind(schedule.booking_id)
        .bind(schedule.employee_id)
        .bind(schedule.accepted)
        .bind(schedule.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "booking already offered to this employee"))?;
        Ok(row.into())
    }

    async fn find_schedule(&self, id: Uuid) -> Result<Option<Schedule>, DatabaseError> {
        let row = sqlx::query_as::<_, ScheduleRow>("SELECT * FROM schedules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Schedule::from))
    }

    async fn list_schedules_for_employee(&self, employee_id: Uuid) -> Result<Vec<Schedule>, DatabaseError> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            "SELECT * FROM schedules WHERE employee_id = $1 ORDER BY created_at",
        )
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Schedule::from).collect())
    }

    async fn accept_schedule(
        &self,
        schedule_id: Uuid,
        booking: &Booking,
        expected_version: i64,
    ) -> Result<(Schedule, Booking), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let schedule = sqlx::query_as::<_, ScheduleRow>(
            "UPDATE schedules SET accepted = true WHERE id = $1 AND accepted = false RETURNING *",
        )
        .bind(schedule_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(schedule) = schedule else {
            // Dropping the transaction rolls it back
            return Err(DatabaseError::Conflict("schedule already accepted".to_string()));
        };

        let Some(saved) = update_booking(&mut *tx, booking, expected_version).await? else {
            drop(tx);
            return Err(self.missed_booking_write(booking.id).await);
        };

        tx.commit().await?;
        Ok((schedule.into(), saved))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}
