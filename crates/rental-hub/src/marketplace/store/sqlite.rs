use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{query, query_as, FromRow, Row, SqlitePool};
use tracing::info;

use super::{
    AccountRepository, BookingRepository, PropertyRepository, RepositoryError, SessionRepository,
};
use crate::config::DatabaseConfig;
use crate::marketplace::accounts::{
    ContactDetails, NewAccount, PasswordResetToken, Session, TenantAddress, UserAccount, UserId,
    UserProfile,
};
use crate::marketplace::authz::Role;
use crate::marketplace::bookings::{BookingId, BookingRequest, BookingStatus, NewBooking};
use crate::marketplace::catalog::{
    ImageId, NewProperty, NewPropertyImage, Property, PropertyDraft, PropertyFilter, PropertyId,
    PropertyImage,
};

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, password_hash, date_joined";
const PROPERTY_COLUMNS: &str = "id, owner_id, details, available, created_at, updated_at";
const BOOKING_COLUMNS: &str = "b.id, b.property_id, b.tenant_id, b.message, b.status, \
     b.owner_response, b.requested_at, b.responded_at";

const INSERT_USER_SQL: &str = "INSERT INTO users \
     (username, email, first_name, last_name, password_hash, date_joined) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
     RETURNING id, username, email, first_name, last_name, password_hash, date_joined";
const UPSERT_PROFILE_SQL: &str = "INSERT INTO profiles \
     (user_id, role, phone, village, subdistrict, district) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
     ON CONFLICT (user_id) DO UPDATE SET role = excluded.role, phone = excluded.phone, \
     village = excluded.village, subdistrict = excluded.subdistrict, district = excluded.district";
const SELECT_PROFILE_SQL: &str = "SELECT user_id, role, phone, village, subdistrict, district \
     FROM profiles WHERE user_id = ?1";
const UPDATE_PASSWORD_SQL: &str = "UPDATE users SET password_hash = ?2 WHERE id = ?1";

const INSERT_SESSION_SQL: &str =
    "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)";
const SELECT_SESSION_SQL: &str =
    "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?1";
const INSERT_RESET_TOKEN_SQL: &str =
    "INSERT INTO password_reset_tokens (token, user_id, expires_at) VALUES (?1, ?2, ?3)";
const TAKE_RESET_TOKEN_SQL: &str = "DELETE FROM password_reset_tokens WHERE token = ?1 \
     RETURNING token, user_id, expires_at";

const INSERT_PROPERTY_SQL: &str = "INSERT INTO properties \
     (owner_id, title, city, room_type, monthly_rent, details, available, created_at, updated_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, TRUE, ?7, ?7) \
     RETURNING id, owner_id, details, available, created_at, updated_at";
const UPDATE_PROPERTY_SQL: &str = "UPDATE properties SET title = ?2, city = ?3, room_type = ?4, \
     monthly_rent = ?5, details = ?6, available = ?7, updated_at = ?8 WHERE id = ?1";
const SEARCH_PROPERTIES_SQL: &str = "SELECT id, owner_id, details, available, created_at, updated_at \
     FROM properties \
     WHERE (?1 IS NULL OR instr(lower(city), ?1) > 0) \
       AND (?2 IS NULL OR room_type = ?2) \
       AND (?3 IS NULL OR monthly_rent <= ?3) \
       AND (?4 IS NULL OR available = ?4) \
     ORDER BY created_at DESC, id DESC";
const INSERT_IMAGE_SQL: &str = "INSERT INTO property_images (property_id, image, uploaded_at) \
     VALUES (?1, ?2, ?3) RETURNING id, property_id, image, uploaded_at";

const INSERT_BOOKING_SQL: &str = "INSERT INTO booking_requests \
     (property_id, tenant_id, message, status, requested_at) \
     VALUES (?1, ?2, ?3, 'pending', ?4) \
     RETURNING id, property_id, tenant_id, message, status, owner_response, requested_at, \
     responded_at";
const UPDATE_BOOKING_SQL: &str = "UPDATE booking_requests SET message = ?2, status = ?3, \
     owner_response = ?4, responded_at = ?5 WHERE id = ?1";

/// Marketplace storage on a SQLite pool. Schema lives in `migrations/` and is applied on open.
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, RepositoryError> {
        if config.is_memory() {
            return Self::in_memory().await;
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.name)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;
        info!(database = %config.name, "opened marketplace database");

        Self::migrated(pool).await
    }

    /// A private database that lives as long as the store.
    pub async fn in_memory() -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // Each connection to `:memory:` is a separate database, so the pool keeps exactly one.
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Self, RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| RepositoryError::Unavailable(format!("migration failed: {err}")))?;
        Ok(Self { pool })
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict,
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => Self::NotFound,
            _ => Self::Unavailable(err.to_string()),
        }
    }
}

fn sql_id(id: u64) -> i64 {
    i64::try_from(id).unwrap_or(i64::MAX)
}

fn id_column(row: &SqliteRow, column: &str) -> sqlx::Result<u64> {
    let raw: i64 = row.try_get(column)?;
    u64::try_from(raw).map_err(|err| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(err),
    })
}

fn label_column<T>(row: &SqliteRow, column: &str, parse: fn(&str) -> Option<T>) -> sqlx::Result<T> {
    let raw: String = row.try_get(column)?;
    parse(&raw).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("unexpected value '{raw}'").into(),
    })
}

fn encode_details(details: &PropertyDraft) -> Result<String, RepositoryError> {
    serde_json::to_string(details)
        .map_err(|err| RepositoryError::Unavailable(format!("listing details: {err}")))
}

fn ensure_affected(rows: u64) -> Result<(), RepositoryError> {
    if rows == 0 {
        Err(RepositoryError::NotFound)
    } else {
        Ok(())
    }
}

impl<'r> FromRow<'r, SqliteRow> for UserAccount {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: UserId(id_column(row, "id")?),
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            password_hash: row.try_get("password_hash")?,
            date_joined: row.try_get("date_joined")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for UserProfile {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        let village: Option<String> = row.try_get("village")?;
        let subdistrict: Option<String> = row.try_get("subdistrict")?;
        let district: Option<String> = row.try_get("district")?;
        let address = match (village, subdistrict, district) {
            (Some(village), Some(subdistrict), Some(district)) => Some(TenantAddress {
                village,
                subdistrict,
                district,
            }),
            _ => None,
        };

        Ok(Self {
            user_id: UserId(id_column(row, "user_id")?),
            role: label_column(row, "role", Role::from_label)?,
            contact: ContactDetails {
                phone: row.try_get("phone")?,
            },
            address,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for Session {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            token: row.try_get("token")?,
            user_id: UserId(id_column(row, "user_id")?),
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for PasswordResetToken {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            token: row.try_get("token")?,
            user_id: UserId(id_column(row, "user_id")?),
            expires_at: row.try_get("expires_at")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for Property {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        let details: String = row.try_get("details")?;
        let details = serde_json::from_str::<PropertyDraft>(&details).map_err(|err| {
            sqlx::Error::ColumnDecode {
                index: "details".to_string(),
                source: Box::new(err),
            }
        })?;

        Ok(Self {
            id: PropertyId(id_column(row, "id")?),
            owner_id: UserId(id_column(row, "owner_id")?),
            details,
            available: row.try_get("available")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for PropertyImage {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: ImageId(id_column(row, "id")?),
            property_id: PropertyId(id_column(row, "property_id")?),
            image: row.try_get("image")?,
            uploaded_at: row.try_get("uploaded_at")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for BookingRequest {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: BookingId(id_column(row, "id")?),
            property_id: PropertyId(id_column(row, "property_id")?),
            tenant_id: UserId(id_column(row, "tenant_id")?),
            message: row.try_get("message")?,
            status: label_column(row, "status", BookingStatus::from_label)?,
            owner_response: row.try_get("owner_response")?,
            requested_at: row.try_get("requested_at")?,
            responded_at: row.try_get("responded_at")?,
        })
    }
}

#[async_trait]
impl AccountRepository for SqlStore {
    async fn create_account(
        &self,
        account: NewAccount,
        joined_at: DateTime<Utc>,
    ) -> Result<UserAccount, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let user = query_as::<_, UserAccount>(INSERT_USER_SQL)
            .bind(&account.username)
            .bind(&account.email)
            .bind(&account.first_name)
            .bind(&account.last_name)
            .bind(&account.password_hash)
            .bind(joined_at)
            .fetch_one(&mut *tx)
            .await?;

        let profile = account.profile;
        let address = profile.address.as_ref();
        query(UPSERT_PROFILE_SQL)
            .bind(sql_id(user.id.0))
            .bind(profile.role.label())
            .bind(&profile.contact.phone)
            .bind(address.map(|address| address.village.as_str()))
            .bind(address.map(|address| address.subdistrict.as_str()))
            .bind(address.map(|address| address.district.as_str()))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn user(&self, id: UserId) -> Result<Option<UserAccount>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        Ok(query_as::<_, UserAccount>(&sql)
            .bind(sql_id(id.0))
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserAccount>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
        Ok(query_as::<_, UserAccount>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower(?1)");
        Ok(query_as::<_, UserAccount>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn set_password_hash(
        &self,
        id: UserId,
        password_hash: String,
    ) -> Result<(), RepositoryError> {
        let result = query(UPDATE_PASSWORD_SQL)
            .bind(sql_id(id.0))
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        ensure_affected(result.rows_affected())
    }

    async fn profile(&self, user_id: UserId) -> Result<Option<UserProfile>, RepositoryError> {
        Ok(query_as::<_, UserProfile>(SELECT_PROFILE_SQL)
            .bind(sql_id(user_id.0))
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn save_profile(&self, profile: UserProfile) -> Result<(), RepositoryError> {
        let address = profile.address.as_ref();
        query(UPSERT_PROFILE_SQL)
            .bind(sql_id(profile.user_id.0))
            .bind(profile.role.label())
            .bind(&profile.contact.phone)
            .bind(address.map(|address| address.village.as_str()))
            .bind(address.map(|address| address.subdistrict.as_str()))
            .bind(address.map(|address| address.district.as_str()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for SqlStore {
    async fn insert_session(&self, session: Session) -> Result<(), RepositoryError> {
        query(INSERT_SESSION_SQL)
            .bind(&session.token)
            .bind(sql_id(session.user_id.0))
            .bind(session.created_at)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn session(&self, token: &str) -> Result<Option<Session>, RepositoryError> {
        Ok(query_as::<_, Session>(SELECT_SESSION_SQL)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_session(&self, token: &str) -> Result<(), RepositoryError> {
        query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_sessions_for(&self, user_id: UserId) -> Result<(), RepositoryError> {
        query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(sql_id(user_id.0))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_reset_token(&self, token: PasswordResetToken) -> Result<(), RepositoryError> {
        query(INSERT_RESET_TOKEN_SQL)
            .bind(&token.token)
            .bind(sql_id(token.user_id.0))
            .bind(token.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn take_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<PasswordResetToken>, RepositoryError> {
        Ok(query_as::<_, PasswordResetToken>(TAKE_RESET_TOKEN_SQL)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl PropertyRepository for SqlStore {
    async fn insert_property(&self, property: NewProperty) -> Result<Property, RepositoryError> {
        let details = &property.details;
        Ok(query_as::<_, Property>(INSERT_PROPERTY_SQL)
            .bind(sql_id(property.owner_id.0))
            .bind(&details.title)
            .bind(&details.city)
            .bind(details.room_type.tag())
            .bind(i64::from(details.monthly_rent))
            .bind(encode_details(details)?)
            .bind(property.created_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn property(&self, id: PropertyId) -> Result<Option<Property>, RepositoryError> {
        let sql = format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = ?1");
        Ok(query_as::<_, Property>(&sql)
            .bind(sql_id(id.0))
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_property(&self, property: Property) -> Result<(), RepositoryError> {
        let details = &property.details;
        let result = query(UPDATE_PROPERTY_SQL)
            .bind(sql_id(property.id.0))
            .bind(&details.title)
            .bind(&details.city)
            .bind(details.room_type.tag())
            .bind(i64::from(details.monthly_rent))
            .bind(encode_details(details)?)
            .bind(property.available)
            .bind(property.updated_at)
            .execute(&self.pool)
            .await?;
        ensure_affected(result.rows_affected())
    }

    async fn delete_property(&self, id: PropertyId) -> Result<(), RepositoryError> {
        let result = query("DELETE FROM properties WHERE id = ?1")
            .bind(sql_id(id.0))
            .execute(&self.pool)
            .await?;
        ensure_affected(result.rows_affected())
    }

    async fn search(&self, filter: &PropertyFilter) -> Result<Vec<Property>, RepositoryError> {
        Ok(query_as::<_, Property>(SEARCH_PROPERTIES_SQL)
            .bind(filter.city.as_deref())
            .bind(filter.room_type.as_deref())
            .bind(filter.max_rent.map(i64::from))
            .bind(filter.availability.flag())
            .fetch_all(&self.pool)
            .await?)
    }

    async fn properties_by_owner(
        &self,
        owner_id: UserId,
    ) -> Result<Vec<Property>, RepositoryError> {
        let sql = format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE owner_id = ?1 \
             ORDER BY created_at DESC, id DESC"
        );
        Ok(query_as::<_, Property>(&sql)
            .bind(sql_id(owner_id.0))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_image(
        &self,
        image: NewPropertyImage,
    ) -> Result<PropertyImage, RepositoryError> {
        Ok(query_as::<_, PropertyImage>(INSERT_IMAGE_SQL)
            .bind(sql_id(image.property_id.0))
            .bind(&image.image)
            .bind(image.uploaded_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn images(&self, property_id: PropertyId) -> Result<Vec<PropertyImage>, RepositoryError> {
        Ok(query_as::<_, PropertyImage>(
            "SELECT id, property_id, image, uploaded_at FROM property_images \
             WHERE property_id = ?1 ORDER BY id",
        )
        .bind(sql_id(property_id.0))
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl BookingRepository for SqlStore {
    async fn insert_booking(&self, booking: NewBooking) -> Result<BookingRequest, RepositoryError> {
        Ok(query_as::<_, BookingRequest>(INSERT_BOOKING_SQL)
            .bind(sql_id(booking.property_id.0))
            .bind(sql_id(booking.tenant_id.0))
            .bind(&booking.message)
            .bind(booking.requested_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn booking(&self, id: BookingId) -> Result<Option<BookingRequest>, RepositoryError> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM booking_requests b WHERE b.id = ?1");
        Ok(query_as::<_, BookingRequest>(&sql)
            .bind(sql_id(id.0))
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_booking(&self, booking: BookingRequest) -> Result<(), RepositoryError> {
        let result = query(UPDATE_BOOKING_SQL)
            .bind(sql_id(booking.id.0))
            .bind(&booking.message)
            .bind(booking.status.label())
            .bind(booking.owner_response.as_deref())
            .bind(booking.responded_at)
            .execute(&self.pool)
            .await?;
        ensure_affected(result.rows_affected())
    }

    async fn active_booking(
        &self,
        property_id: PropertyId,
        tenant_id: UserId,
    ) -> Result<Option<BookingRequest>, RepositoryError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM booking_requests b \
             WHERE b.property_id = ?1 AND b.tenant_id = ?2 AND b.status IN ('pending', 'accepted')"
        );
        Ok(query_as::<_, BookingRequest>(&sql)
            .bind(sql_id(property_id.0))
            .bind(sql_id(tenant_id.0))
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn latest_booking(
        &self,
        property_id: PropertyId,
        tenant_id: UserId,
    ) -> Result<Option<BookingRequest>, RepositoryError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM booking_requests b \
             WHERE b.property_id = ?1 AND b.tenant_id = ?2 \
             ORDER BY b.requested_at DESC, b.id DESC LIMIT 1"
        );
        Ok(query_as::<_, BookingRequest>(&sql)
            .bind(sql_id(property_id.0))
            .bind(sql_id(tenant_id.0))
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn bookings_for_tenant(
        &self,
        tenant_id: UserId,
    ) -> Result<Vec<BookingRequest>, RepositoryError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM booking_requests b WHERE b.tenant_id = ?1 \
             ORDER BY b.requested_at DESC, b.id DESC"
        );
        Ok(query_as::<_, BookingRequest>(&sql)
            .bind(sql_id(tenant_id.0))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn bookings_for_owner(
        &self,
        owner_id: UserId,
    ) -> Result<Vec<BookingRequest>, RepositoryError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM booking_requests b \
             JOIN properties p ON p.id = b.property_id \
             WHERE p.owner_id = ?1 \
             ORDER BY b.requested_at DESC, b.id DESC"
        );
        Ok(query_as::<_, BookingRequest>(&sql)
            .bind(sql_id(owner_id.0))
            .fetch_all(&self.pool)
            .await?)
    }
}
