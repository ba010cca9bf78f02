//! Persistence seams. Services depend on these traits; [`SqlStore`] implements them over SQLite
//! and leaves uniqueness and cascades to the schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::accounts::{NewAccount, PasswordResetToken, Session, UserAccount, UserId, UserProfile};
use super::bookings::{BookingId, BookingRequest, NewBooking};
use super::catalog::{
    NewProperty, NewPropertyImage, Property, PropertyFilter, PropertyId, PropertyImage,
};

mod sqlite;

pub use sqlite::SqlStore;

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Creates the user and its profile together; `Conflict` on a taken username or email.
    async fn create_account(
        &self,
        account: NewAccount,
        joined_at: DateTime<Utc>,
    ) -> Result<UserAccount, RepositoryError>;
    async fn user(&self, id: UserId) -> Result<Option<UserAccount>, RepositoryError>;
    async fn user_by_username(&self, username: &str)
        -> Result<Option<UserAccount>, RepositoryError>;
    /// Emails compare case-insensitively.
    async fn user_by_email(&self, email: &str) -> Result<Option<UserAccount>, RepositoryError>;
    async fn set_password_hash(
        &self,
        id: UserId,
        password_hash: String,
    ) -> Result<(), RepositoryError>;
    async fn profile(&self, user_id: UserId) -> Result<Option<UserProfile>, RepositoryError>;
    async fn save_profile(&self, profile: UserProfile) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert_session(&self, session: Session) -> Result<(), RepositoryError>;
    async fn session(&self, token: &str) -> Result<Option<Session>, RepositoryError>;
    async fn delete_session(&self, token: &str) -> Result<(), RepositoryError>;
    async fn delete_sessions_for(&self, user_id: UserId) -> Result<(), RepositoryError>;
    async fn insert_reset_token(&self, token: PasswordResetToken) -> Result<(), RepositoryError>;
    /// Removes and returns the token so it cannot be used twice.
    async fn take_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<PasswordResetToken>, RepositoryError>;
}

#[async_trait]
pub trait PropertyRepository: Send + Sync {
    async fn insert_property(&self, property: NewProperty) -> Result<Property, RepositoryError>;
    async fn property(&self, id: PropertyId) -> Result<Option<Property>, RepositoryError>;
    async fn update_property(&self, property: Property) -> Result<(), RepositoryError>;
    /// Deletes the property with its images and booking requests.
    async fn delete_property(&self, id: PropertyId) -> Result<(), RepositoryError>;
    /// Matching properties, newest first.
    async fn search(&self, filter: &PropertyFilter) -> Result<Vec<Property>, RepositoryError>;
    async fn properties_by_owner(&self, owner_id: UserId)
        -> Result<Vec<Property>, RepositoryError>;
    async fn insert_image(&self, image: NewPropertyImage)
        -> Result<PropertyImage, RepositoryError>;
    async fn images(&self, property_id: PropertyId) -> Result<Vec<PropertyImage>, RepositoryError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// `Conflict` when the (property, tenant) pair already has an active request.
    async fn insert_booking(&self, booking: NewBooking) -> Result<BookingRequest, RepositoryError>;
    async fn booking(&self, id: BookingId) -> Result<Option<BookingRequest>, RepositoryError>;
    async fn update_booking(&self, booking: BookingRequest) -> Result<(), RepositoryError>;
    async fn active_booking(
        &self,
        property_id: PropertyId,
        tenant_id: UserId,
    ) -> Result<Option<BookingRequest>, RepositoryError>;
    async fn latest_booking(
        &self,
        property_id: PropertyId,
        tenant_id: UserId,
    ) -> Result<Option<BookingRequest>, RepositoryError>;
    /// Newest first.
    async fn bookings_for_tenant(
        &self,
        tenant_id: UserId,
    ) -> Result<Vec<BookingRequest>, RepositoryError>;
    /// Requests on any property owned by `owner_id`, newest first.
    async fn bookings_for_owner(
        &self,
        owner_id: UserId,
    ) -> Result<Vec<BookingRequest>, RepositoryError>;
}

/// Everything the marketplace services need from storage.
pub trait MarketplaceStore:
    AccountRepository + SessionRepository + PropertyRepository + BookingRepository
{
}

impl<T> MarketplaceStore for T where
    T: AccountRepository + SessionRepository + PropertyRepository + BookingRepository
{
}
