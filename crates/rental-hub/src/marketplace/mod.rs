//! Marketplace domain: accounts, listings and booking requests behind repository traits, with
//! an axum router on top.

use std::fmt;
use std::sync::Arc;

use chrono::Duration;

use crate::config::AppConfig;

pub mod accounts;
pub mod authz;
pub mod bookings;
pub mod catalog;
pub mod error;
pub mod notifications;
pub mod router;
pub mod store;

#[cfg(test)]
mod tests;

pub use accounts::{AccountService, PasswordCost};
pub use authz::{Actor, Capability, RequestContext, Role};
pub use bookings::BookingService;
pub use catalog::CatalogService;
pub use error::{FieldError, MarketplaceError, PermissionDenied, ValidationError};
pub use notifications::{
    ConsoleMailer, EmailMessage, MailError, Mailer, MailerBackend, MemoryMailer, Notifier,
    SmtpMailer,
};
pub use router::marketplace_router;
pub use store::{MarketplaceStore, RepositoryError, SqlStore};

/// Runtime knobs the services need, lifted out of [`AppConfig`].
#[derive(Clone)]
pub struct MarketplaceSettings {
    pub base_url: String,
    pub from_address: String,
    pub maps_api_key: Option<String>,
    pub password_secret: String,
    pub password_cost: PasswordCost,
    pub session_ttl: Duration,
    pub password_reset_ttl_minutes: u32,
}

impl MarketplaceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.server.base_url.clone(),
            from_address: config.mail.from_address.clone(),
            maps_api_key: config.maps_api_key.clone(),
            password_secret: config.security.secret_key.clone(),
            password_cost: PasswordCost::Standard,
            session_ttl: Duration::hours(i64::from(config.security.session_ttl_hours)),
            password_reset_ttl_minutes: config.security.password_reset_ttl_minutes,
        }
    }
}

impl fmt::Debug for MarketplaceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketplaceSettings")
            .field("base_url", &self.base_url)
            .field("from_address", &self.from_address)
            .field("maps_api_key", &self.maps_api_key.as_ref().map(|_| "<redacted>"))
            .field("password_secret", &"<redacted>")
            .field("password_cost", &self.password_cost)
            .field("session_ttl", &self.session_ttl)
            .field("password_reset_ttl_minutes", &self.password_reset_ttl_minutes)
            .finish()
    }
}

/// The three services wired to one store and one mailer.
pub struct Marketplace<S, M> {
    pub accounts: AccountService<S, M>,
    pub catalog: CatalogService<S>,
    pub bookings: BookingService<S, M>,
}

impl<S, M> Marketplace<S, M>
where
    S: MarketplaceStore + 'static,
    M: Mailer + 'static,
{
    pub fn new(store: Arc<S>, mailer: Arc<M>, settings: &MarketplaceSettings) -> Self {
        let notifier = Notifier::new(mailer, settings.from_address.clone());

        Self {
            accounts: AccountService::new(store.clone(), notifier.clone(), settings),
            catalog: CatalogService::new(store.clone(), settings),
            bookings: BookingService::new(store, notifier),
        }
    }
}
