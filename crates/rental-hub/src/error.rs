use crate::config::ConfigError;
use crate::marketplace::notifications::MailError;
use crate::marketplace::store::RepositoryError;
use crate::marketplace::MarketplaceError;
use crate::telemetry::TelemetryError;

/// Failures that stop the binary from starting, serving or finishing a command.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Store(#[from] RepositoryError),
    #[error("mail transport error: {0}")]
    Mail(#[from] MailError),
    #[error("marketplace error: {0}")]
    Marketplace(#[from] MarketplaceError),
}
