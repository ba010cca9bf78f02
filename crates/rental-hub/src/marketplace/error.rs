use serde::Serialize;

use super::authz::{Capability, Role};
use super::store::RepositoryError;

/// A single form-level (`field == None`) or field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    pub message: String,
}

/// Validation failures shown inline to the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn form(message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push_form(message);
        errors
    }

    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: Some(field),
            message: message.into(),
        });
    }

    pub fn push_form(&mut self, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: None,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == Some(field))
    }

    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|error| error.message.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

impl std::error::Error for ValidationError {}

/// Unauthorized state transition or resource access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionDenied {
    #[error("{} accounts cannot {}", .role.label(), .capability.describe())]
    Role { role: Role, capability: Capability },
    #[error("you do not have permission to modify this {entity}")]
    NotOwner { entity: &'static str },
}

/// Error taxonomy shared by every marketplace operation.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Permission(#[from] PermissionDenied),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },
    /// The request named an identifier that cannot exist.
    #[error("{entity} not found")]
    Unknown { entity: &'static str },
    #[error("please log in to continue")]
    Unauthenticated,
    #[error("please complete your profile setup to continue")]
    IncompleteProfile,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl MarketplaceError {
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::form(message))
    }
}
