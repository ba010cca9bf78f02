use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::marketplace::error::{FieldError, MarketplaceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// One-line message shown to the user alongside the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<Flash>,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Response {
    respond(StatusCode::OK, None, data)
}

pub fn with_flash<T: Serialize>(status: StatusCode, flash: Flash, data: T) -> Response {
    respond(status, Some(flash), data)
}

fn respond<T: Serialize>(status: StatusCode, flash: Option<Flash>, data: T) -> Response {
    (status, Json(Envelope { flash, data })).into_response()
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    flash: Flash,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<FieldError>,
}

/// HTTP rendering of a [`MarketplaceError`].
#[derive(Debug)]
pub struct ApiError(pub MarketplaceError);

impl From<MarketplaceError> for ApiError {
    fn from(err: MarketplaceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self.0 {
            MarketplaceError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    flash: Flash::error(errors.summary()),
                    redirect: None,
                    errors: errors.errors,
                },
            ),
            MarketplaceError::Permission(denied) => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    flash: Flash::error(sentence(&denied.to_string())),
                    redirect: Some("/"),
                    errors: Vec::new(),
                },
            ),
            err @ (MarketplaceError::NotFound { .. } | MarketplaceError::Unknown { .. }) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    flash: Flash::error(sentence(&err.to_string())),
                    redirect: None,
                    errors: Vec::new(),
                },
            ),
            err @ MarketplaceError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    flash: Flash::error(sentence(&err.to_string())),
                    redirect: Some("/login"),
                    errors: Vec::new(),
                },
            ),
            err @ MarketplaceError::IncompleteProfile => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    flash: Flash::warning(sentence(&err.to_string())),
                    redirect: Some("/me/profile"),
                    errors: Vec::new(),
                },
            ),
            err @ (MarketplaceError::Repository(_) | MarketplaceError::Internal(_)) => {
                error!(%err, "marketplace request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        flash: Flash::error("Something went wrong. Please try again."),
                        redirect: None,
                        errors: Vec::new(),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Capitalises an error message and closes it with a full stop.
fn sentence(message: &str) -> String {
    let mut chars = message.chars();
    let mut sentence = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    if !sentence.ends_with(&['.', '!', '?'][..]) {
        sentence.push('.');
    }
    sentence
}
