use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::marketplace::accounts::UserId;
use crate::marketplace::catalog::PropertyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub u64);

/// Lifecycle of a booking request. Only `Pending` has outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [
            BookingStatus::Pending,
            BookingStatus::Accepted,
            BookingStatus::Rejected,
            BookingStatus::Cancelled,
        ]
        .into_iter()
        .find(|status| status.label() == label)
    }

    /// Pending and accepted requests block a second request for the same pair.
    pub const fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Accepted)
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }

    pub fn transition(self, next: BookingStatus) -> Result<BookingStatus, InvalidTransition> {
        match (self, next) {
            (
                BookingStatus::Pending,
                BookingStatus::Accepted | BookingStatus::Rejected | BookingStatus::Cancelled,
            ) => Ok(next),
            (from, to) => Err(InvalidTransition { from, to }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("booking request is {} and cannot become {}", .from.label(), .to.label())]
pub struct InvalidTransition {
    pub from: BookingStatus,
    pub to: BookingStatus,
}

/// Owner decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingDecision {
    Accepted,
    Rejected,
}

impl BookingDecision {
    pub const fn status(self) -> BookingStatus {
        match self {
            BookingDecision::Accepted => BookingStatus::Accepted,
            BookingDecision::Rejected => BookingStatus::Rejected,
        }
    }

    /// Maps the status chosen on the response form; anything but accepted/rejected is refused.
    pub fn from_status(status: BookingStatus) -> Option<Self> {
        match status {
            BookingStatus::Accepted => Some(BookingDecision::Accepted),
            BookingStatus::Rejected => Some(BookingDecision::Rejected),
            BookingStatus::Pending | BookingStatus::Cancelled => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub id: BookingId,
    pub property_id: PropertyId,
    pub tenant_id: UserId,
    pub message: String,
    pub status: BookingStatus,
    pub owner_response: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub property_id: PropertyId,
    pub tenant_id: UserId,
    pub message: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingForm {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingResponseForm {
    pub status: BookingStatus,
    #[serde(default)]
    pub owner_response: String,
}

/// Listing row for "my bookings" and "booking requests" pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: BookingRequest,
    pub property_title: String,
    /// Display name of the tenant (for owners) or the owner (for tenants).
    pub counterpart: String,
}
