//! Role capabilities and the request-scoped actor every marketplace operation receives.
//!
//! [`Role::allows`] is the only place that decides what a role may do. Handlers resolve a
//! [`RequestContext`] from the session on every request, so a role change made between two
//! requests is picked up immediately.

use serde::{Deserialize, Serialize};

use super::accounts::{UserAccount, UserId, UserProfile};
use super::error::{MarketplaceError, PermissionDenied};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Tenant,
    Homeowner,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Tenant => "tenant",
            Role::Homeowner => "homeowner",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "tenant" => Some(Role::Tenant),
            "homeowner" => Some(Role::Homeowner),
            _ => None,
        }
    }

    pub const fn allows(self, capability: Capability) -> bool {
        match capability {
            Capability::PublishListings
            | Capability::ManageListings
            | Capability::ReviewBookingRequests => matches!(self, Role::Homeowner),
            Capability::RequestBookings | Capability::TrackOwnBookings => {
                matches!(self, Role::Tenant)
            }
        }
    }
}

/// Role-gated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    PublishListings,
    ManageListings,
    RequestBookings,
    ReviewBookingRequests,
    TrackOwnBookings,
}

impl Capability {
    pub const fn describe(self) -> &'static str {
        match self {
            Capability::PublishListings => "publish property listings",
            Capability::ManageListings => "manage property listings",
            Capability::RequestBookings => "send booking requests",
            Capability::ReviewBookingRequests => "review booking requests",
            Capability::TrackOwnBookings => "track tenant bookings",
        }
    }
}

/// The authenticated user behind a request, with the profile as it was read for this request.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user: UserAccount,
    pub profile: Option<UserProfile>,
}

impl Actor {
    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().map(|profile| profile.role)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    actor: Option<Actor>,
    session_token: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(actor: Actor, session_token: impl Into<String>) -> Self {
        Self {
            actor: Some(actor),
            session_token: Some(session_token.into()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.actor.is_some()
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.actor.as_ref().map(|actor| actor.user.id)
    }

    pub fn actor(&self) -> Result<&Actor, MarketplaceError> {
        self.actor.as_ref().ok_or(MarketplaceError::Unauthenticated)
    }

    /// The actor's role; a missing profile is reported as incomplete setup.
    pub fn role(&self) -> Result<Role, MarketplaceError> {
        self.actor()?
            .role()
            .ok_or(MarketplaceError::IncompleteProfile)
    }

    pub fn require(&self, capability: Capability) -> Result<&Actor, MarketplaceError> {
        let actor = self.actor()?;
        let role = actor.role().ok_or(MarketplaceError::IncompleteProfile)?;
        if role.allows(capability) {
            Ok(actor)
        } else {
            Err(PermissionDenied::Role { role, capability }.into())
        }
    }

    pub fn ensure_owner(&self, owner: UserId, entity: &'static str) -> Result<(), MarketplaceError> {
        if self.user_id() == Some(owner) {
            Ok(())
        } else {
            Err(PermissionDenied::NotOwner { entity }.into())
        }
    }
}
