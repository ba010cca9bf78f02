use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{
    BookingDecision, BookingForm, BookingId, BookingRequest, BookingResponseForm, BookingStatus,
    BookingView, NewBooking,
};
use crate::marketplace::accounts::UserId;
use crate::marketplace::authz::{Capability, RequestContext};
use crate::marketplace::catalog::{Property, PropertyId};
use crate::marketplace::error::{MarketplaceError, ValidationError};
use crate::marketplace::notifications::{Mailer, Notifier};
use crate::marketplace::store::{
    AccountRepository, BookingRepository, PropertyRepository, RepositoryError,
};

const DUPLICATE_REQUEST: &str = "You already have an active booking request for this property.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingCreated {
    pub booking: BookingRequest,
    /// Whether the confirmation email went out.
    pub notified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingResponded {
    pub booking: BookingRequest,
    pub property_available: bool,
    pub notified: bool,
}

/// Drives booking requests through their lifecycle and keeps listing availability in step.
pub struct BookingService<S, M> {
    store: Arc<S>,
    notifier: Notifier<M>,
}

impl<S, M> BookingService<S, M>
where
    S: BookingRepository + PropertyRepository + AccountRepository + 'static,
    M: Mailer + 'static,
{
    pub fn new(store: Arc<S>, notifier: Notifier<M>) -> Self {
        Self { store, notifier }
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        property_id: PropertyId,
        form: BookingForm,
    ) -> Result<BookingCreated, MarketplaceError> {
        let tenant = match ctx.require(Capability::RequestBookings) {
            Ok(actor) => actor,
            Err(MarketplaceError::Permission(_)) => {
                return Err(MarketplaceError::validation(
                    "Homeowners cannot send booking requests.",
                ))
            }
            Err(err) => return Err(err),
        };
        let property = self.property(property_id).await?;

        if property.owner_id == tenant.user.id {
            return Err(MarketplaceError::validation("You cannot book your own property."));
        }
        if !property.available {
            return Err(MarketplaceError::validation(
                "This property is not available for booking.",
            ));
        }
        if self
            .store
            .active_booking(property_id, tenant.user.id)
            .await?
            .is_some()
        {
            return Err(MarketplaceError::validation(DUPLICATE_REQUEST));
        }

        let new_booking = NewBooking {
            property_id,
            tenant_id: tenant.user.id,
            message: form.message.trim().to_string(),
            requested_at: Utc::now(),
        };
        let booking = match self.store.insert_booking(new_booking).await {
            Ok(booking) => booking,
            Err(RepositoryError::Conflict) => {
                return Err(MarketplaceError::validation(DUPLICATE_REQUEST))
            }
            Err(RepositoryError::NotFound) => {
                return Err(MarketplaceError::not_found("property", property_id.0))
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            booking_id = booking.id.0,
            property_id = property_id.0,
            tenant_id = tenant.user.id.0,
            "booking requested"
        );

        let notified = self
            .notifier
            .booking_requested(
                &tenant.user.email,
                &tenant.user.display_name(),
                property.title(),
            )
            .await;

        Ok(BookingCreated { booking, notified })
    }

    /// Records the owner's decision. Accepting takes the listing off the market; concurrent
    /// decisions on the same listing are last-write-wins.
    pub async fn respond(
        &self,
        ctx: &RequestContext,
        booking_id: BookingId,
        form: BookingResponseForm,
    ) -> Result<BookingResponded, MarketplaceError> {
        let (mut booking, mut property) = self.reviewable(ctx, booking_id).await?;

        let decision = BookingDecision::from_status(form.status).ok_or_else(|| {
            ValidationError::field("status", "Choose whether to accept or reject the request.")
        })?;
        let next = booking.status.transition(decision.status()).map_err(|_| {
            ValidationError::field(
                "status",
                format!("This booking request is already {}.", booking.status.label()),
            )
        })?;

        let now = Utc::now();
        let owner_response = form.owner_response.trim();
        booking.status = next;
        booking.owner_response = (!owner_response.is_empty()).then(|| owner_response.to_string());
        booking.responded_at = Some(now);
        self.store.update_booking(booking.clone()).await?;

        if decision == BookingDecision::Accepted && property.available {
            property.available = false;
            property.updated_at = now;
            self.store.update_property(property.clone()).await?;
        }

        info!(
            booking_id = booking.id.0,
            property_id = property.id.0,
            status = next.label(),
            "booking request answered"
        );

        let notified = match self.store.user(booking.tenant_id).await? {
            Some(tenant) => self.notifier.booking_decision(
                &tenant.email,
                property.title(),
                next.label(),
                owner_response,
            )
            .await,
            None => false,
        };

        Ok(BookingResponded {
            booking,
            property_available: property.available,
            notified,
        })
    }

    /// Fails unless the caller owns the listing the request was made on.
    pub async fn authorize_response(
        &self,
        ctx: &RequestContext,
        booking_id: BookingId,
    ) -> Result<(), MarketplaceError> {
        self.reviewable(ctx, booking_id).await.map(|_| ())
    }

    async fn reviewable(
        &self,
        ctx: &RequestContext,
        booking_id: BookingId,
    ) -> Result<(BookingRequest, Property), MarketplaceError> {
        ctx.actor()?;
        let booking = self.booking(booking_id).await?;
        let property = self.property(booking.property_id).await?;
        ctx.require(Capability::ReviewBookingRequests)?;
        ctx.ensure_owner(property.owner_id, "booking request")?;
        Ok((booking, property))
    }

    /// Withdraws a pending request on behalf of the tenant who sent it.
    pub async fn cancel(
        &self,
        ctx: &RequestContext,
        booking_id: BookingId,
    ) -> Result<BookingRequest, MarketplaceError> {
        ctx.require(Capability::TrackOwnBookings)?;
        let mut booking = self.booking(booking_id).await?;
        ctx.ensure_owner(booking.tenant_id, "booking request")?;

        booking.status = booking
            .status
            .transition(BookingStatus::Cancelled)
            .map_err(|_| {
                MarketplaceError::validation("Only pending booking requests can be cancelled.")
            })?;
        self.store.update_booking(booking.clone()).await?;

        info!(booking_id = booking.id.0, "booking request cancelled");
        Ok(booking)
    }

    /// The tenant's own requests, newest first.
    pub async fn tenant_bookings(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<BookingView>, MarketplaceError> {
        let tenant = ctx.require(Capability::TrackOwnBookings)?;
        let bookings = self.store.bookings_for_tenant(tenant.user.id).await?;
        self.views(bookings, |_, property| property.owner_id).await
    }

    /// Requests on the owner's listings, newest first.
    pub async fn incoming_requests(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<BookingView>, MarketplaceError> {
        let owner = ctx.require(Capability::ReviewBookingRequests)?;
        let bookings = self.store.bookings_for_owner(owner.user.id).await?;
        self.views(bookings, |booking, _| booking.tenant_id).await
    }

    async fn views<F>(
        &self,
        bookings: Vec<BookingRequest>,
        counterpart_of: F,
    ) -> Result<Vec<BookingView>, MarketplaceError>
    where
        F: Fn(&BookingRequest, &Property) -> UserId,
    {
        let mut views = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let Some(property) = self.store.property(booking.property_id).await? else {
                continue;
            };
            let counterpart = self
                .store
                .user(counterpart_of(&booking, &property))
                .await?
                .map(|user| user.display_name())
                .unwrap_or_default();
            views.push(BookingView {
                property_title: property.title().to_string(),
                counterpart,
                booking,
            });
        }
        Ok(views)
    }

    async fn booking(&self, id: BookingId) -> Result<BookingRequest, MarketplaceError> {
        self.store
            .booking(id)
            .await?
            .ok_or_else(|| MarketplaceError::not_found("booking request", id.0))
    }

    async fn property(&self, id: PropertyId) -> Result<Property, MarketplaceError> {
        self.store
            .property(id)
            .await?
            .ok_or_else(|| MarketplaceError::not_found("property", id.0))
    }
}
