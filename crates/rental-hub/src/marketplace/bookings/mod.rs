//! Booking requests between tenants and property owners.

pub mod domain;
pub mod service;

pub use domain::{
    BookingDecision, BookingForm, BookingId, BookingRequest, BookingResponseForm, BookingStatus,
    BookingView, InvalidTransition, NewBooking,
};
pub use service::{BookingCreated, BookingResponded, BookingService};
