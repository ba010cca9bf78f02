//! Property-rental marketplace: homeowners list rooms and flats, tenants browse and filter
//! listings, and a booking-request workflow connects the two with owner approval.

pub mod config;
pub mod error;
pub mod marketplace;
pub mod telemetry;
