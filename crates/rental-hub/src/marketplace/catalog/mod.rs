//! Property listings: drafts, images, filtering and availability.

pub mod amenities;
pub mod domain;
pub mod filter;
pub mod service;

pub use amenities::Amenity;
pub use domain::{
    FlatSystem, FurnishingStatus, GenderPreference, HouseRules, ImageId, ImageUpload,
    MessDetails, MessType, Neighbourhood, NewProperty, NewPropertyImage, PreferredTenant,
    Property, PropertyDraft, PropertyId, PropertyImage, RoomType,
};
pub use filter::{AvailabilityFilter, PropertyFilter, PropertyQuery};
pub use service::{CatalogService, PropertyDetail};
