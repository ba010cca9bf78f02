use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use super::domain::{
    ImageUpload, NewProperty, NewPropertyImage, Property, PropertyDraft, PropertyId,
    PropertyImage,
};
use super::filter::{PropertyFilter, PropertyQuery};
use crate::marketplace::authz::{Capability, RequestContext, Role};
use crate::marketplace::bookings::BookingStatus;
use crate::marketplace::error::{MarketplaceError, ValidationError};
use crate::marketplace::store::{AccountRepository, BookingRepository, PropertyRepository};
use crate::marketplace::MarketplaceSettings;

const MAPS_EMBED_URL: &str = "https://www.google.com/maps/embed/v1/place";

/// Everything the detail page shows about one listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyDetail {
    pub property: Property,
    pub images: Vec<PropertyImage>,
    pub owner_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_url: Option<String>,
    /// Status of the viewing tenant's latest request for this listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_booking: Option<BookingStatus>,
}

pub struct CatalogService<S> {
    store: Arc<S>,
    maps_api_key: Option<String>,
}

impl<S> CatalogService<S>
where
    S: PropertyRepository + AccountRepository + BookingRepository + 'static,
{
    pub fn new(store: Arc<S>, settings: &MarketplaceSettings) -> Self {
        Self {
            store,
            maps_api_key: settings.maps_api_key.clone(),
        }
    }

    pub async fn list(&self, query: &PropertyQuery) -> Result<Vec<Property>, MarketplaceError> {
        let filter = PropertyFilter::from_query(query);
        debug!(?filter, "listing properties");
        Ok(self.store.search(&filter).await?)
    }

    pub async fn detail(
        &self,
        ctx: &RequestContext,
        id: PropertyId,
    ) -> Result<PropertyDetail, MarketplaceError> {
        let property = self.load(id).await?;
        let images = self.store.images(id).await?;
        let owner_name = self
            .store
            .user(property.owner_id)
            .await?
            .map(|owner| owner.display_name())
            .unwrap_or_default();

        let viewer_booking = match (ctx.user_id(), ctx.role()) {
            (Some(viewer), Ok(Role::Tenant)) => self
                .store
                .latest_booking(id, viewer)
                .await?
                .map(|booking| booking.status),
            _ => None,
        };

        Ok(PropertyDetail {
            map_url: self.map_url(&property),
            property,
            images,
            owner_name,
            viewer_booking,
        })
    }

    fn map_url(&self, property: &Property) -> Option<String> {
        let key = self.maps_api_key.as_deref()?;
        let (latitude, longitude) = property.coordinates()?;
        Some(format!("{MAPS_EMBED_URL}?key={key}&q={latitude},{longitude}"))
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        draft: PropertyDraft,
    ) -> Result<Property, MarketplaceError> {
        let owner = ctx.require(Capability::PublishListings)?;
        draft.validate()?;

        let new_property = NewProperty {
            owner_id: owner.user.id,
            details: draft,
            created_at: Utc::now(),
        };
        let property = self.store.insert_property(new_property).await?;

        info!(property_id = property.id.0, owner_id = owner.user.id.0, "property listed");
        Ok(property)
    }

    pub async fn edit(
        &self,
        ctx: &RequestContext,
        id: PropertyId,
        draft: PropertyDraft,
    ) -> Result<Property, MarketplaceError> {
        let mut property = self.owned(ctx, id).await?;
        draft.validate()?;

        property.details = draft;
        property.updated_at = Utc::now();
        self.store.update_property(property.clone()).await?;

        info!(property_id = id.0, "property updated");
        Ok(property)
    }

    /// Removes the listing together with its images and booking requests.
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        id: PropertyId,
    ) -> Result<(), MarketplaceError> {
        self.owned(ctx, id).await?;
        self.store.delete_property(id).await?;
        info!(property_id = id.0, "property deleted");
        Ok(())
    }

    pub async fn my_properties(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<Property>, MarketplaceError> {
        let owner = ctx.require(Capability::ManageListings)?;
        Ok(self.store.properties_by_owner(owner.user.id).await?)
    }

    pub async fn toggle_availability(
        &self,
        ctx: &RequestContext,
        id: PropertyId,
    ) -> Result<Property, MarketplaceError> {
        let mut property = self.owned(ctx, id).await?;
        property.available = !property.available;
        property.updated_at = Utc::now();
        self.store.update_property(property.clone()).await?;

        info!(property_id = id.0, available = property.available, "availability toggled");
        Ok(property)
    }

    pub async fn add_image(
        &self,
        ctx: &RequestContext,
        id: PropertyId,
        upload: ImageUpload,
    ) -> Result<PropertyImage, MarketplaceError> {
        self.owned(ctx, id).await?;
        let image = upload.image.trim();
        if image.is_empty() {
            return Err(ValidationError::field("image", "Choose an image to upload.").into());
        }

        let new_image = NewPropertyImage {
            property_id: id,
            image: image.to_string(),
            uploaded_at: Utc::now(),
        };
        let image = self.store.insert_image(new_image).await?;
        debug!(property_id = id.0, image_id = image.id.0, "property image added");
        Ok(image)
    }

    async fn load(&self, id: PropertyId) -> Result<Property, MarketplaceError> {
        self.store
            .property(id)
            .await?
            .ok_or_else(|| MarketplaceError::not_found("property", id.0))
    }

    /// Fails unless the caller may manage the listing.
    pub async fn authorize_management(
        &self,
        ctx: &RequestContext,
        id: PropertyId,
    ) -> Result<(), MarketplaceError> {
        self.owned(ctx, id).await.map(|_| ())
    }

    /// Loads a property the caller may manage.
    async fn owned(
        &self,
        ctx: &RequestContext,
        id: PropertyId,
    ) -> Result<Property, MarketplaceError> {
        ctx.require(Capability::ManageListings)?;
        let property = self.load(id).await?;
        ctx.ensure_owner(property.owner_id, "property")?;
        Ok(property)
    }
}
