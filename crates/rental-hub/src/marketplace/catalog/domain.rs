use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::amenities::{self, Amenity};
use crate::marketplace::accounts::UserId;
use crate::marketplace::error::ValidationError;

const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Single,
    Double,
    Triple,
    OneRk,
    OneBhk,
    TwoBhk,
    ThreeBhk,
}

impl RoomType {
    pub const fn tag(self) -> &'static str {
        match self {
            RoomType::Single => "single",
            RoomType::Double => "double",
            RoomType::Triple => "triple",
            RoomType::OneRk => "one_rk",
            RoomType::OneBhk => "one_bhk",
            RoomType::TwoBhk => "two_bhk",
            RoomType::ThreeBhk => "three_bhk",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatSystem {
    #[default]
    Independent,
    SharedWithOwner,
    SharedWithTenants,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FurnishingStatus {
    Furnished,
    SemiFurnished,
    #[default]
    Unfurnished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessType {
    Veg,
    NonVeg,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferredTenant {
    Students,
    WorkingProfessionals,
    Family,
    #[default]
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderPreference {
    Male,
    Female,
    #[default]
    Any,
}

/// Free-text notes about what is close by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Neighbourhood {
    pub nearby_college_office: Option<String>,
    pub nearby_mall: Option<String>,
    pub garden_park_nearby: Option<String>,
    pub hospital_medical: Option<String>,
    pub temple_religious: Option<String>,
    pub bus_railway_distance: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessDetails {
    pub available: bool,
    pub mess_type: Option<MessType>,
    pub distance: Option<String>,
    pub tiffin_available: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseRules {
    pub preferred_tenant_type: PreferredTenant,
    pub gender_preference: GenderPreference,
    pub smoking_allowed: bool,
    pub drinking_allowed: bool,
    pub pets_allowed: bool,
}

/// Owner-editable listing fields, as submitted by the create and edit forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDraft {
    pub title: String,
    pub room_type: RoomType,
    #[serde(default)]
    pub flat_system: FlatSystem,
    pub city: String,
    #[serde(default)]
    pub area_location: String,
    #[serde(default)]
    pub full_address: String,
    pub monthly_rent: u32,
    #[serde(default)]
    pub security_deposit: u32,
    #[serde(default)]
    pub maintenance_charges: u32,
    #[serde(default = "default_max_people")]
    pub max_people: u8,
    #[serde(default)]
    pub per_person_rent: Option<u32>,
    #[serde(default)]
    pub main_image: Option<String>,
    #[serde(default)]
    pub floor_number: Option<i16>,
    #[serde(default)]
    pub total_floors: Option<i16>,
    #[serde(default)]
    pub furnishing_status: FurnishingStatus,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub neighbourhood: Neighbourhood,
    #[serde(default)]
    pub mess: MessDetails,
    #[serde(default)]
    pub house_rules: HouseRules,
    #[serde(default)]
    pub available_from: Option<NaiveDate>,
    #[serde(default)]
    pub min_stay_months: Option<u8>,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "amenities::deserialize")]
    pub amenities: BTreeSet<Amenity>,
}

fn default_max_people() -> u8 {
    1
}

impl PropertyDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::default();

        let title = self.title.trim();
        if title.is_empty() {
            errors.push("title", "Title is required.");
        } else if title.chars().count() > MAX_TITLE_LEN {
            errors.push("title", "Title must be at most 200 characters.");
        }
        if self.city.trim().is_empty() {
            errors.push("city", "City is required.");
        }
        if self.monthly_rent == 0 {
            errors.push("monthly_rent", "Monthly rent must be greater than zero.");
        }
        if self.max_people == 0 {
            errors.push("max_people", "At least one person must be allowed.");
        }
        if let (Some(floor), Some(total)) = (self.floor_number, self.total_floors) {
            if floor > total {
                errors.push("floor_number", "Floor number cannot exceed total floors.");
            }
        }
        if let Some(latitude) = self.latitude {
            if !(-90.0..=90.0).contains(&latitude) {
                errors.push("latitude", "Latitude must be between -90 and 90.");
            }
        }
        if let Some(longitude) = self.longitude {
            if !(-180.0..=180.0).contains(&longitude) {
                errors.push("longitude", "Longitude must be between -180 and 180.");
            }
        }
        if !self.mess.available && self.mess.mess_type.is_some() {
            errors.push("mess_type", "Mess type applies only when a mess is available.");
        }

        errors.into_result()
    }
}

/// A listing as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub owner_id: UserId,
    #[serde(flatten)]
    pub details: PropertyDraft,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn title(&self) -> &str {
        &self.details.title
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.details.latitude.zip(self.details.longitude)
    }
}

/// Insert payload; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProperty {
    pub owner_id: UserId,
    pub details: PropertyDraft,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyImage {
    pub id: ImageId,
    pub property_id: PropertyId,
    /// Storage reference (path or URL) of the uploaded file.
    pub image: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPropertyImage {
    pub property_id: PropertyId,
    pub image: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageUpload {
    pub image: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn draft() -> PropertyDraft {
        serde_json::from_value(json!({
            "title": "Sunny single room near campus",
            "room_type": "single",
            "city": "Pune",
            "monthly_rent": 5000
        }))
        .expect("minimal draft parses")
    }

    #[test]
    fn minimal_draft_uses_defaults() {
        let draft = draft();
        assert_eq!(draft.max_people, 1);
        assert_eq!(draft.flat_system, FlatSystem::Independent);
        assert_eq!(draft.house_rules.gender_preference, GenderPreference::Any);
        assert!(draft.amenities.is_empty());
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn validation_reports_each_bad_field() {
        let mut draft = draft();
        draft.title = "   ".to_string();
        draft.monthly_rent = 0;
        draft.floor_number = Some(5);
        draft.total_floors = Some(3);
        draft.latitude = Some(123.0);
        let err = draft.validate().expect_err("invalid draft");
        for field in ["title", "monthly_rent", "floor_number", "latitude"] {
            assert!(err.has_field(field), "missing error for {field}");
        }
        assert!(!err.has_field("city"));
    }

    #[test]
    fn property_serialises_details_inline() {
        let property = Property {
            id: PropertyId(3),
            owner_id: UserId(1),
            details: draft(),
            available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&property).expect("serialises");
        assert_eq!(value["title"], "Sunny single room near campus");
        assert_eq!(value["room_type"], "single");
        assert_eq!(value["id"], 3);
    }
}
