use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amenity {
    Bed,
    Mattress,
    Wardrobe,
    StudyTable,
    Wifi,
    Fan,
    Ac,
    Geyser,
    WashingMachine,
    Refrigerator,
    Parking,
    Lift,
}

impl Amenity {
    pub const ALL: [Amenity; 12] = [
        Amenity::Bed,
        Amenity::Mattress,
        Amenity::Wardrobe,
        Amenity::StudyTable,
        Amenity::Wifi,
        Amenity::Fan,
        Amenity::Ac,
        Amenity::Geyser,
        Amenity::WashingMachine,
        Amenity::Refrigerator,
        Amenity::Parking,
        Amenity::Lift,
    ];

    pub const fn tag(self) -> &'static str {
        match self {
            Amenity::Bed => "bed",
            Amenity::Mattress => "mattress",
            Amenity::Wardrobe => "wardrobe",
            Amenity::StudyTable => "study_table",
            Amenity::Wifi => "wifi",
            Amenity::Fan => "fan",
            Amenity::Ac => "ac",
            Amenity::Geyser => "geyser",
            Amenity::WashingMachine => "washing_machine",
            Amenity::Refrigerator => "refrigerator",
            Amenity::Parking => "parking",
            Amenity::Lift => "lift",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Amenity::Bed => "Bed",
            Amenity::Mattress => "Mattress",
            Amenity::Wardrobe => "Wardrobe",
            Amenity::StudyTable => "Study Table",
            Amenity::Wifi => "Wi-Fi",
            Amenity::Fan => "Fan",
            Amenity::Ac => "AC",
            Amenity::Geyser => "Geyser",
            Amenity::WashingMachine => "Washing Machine",
            Amenity::Refrigerator => "Refrigerator",
            Amenity::Parking => "Parking",
            Amenity::Lift => "Lift",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        Self::ALL
            .into_iter()
            .find(|amenity| amenity.tag().eq_ignore_ascii_case(tag))
    }
}

/// Converts tags into a typed set, dropping anything unrecognised.
pub fn from_tags<I, T>(tags: I) -> BTreeSet<Amenity>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    tags.into_iter()
        .filter_map(|tag| {
            let tag = tag.as_ref();
            let amenity = Amenity::from_tag(tag);
            if amenity.is_none() {
                warn!(tag, "dropping unknown amenity tag");
            }
            amenity
        })
        .collect()
}

/// Reads the legacy storage format: a JSON array of tags serialised into a string.
/// A malformed blob yields an empty set.
pub fn from_legacy_blob(blob: &str) -> BTreeSet<Amenity> {
    if blob.trim().is_empty() {
        return BTreeSet::new();
    }
    match serde_json::from_str::<Vec<String>>(blob) {
        Ok(tags) => from_tags(tags),
        Err(err) => {
            warn!(%err, "ignoring malformed amenities blob");
            BTreeSet::new()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AmenitiesInput {
    Tags(Vec<String>),
    Legacy(String),
}

/// Accepts either a list of tags or a legacy blob.
pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeSet<Amenity>, D::Error>
where
    D: Deserializer<'de>,
{
    let input = Option::<AmenitiesInput>::deserialize(deserializer)?;
    Ok(match input {
        None => BTreeSet::new(),
        Some(AmenitiesInput::Tags(tags)) => from_tags(tags),
        Some(AmenitiesInput::Legacy(blob)) => from_legacy_blob(&blob),
    })
}
