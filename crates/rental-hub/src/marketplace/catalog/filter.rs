use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvailabilityFilter {
    #[default]
    Available,
    Unavailable,
    All,
}

impl AvailabilityFilter {
    /// Unrecognised values fall back to the default.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "unavailable" => Self::Unavailable,
            "all" => Self::All,
            _ => Self::Available,
        }
    }

    /// The `available` value to match, or `None` for every listing.
    pub const fn flag(self) -> Option<bool> {
        match self {
            AvailabilityFilter::Available => Some(true),
            AvailabilityFilter::Unavailable => Some(false),
            AvailabilityFilter::All => None,
        }
    }
}

/// Raw query string parameters; everything is optional and untrusted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyQuery {
    pub city: Option<String>,
    pub room_type: Option<String>,
    pub max_rent: Option<String>,
    pub availability: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyFilter {
    /// Lowercased needle matched anywhere in the city.
    pub city: Option<String>,
    /// Room-type tag compared exactly.
    pub room_type: Option<String>,
    /// Inclusive upper bound on the monthly rent.
    pub max_rent: Option<u32>,
    pub availability: AvailabilityFilter,
}

impl PropertyFilter {
    /// Blank values are ignored and so is a rent bound that does not parse.
    pub fn from_query(query: &PropertyQuery) -> Self {
        let non_blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Self {
            city: non_blank(&query.city).map(|city| city.to_lowercase()),
            room_type: non_blank(&query.room_type),
            max_rent: non_blank(&query.max_rent).and_then(|raw| raw.parse::<u32>().ok()),
            availability: query
                .availability
                .as_deref()
                .map(AvailabilityFilter::parse)
                .unwrap_or_default(),
        }
    }
}
