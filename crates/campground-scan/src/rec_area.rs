use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::availability::DatedAvailability;

/// Identifier stored either as a JSON number or as a string.
/// Written back in whichever form it was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlexibleId {
    /// Stored as a JSON number
    Number(u64),
    /// Stored as a JSON string
    Text(String),
}

impl FlexibleId {
    /// Numeric value, if the id is a number or a numeric string
    pub fn as_number(&self) -> Option<u64> {
        match self {
            FlexibleId::Number(n) => Some(*n),
            FlexibleId::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Whether the id carries no value at all
    pub fn is_blank(&self) -> bool {
        matches!(self, FlexibleId::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for FlexibleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlexibleId::Number(n) => write!(f, "{}", n),
            FlexibleId::Text(s) => match s.trim().parse::<u64>() {
                Ok(n) => write!(f, "{}", n),
                Err(_) => write!(f, "{}", s.trim()),
            },
        }
    }
}

/// A bookable site grouping (campground) inside a recreation area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    /// Display name
    #[serde(rename = "FacilityName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Id used by the reservation site's calendar URLs
    #[serde(
        rename = "LegacyFacilityID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub legacy_facility_id: Option<FlexibleId>,

    /// Calendar page for the start of the last enrichment window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_url: Option<String>,

    /// Open slots per date found by the last enrichment pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation: Option<DatedAvailability>,

    /// Every other field of the stored record, kept untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Facility {
    /// Legacy id as a number, or `None` when the facility cannot be scraped
    pub fn legacy_id(&self) -> Option<u64> {
        self.legacy_facility_id
            .as_ref()
            .filter(|id| !id.is_blank())
            .and_then(FlexibleId::as_number)
            .filter(|id| *id != 0)
    }
}

/// A recreation area record, the unit of storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecArea {
    /// Area identifier; also the storage key
    #[serde(rename = "RecAreaID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FlexibleId>,

    /// Display name
    #[serde(rename = "RecAreaName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Facilities of the area; records without this field are not enriched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilities: Option<Vec<Facility>>,

    /// Every other field of the stored record, kept untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecArea {
    /// Storage key derived from the area's own identifier
    pub fn key(&self) -> Option<String> {
        self.id
            .as_ref()
            .filter(|id| !id.is_blank())
            .map(|id| id.to_string())
    }

    /// Name used in log lines
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}
