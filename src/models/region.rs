//! Region documents and their geometric counterparts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use super::geometry::{GeoPoint, Geometry};

/// Type of a region. The wire value doubles as the name of the collection
/// the region is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RegionType {
    City,
    Country,
    Continent,
    HighLevelRegion,
    MetroStation,
    ProvinceState,
    MultiCityVicinity,
    PointOfInterest,
    Neighborhood,
    TrainStation,
    Accommodation,
    GeoCoordinates,
}

impl RegionType {
    /// All region types
    pub fn all() -> &'static [RegionType] {
        &[
            RegionType::City,
            RegionType::Country,
            RegionType::Continent,
            RegionType::HighLevelRegion,
            RegionType::MetroStation,
            RegionType::ProvinceState,
            RegionType::MultiCityVicinity,
            RegionType::PointOfInterest,
            RegionType::Neighborhood,
            RegionType::TrainStation,
            RegionType::Accommodation,
            RegionType::GeoCoordinates,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegionType::City => "city",
            RegionType::Country => "country",
            RegionType::Continent => "continent",
            RegionType::HighLevelRegion => "high_level_region",
            RegionType::MetroStation => "metro_station",
            RegionType::ProvinceState => "province_state",
            RegionType::MultiCityVicinity => "multi_city_vicinity",
            RegionType::PointOfInterest => "point_of_interest",
            RegionType::Neighborhood => "neighborhood",
            RegionType::TrainStation => "train_station",
            RegionType::Accommodation => "accommodation",
            RegionType::GeoCoordinates => "geo_coordinates",
        }
    }

    /// URL segment of the read API for this type, if it is exposed there
    pub fn collection_slug(&self) -> Option<&'static str> {
        match self {
            RegionType::Country => Some("countries"),
            RegionType::City => Some("cities"),
            RegionType::HighLevelRegion => Some("high-level-regions"),
            RegionType::Continent => Some("continents"),
            RegionType::MultiCityVicinity => Some("multi-city-vicinities"),
            RegionType::TrainStation => Some("train-stations"),
            RegionType::MetroStation => Some("metro-stations"),
            RegionType::ProvinceState => Some("province-states"),
            RegionType::PointOfInterest => Some("points-of-interest"),
            RegionType::Neighborhood => Some("neighborhoods"),
            RegionType::Accommodation | RegionType::GeoCoordinates => None,
        }
    }

    /// Key under `descendants` holding ids of regions of this type
    pub fn descendants_key(&self) -> Option<&'static str> {
        match self {
            RegionType::City => Some("cities"),
            RegionType::Country => Some("countries"),
            RegionType::PointOfInterest => Some("points_of_interest"),
            RegionType::HighLevelRegion => Some("high_level_regions"),
            RegionType::TrainStation => Some("train_stations"),
            RegionType::MetroStation => Some("metro_stations"),
            RegionType::Neighborhood => Some("neighborhoods"),
            RegionType::MultiCityVicinity => Some("multi_city_vicinities"),
            RegionType::ProvinceState => Some("province_states"),
            RegionType::Accommodation => Some("accommodations"),
            RegionType::Continent | RegionType::GeoCoordinates => None,
        }
    }

    /// Whether regions of this type collect accommodations as descendants
    pub fn accumulates_accommodations(&self) -> bool {
        matches!(
            self,
            RegionType::City | RegionType::MultiCityVicinity | RegionType::Neighborhood
        )
    }
}

impl std::fmt::Display for RegionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RegionType::all()
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown region type '{}'", s))
    }
}

/// Parse a comma-separated list of region types, skipping blanks
pub fn parse_region_types(list: &str) -> Result<Vec<RegionType>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(RegionType::from_str)
        .collect()
}

/// A containing region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestor {
    #[serde(rename = "id")]
    pub external_id: String,
    #[serde(rename = "type")]
    pub region_type: RegionType,
}

/// External ids of contained regions, grouped by type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descendants {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub countries: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points_of_interest: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub high_level_regions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub train_stations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metro_stations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub neighborhoods: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub multi_city_vicinities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub province_states: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accommodations: Vec<String>,
}

impl Descendants {
    /// Descendant ids of a given type
    pub fn get(&self, region_type: RegionType) -> Option<&Vec<String>> {
        match region_type {
            RegionType::City => Some(&self.cities),
            RegionType::Country => Some(&self.countries),
            RegionType::PointOfInterest => Some(&self.points_of_interest),
            RegionType::HighLevelRegion => Some(&self.high_level_regions),
            RegionType::TrainStation => Some(&self.train_stations),
            RegionType::MetroStation => Some(&self.metro_stations),
            RegionType::Neighborhood => Some(&self.neighborhoods),
            RegionType::MultiCityVicinity => Some(&self.multi_city_vicinities),
            RegionType::ProvinceState => Some(&self.province_states),
            RegionType::Accommodation => Some(&self.accommodations),
            RegionType::Continent | RegionType::GeoCoordinates => None,
        }
    }

    /// Whether any descendant of the given type is recorded
    pub fn has(&self, region_type: RegionType) -> bool {
        self.get(region_type).map(|ids| !ids.is_empty()).unwrap_or(false)
    }
}

/// Generic geo-administrative unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Internal id assigned by the store
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Stable business key, unique per region collection
    #[serde(rename = "id")]
    pub external_id: String,

    #[serde(rename = "type")]
    pub region_type: RegionType,

    /// Localized names: {"en": "...", "es": "..."}
    #[serde(default)]
    pub name: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,

    #[serde(default)]
    pub center: GeoPoint,

    #[serde(default)]
    pub ancestors: Vec<Ancestor>,

    #[serde(default)]
    pub descendants: Descendants,
}

impl Region {
    pub fn new(external_id: &str, region_type: RegionType) -> Self {
        Self {
            id: String::new(),
            external_id: external_id.to_string(),
            region_type,
            name: HashMap::new(),
            country_code: None,
            center: GeoPoint::default(),
            ancestors: Vec::new(),
            descendants: Descendants::default(),
        }
    }

    pub fn add_name(&mut self, lang: &str, name: &str) {
        self.name.insert(lang.to_lowercase(), name.to_string());
    }

    /// Record an accommodation as a descendant of this region
    pub fn add_accommodation(&mut self, external_id: &str) {
        self.descendants.accommodations.push(external_id.to_string());
    }

    /// Reduce to the fields returned by a `basic` listing
    pub fn into_basic(self) -> Self {
        Self {
            id: self.id,
            external_id: self.external_id,
            region_type: self.region_type,
            name: self.name,
            ..Region::new("", self.region_type)
        }
    }
}

/// Geometric counterpart of a region.
///
/// `geometry` is absent on the narrow projections returned by intersection
/// queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRegion {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(rename = "id")]
    pub external_id: String,

    #[serde(rename = "type")]
    pub region_type: RegionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
}

impl GeoRegion {
    pub fn new(external_id: &str, region_type: RegionType, geometry: Geometry) -> Self {
        Self {
            id: String::new(),
            external_id: external_id.to_string(),
            region_type,
            geometry: Some(geometry),
        }
    }
}

/// Accommodation as posted for ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccommodationGeometry {
    #[serde(rename = "id", default)]
    pub external_id: String,

    #[serde(default, alias = "location")]
    pub geometry: Option<Geometry>,
}
