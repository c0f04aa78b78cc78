//! Airport documents.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coordinates in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

/// Region an airport serves
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirportRegion {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub region_type: String,
    #[serde(default)]
    pub name: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    /// Internal id assigned by the store
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    pub iata_code: String,

    #[serde(default)]
    pub name: HashMap<String, String>,

    #[serde(default)]
    pub country_code: String,

    #[serde(default)]
    pub coordinates: Coordinates,

    #[serde(default)]
    pub region: AirportRegion,
}

impl Airport {
    pub fn new(iata_code: &str) -> Self {
        Self {
            id: String::new(),
            iata_code: iata_code.to_string(),
            name: HashMap::new(),
            country_code: String::new(),
            coordinates: Coordinates::default(),
            region: AirportRegion::default(),
        }
    }
}
