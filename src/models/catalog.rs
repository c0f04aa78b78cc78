//! Legacy catalog of cities and airports keyed by IATA code, and the flat
//! `Entity` projection resolved from it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogCity {
    pub id: String,
    #[serde(default)]
    pub name: HashMap<String, String>,
    #[serde(default)]
    pub iata_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogAirport {
    pub id: String,
    #[serde(default)]
    pub name: HashMap<String, String>,
    pub iata_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_id: Option<String>,
    #[serde(default)]
    pub country_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    City,
    Airport,
}

/// A city or airport resolved for one language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub iata_code: String,
    /// Name in the requested language; empty when there is no translation
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub country_id: String,
}

impl Entity {
    /// `language` is expected lowercased
    pub fn from_city(city: &CatalogCity, language: &str) -> Self {
        Self {
            id: city.id.clone(),
            iata_code: city.iata_code.clone(),
            name: city.name.get(language).cloned().unwrap_or_default(),
            entity_type: EntityType::City,
            country_id: city.country_id.clone().unwrap_or_default(),
        }
    }

    /// `language` is expected lowercased
    pub fn from_airport(airport: &CatalogAirport, language: &str) -> Self {
        Self {
            id: airport.id.clone(),
            iata_code: airport.iata_code.clone(),
            name: airport.name.get(language).cloned().unwrap_or_default(),
            entity_type: EntityType::Airport,
            country_id: airport.country_id.clone().unwrap_or_default(),
        }
    }
}
