//! Server configuration.
//!
//! Every section is optional in the TOML file; missing keys take the
//! defaults below. Command-line flags are applied on top by the binary.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::models::RegionType;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub elasticsearch: ElasticsearchConfig,
    pub indices: IndexConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ElasticsearchConfig {
    pub url: String,
    /// Prefix of the per-region-type indices
    pub index_prefix: String,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index_prefix: "geo".to_string(),
        }
    }
}

/// Names of the collections that are not per region type
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    pub polygons: String,
    pub airports: String,
    pub catalog_cities: String,
    pub catalog_airports: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            polygons: "polygons".to_string(),
            airports: "airports".to_string(),
            catalog_cities: "cities_v1".to_string(),
            catalog_airports: "airports_v1".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    pub fn index_names(&self) -> IndexNames {
        IndexNames {
            prefix: self.elasticsearch.index_prefix.clone(),
            indices: self.indices.clone(),
        }
    }
}

/// Resolves concrete index names
#[derive(Debug, Clone, PartialEq)]
pub struct IndexNames {
    prefix: String,
    indices: IndexConfig,
}

impl IndexNames {
    pub fn new(prefix: &str, indices: IndexConfig) -> Self {
        Self {
            prefix: prefix.to_string(),
            indices,
        }
    }

    fn prefixed(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}_{}", self.prefix, name)
        }
    }

    pub fn region(&self, region_type: RegionType) -> String {
        self.prefixed(region_type.as_str())
    }

    pub fn polygons(&self) -> String {
        self.prefixed(&self.indices.polygons)
    }

    pub fn airports(&self) -> String {
        self.prefixed(&self.indices.airports)
    }

    /// Catalog indices are shared with other services and never prefixed
    pub fn catalog_cities(&self) -> &str {
        &self.indices.catalog_cities
    }

    pub fn catalog_airports(&self) -> &str {
        &self.indices.catalog_airports
    }
}

impl Default for IndexNames {
    fn default() -> Self {
        Config::default().index_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.listen, "0.0.0.0:3000");
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml_str(
            r#"
            [elasticsearch]
            index_prefix = "staging"

            [indices]
            polygons = "shapes"
            "#,
        )
        .unwrap();

        assert_eq!(config.elasticsearch.url, "http://localhost:9200");
        let names = config.index_names();
        assert_eq!(names.region(RegionType::MultiCityVicinity), "staging_multi_city_vicinity");
        assert_eq!(names.polygons(), "staging_shapes");
        assert_eq!(names.airports(), "staging_airports");
        assert_eq!(names.catalog_cities(), "cities_v1");
    }

    #[test]
    fn test_empty_prefix() {
        let names = IndexNames::new("", IndexConfig::default());
        assert_eq!(names.region(RegionType::City), "city");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::from_toml_str("[server\nlisten = 1").is_err());
    }
}
