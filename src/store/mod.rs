//! Storage boundary.
//!
//! The service never talks to a concrete database; it receives trait objects
//! so the Elasticsearch backend and the in-memory backend are interchangeable.

mod memory;

use async_trait::async_trait;

use crate::error::{GeoError, Result};
use crate::models::{Airport, CatalogAirport, CatalogCity, GeoRegion, Region, RegionType};
use crate::spatial::SpatialQuery;

pub use memory::{MemoryStore, StoreOp};

/// Restrict results to regions whose ancestors include one of `ids` of
/// `region_type`, where none of the ancestors has the queried type itself.
#[derive(Debug, Clone, PartialEq)]
pub struct AncestorFilter {
    pub ids: Vec<String>,
    pub region_type: RegionType,
}

/// Filter for listing regions of one type
#[derive(Debug, Clone, PartialEq)]
pub struct RegionQuery {
    pub region_type: RegionType,
    pub external_ids: Vec<String>,
    /// Descendant types that must be present
    pub descendants: Vec<RegionType>,
    pub country_code: Option<String>,
    pub ancestors: Option<AncestorFilter>,
    /// Return only id, type and name
    pub basic: bool,
    /// 1-based; pagination applies only when both page and limit are > 0
    pub page: usize,
    pub limit: usize,
}

impl RegionQuery {
    pub fn new(region_type: RegionType) -> Self {
        Self {
            region_type,
            external_ids: Vec::new(),
            descendants: Vec::new(),
            country_code: None,
            ancestors: None,
            basic: false,
            page: 0,
            limit: 0,
        }
    }

    /// `(skip, limit)` when the query is paginated. Fails when the offset
    /// does not fit in a `usize`.
    pub fn window(&self) -> Result<Option<(usize, usize)>> {
        if self.page == 0 || self.limit == 0 {
            return Ok(None);
        }
        let skip = (self.page - 1).checked_mul(self.limit).ok_or_else(|| {
            GeoError::invalid_parameter(format!(
                "page {} with limit {} is out of range",
                self.page, self.limit
            ))
        })?;
        Ok(Some((skip, self.limit)))
    }

    /// Evaluate the filter against a region document
    pub fn matches(&self, region: &Region) -> bool {
        if !self.external_ids.is_empty() && !self.external_ids.contains(&region.external_id) {
            return false;
        }

        if !self.descendants.iter().all(|t| region.descendants.has(*t)) {
            return false;
        }

        if let Some(ref code) = self.country_code {
            if region.country_code.as_deref() != Some(code.as_str()) {
                return false;
            }
        }

        if let Some(ref filter) = self.ancestors {
            let has_type = region
                .ancestors
                .iter()
                .any(|a| a.region_type == filter.region_type);
            let has_own_type = region
                .ancestors
                .iter()
                .any(|a| a.region_type == self.region_type);
            let has_id = region
                .ancestors
                .iter()
                .any(|a| filter.ids.contains(&a.external_id));
            if !has_type || has_own_type || !has_id {
                return false;
            }
        }

        true
    }
}

/// Filter for listing airports
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AirportQuery {
    pub country_code: Option<String>,
    pub iata_codes: Vec<String>,
}

impl AirportQuery {
    pub fn matches(&self, airport: &Airport) -> bool {
        if !self.iata_codes.is_empty() && !self.iata_codes.contains(&airport.iata_code) {
            return false;
        }
        match self.country_code {
            Some(ref code) => &airport.country_code == code,
            None => true,
        }
    }
}

/// Regions, airports and region geometries
#[async_trait]
pub trait RegionStore: Send + Sync {
    /// Whether the backend answers
    async fn ping(&self) -> bool;

    async fn get_region(&self, region_type: RegionType, external_id: &str) -> Result<Region>;

    /// Never fails with not-found; no match is an empty list
    async fn get_regions(&self, query: &RegionQuery) -> Result<Vec<Region>>;

    async fn get_country_by_code(&self, country_code: &str) -> Result<Region>;

    async fn count(&self, region_type: RegionType) -> Result<u64>;

    /// Insert with a freshly assigned internal id
    async fn save_region(&self, region: Region) -> Result<Region>;

    /// Replace the region with the same type and external id
    async fn update_region(&self, region: &Region) -> Result<()>;

    async fn save_airport(&self, airport: Airport) -> Result<Airport>;

    /// Replace the airport with the same IATA code
    async fn update_airport(&self, airport: &Airport) -> Result<()>;

    async fn get_airport_by_iata(&self, iata_code: &str) -> Result<Airport>;

    async fn get_airports(&self, query: &AirportQuery) -> Result<Vec<Airport>>;

    async fn get_geo_region(&self, external_id: &str) -> Result<GeoRegion>;

    /// Insert with a freshly assigned internal id
    async fn save_geo_region(&self, region: GeoRegion) -> Result<GeoRegion>;

    async fn update_geo_region(&self, region: &GeoRegion) -> Result<()>;

    /// Run a spatial query; no match is an empty list
    async fn find_geo_regions(&self, query: &SpatialQuery) -> Result<Vec<GeoRegion>>;
}

/// Legacy city/airport catalog searched by IATA code
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_cities(&self, iata_codes: &[String]) -> Result<Vec<CatalogCity>>;

    async fn find_airports(&self, iata_codes: &[String]) -> Result<Vec<CatalogAirport>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ancestor;

    fn city_in(country: &str) -> Region {
        let mut region = Region::new("c1", RegionType::City);
        region.ancestors.push(Ancestor {
            external_id: country.to_string(),
            region_type: RegionType::Country,
        });
        region
    }

    #[test]
    fn test_window() {
        let mut q = RegionQuery::new(RegionType::City);
        assert_eq!(q.window().unwrap(), None);
        q.page = 3;
        q.limit = 20;
        assert_eq!(q.window().unwrap(), Some((40, 20)));
    }

    #[test]
    fn test_window_offset_overflow() {
        let mut q = RegionQuery::new(RegionType::City);
        q.page = usize::MAX;
        q.limit = 2;
        assert!(matches!(q.window(), Err(GeoError::InvalidParameter(_))));

        // the first page never overflows
        q.page = 1;
        q.limit = usize::MAX;
        assert_eq!(q.window().unwrap(), Some((0, usize::MAX)));
    }

    #[test]
    fn test_ancestor_filter() {
        let mut q = RegionQuery::new(RegionType::City);
        q.ancestors = Some(AncestorFilter {
            ids: vec!["AR".to_string()],
            region_type: RegionType::Country,
        });

        assert!(q.matches(&city_in("AR")));
        assert!(!q.matches(&city_in("BR")));

        // a city nested under another city is excluded
        let mut nested = city_in("AR");
        nested.ancestors.push(Ancestor {
            external_id: "c0".to_string(),
            region_type: RegionType::City,
        });
        assert!(!q.matches(&nested));
    }

    #[test]
    fn test_descendants_and_country_filter() {
        let mut q = RegionQuery::new(RegionType::City);
        q.descendants = vec![RegionType::Accommodation];
        q.country_code = Some("AR".to_string());

        let mut region = city_in("AR");
        region.country_code = Some("AR".to_string());
        assert!(!q.matches(&region));

        region.add_accommodation("acc-1");
        assert!(q.matches(&region));
    }

    #[test]
    fn test_airport_query() {
        let mut airport = Airport::new("EZE");
        airport.country_code = "AR".to_string();

        let q = AirportQuery {
            country_code: Some("AR".to_string()),
            iata_codes: vec!["EZE".to_string(), "AEP".to_string()],
        };
        assert!(q.matches(&airport));
        assert!(!AirportQuery {
            country_code: Some("BR".to_string()),
            iata_codes: vec![],
        }
        .matches(&airport));
        assert!(AirportQuery::default().matches(&airport));
    }
}
