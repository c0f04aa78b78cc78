//! Service layer: the workflows built on top of the stores.

mod accommodation;
mod entities;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{GeoPoint, GeoRegion, Geometry, Region, RegionType};
use crate::spatial::{build_intersects, build_intersects_excluding, build_nearby, validate_point};
use crate::store::{AncestorFilter, CatalogStore, RegionQuery, RegionStore};

pub use accommodation::{AccommodationReport, AncestorOutcome, AncestorUpdate};
pub use entities::merge_branches;

/// Geo reference operations over injected stores
#[derive(Clone)]
pub struct GeoService {
    regions: Arc<dyn RegionStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl GeoService {
    pub fn new(regions: Arc<dyn RegionStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { regions, catalog }
    }

    /// Direct store access for plain reads and writes
    pub fn store(&self) -> &dyn RegionStore {
        self.regions.as_ref()
    }

    /// GeoRegions intersecting a geometry (narrow projection)
    pub async fn intersected(
        &self,
        geometry: &Geometry,
        types: &[RegionType],
    ) -> Result<Vec<GeoRegion>> {
        self.regions
            .find_geo_regions(&build_intersects(geometry, types))
            .await
    }

    /// GeoRegions containing a point
    pub async fn intersections(
        &self,
        lat: f64,
        lon: f64,
        types: &[RegionType],
    ) -> Result<Vec<GeoRegion>> {
        validate_point(GeoPoint::new(lat, lon))?;
        self.intersected(&Geometry::point(lon, lat), types).await
    }

    /// The region of each type containing a point, skipping `excluded` types.
    ///
    /// When several regions of one type contain the point, the last one in
    /// id order wins. Intersected GeoRegions without a Region document are
    /// left out.
    pub async fn intersections_by_type(
        &self,
        lat: f64,
        lon: f64,
        excluded: &[RegionType],
    ) -> Result<BTreeMap<RegionType, Region>> {
        validate_point(GeoPoint::new(lat, lon))?;
        let query = build_intersects_excluding(&Geometry::point(lon, lat), excluded);
        let hits = self.regions.find_geo_regions(&query).await?;

        let mut by_type = BTreeMap::new();
        for hit in hits {
            match self.regions.get_region(hit.region_type, &hit.external_id).await {
                Ok(region) => {
                    by_type.insert(hit.region_type, region);
                }
                Err(e) if e.is_not_found() => {
                    warn!(region_type = %hit.region_type, region_id = %hit.external_id, "Intersected region has no document");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(by_type)
    }

    /// GeoRegions lying within `radius_km` of a point
    pub async fn nearby_regions(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
        types: &[RegionType],
    ) -> Result<Vec<GeoRegion>> {
        let query = build_nearby(GeoPoint::new(lat, lon), radius_km, types)?;
        self.regions.find_geo_regions(&query).await
    }

    /// List regions. For non-country types a country code is resolved to
    /// the country and applied as an ancestor filter instead.
    pub async fn regions_by_query(&self, mut query: RegionQuery) -> Result<Vec<Region>> {
        if query.region_type != RegionType::Country {
            if let Some(code) = query.country_code.take() {
                let country = self.regions.get_country_by_code(&code).await?;
                debug!("Country code {} resolved to {}", code, country.external_id);
                query.ancestors = Some(AncestorFilter {
                    ids: vec![country.external_id],
                    region_type: RegionType::Country,
                });
            }
        }

        self.regions.get_regions(&query).await
    }
}
