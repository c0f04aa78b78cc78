//! In-memory store.
//!
//! Collections live in plain vectors; GeoRegion envelopes are indexed in an
//! R-tree and candidates are confirmed with exact `geo` predicates. Any
//! operation can be switched to fail with a backend fault, which lets the
//! workflow tests exercise degraded paths.

use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use geo::BoundingRect;
use hashbrown::{HashMap, HashSet};
use rstar::{RTree, RTreeObject, AABB};
use tracing::debug;
use uuid::Uuid;

use super::{AirportQuery, CatalogStore, RegionQuery, RegionStore};
use crate::error::{GeoError, Result};
use crate::models::{
    Airport, CatalogAirport, CatalogCity, GeoRegion, Geometry, Region, RegionType,
};
use crate::spatial::SpatialQuery;

/// Store operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetRegion,
    GetRegions,
    SaveRegion,
    UpdateRegion,
    GetAirport,
    SaveAirport,
    UpdateAirport,
    GetGeoRegion,
    SaveGeoRegion,
    UpdateGeoRegion,
    FindGeoRegions,
    FindCatalogCities,
    FindCatalogAirports,
}

/// R-tree entry pointing at a slot of `State::geo_regions`
#[derive(Debug, Clone, PartialEq)]
struct IndexedGeoRegion {
    slot: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedGeoRegion {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedGeoRegion {
    fn new(slot: usize, geometry: &Geometry) -> Option<Self> {
        let rect = geometry.to_geo().bounding_rect()?;
        Some(Self {
            slot,
            envelope: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
        })
    }
}

struct State {
    regions: HashMap<RegionType, Vec<Region>>,
    airports: Vec<Airport>,
    geo_regions: Vec<GeoRegion>,
    geo_index: RTree<IndexedGeoRegion>,
    catalog_cities: Vec<CatalogCity>,
    catalog_airports: Vec<CatalogAirport>,
    failing: HashSet<StoreOp>,
}

impl State {
    fn new() -> Self {
        Self {
            regions: HashMap::new(),
            airports: Vec::new(),
            geo_regions: Vec::new(),
            geo_index: RTree::new(),
            catalog_cities: Vec::new(),
            catalog_airports: Vec::new(),
            failing: HashSet::new(),
        }
    }

    fn check(&self, op: StoreOp) -> Result<()> {
        if self.failing.contains(&op) {
            return Err(GeoError::BackendFault(anyhow!("simulated {:?} failure", op)));
        }
        Ok(())
    }

    fn geo_slot(&self, external_id: &str) -> Option<usize> {
        self.geo_regions
            .iter()
            .position(|r| r.external_id == external_id)
    }
}

pub struct MemoryStore {
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::new()),
        }
    }

    /// Make every subsequent call of `op` fail with a backend fault
    pub fn fail_on(&self, op: StoreOp) {
        self.lock().failing.insert(op);
    }

    /// Undo [`MemoryStore::fail_on`]
    pub fn recover(&self, op: StoreOp) {
        self.lock().failing.remove(&op);
    }

    pub fn add_catalog_city(&self, city: CatalogCity) {
        self.lock().catalog_cities.push(city);
    }

    pub fn add_catalog_airport(&self, airport: CatalogAirport) {
        self.lock().catalog_airports.push(airport);
    }

    /// Number of stored GeoRegions
    pub fn geo_region_count(&self) -> usize {
        self.lock().geo_regions.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep going
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RegionStore for MemoryStore {
    async fn ping(&self) -> bool {
        true
    }

    async fn get_region(&self, region_type: RegionType, external_id: &str) -> Result<Region> {
        let state = self.lock();
        state.check(StoreOp::GetRegion)?;

        state
            .regions
            .get(&region_type)
            .and_then(|regions| regions.iter().find(|r| r.external_id == external_id))
            .cloned()
            .ok_or_else(|| GeoError::not_found(format!("{} {}", region_type, external_id)))
    }

    async fn get_regions(&self, query: &RegionQuery) -> Result<Vec<Region>> {
        let state = self.lock();
        state.check(StoreOp::GetRegions)?;

        let matching = state
            .regions
            .get(&query.region_type)
            .map(|regions| regions.iter().filter(|r| query.matches(r)))
            .into_iter()
            .flatten();

        let (skip, limit) = query.window()?.unwrap_or((0, usize::MAX));
        let regions = matching
            .skip(skip)
            .take(limit)
            .cloned()
            .map(|r| if query.basic { r.into_basic() } else { r })
            .collect();

        Ok(regions)
    }

    async fn get_country_by_code(&self, country_code: &str) -> Result<Region> {
        if country_code.is_empty() {
            return Err(GeoError::missing("country_code"));
        }

        let state = self.lock();
        state.check(StoreOp::GetRegion)?;

        state
            .regions
            .get(&RegionType::Country)
            .and_then(|regions| {
                regions
                    .iter()
                    .find(|r| r.country_code.as_deref() == Some(country_code))
            })
            .cloned()
            .ok_or_else(|| GeoError::not_found(format!("country {}", country_code)))
    }

    async fn count(&self, region_type: RegionType) -> Result<u64> {
        let state = self.lock();
        state.check(StoreOp::GetRegions)?;
        Ok(state.regions.get(&region_type).map_or(0, |r| r.len() as u64))
    }

    async fn save_region(&self, mut region: Region) -> Result<Region> {
        let mut state = self.lock();
        state.check(StoreOp::SaveRegion)?;

        region.id = Uuid::new_v4().to_string();
        state
            .regions
            .entry(region.region_type)
            .or_default()
            .push(region.clone());
        Ok(region)
    }

    async fn update_region(&self, region: &Region) -> Result<()> {
        let mut state = self.lock();
        state.check(StoreOp::UpdateRegion)?;

        let existing = state
            .regions
            .get_mut(&region.region_type)
            .and_then(|regions| {
                regions
                    .iter_mut()
                    .find(|r| r.external_id == region.external_id)
            })
            .ok_or_else(|| {
                GeoError::not_found(format!("{} {}", region.region_type, region.external_id))
            })?;

        let id = std::mem::take(&mut existing.id);
        *existing = region.clone();
        existing.id = id;
        Ok(())
    }

    async fn save_airport(&self, mut airport: Airport) -> Result<Airport> {
        let mut state = self.lock();
        state.check(StoreOp::SaveAirport)?;

        airport.id = Uuid::new_v4().to_string();
        state.airports.push(airport.clone());
        Ok(airport)
    }

    async fn update_airport(&self, airport: &Airport) -> Result<()> {
        let mut state = self.lock();
        state.check(StoreOp::UpdateAirport)?;

        let existing = state
            .airports
            .iter_mut()
            .find(|a| a.iata_code == airport.iata_code)
            .ok_or_else(|| GeoError::not_found(format!("airport {}", airport.iata_code)))?;

        let id = std::mem::take(&mut existing.id);
        *existing = airport.clone();
        existing.id = id;
        Ok(())
    }

    async fn get_airport_by_iata(&self, iata_code: &str) -> Result<Airport> {
        let state = self.lock();
        state.check(StoreOp::GetAirport)?;

        state
            .airports
            .iter()
            .find(|a| a.iata_code == iata_code)
            .cloned()
            .ok_or_else(|| GeoError::not_found(format!("airport {}", iata_code)))
    }

    async fn get_airports(&self, query: &AirportQuery) -> Result<Vec<Airport>> {
        let state = self.lock();
        state.check(StoreOp::GetAirport)?;

        Ok(state
            .airports
            .iter()
            .filter(|a| query.matches(a))
            .cloned()
            .collect())
    }

    async fn get_geo_region(&self, external_id: &str) -> Result<GeoRegion> {
        let state = self.lock();
        state.check(StoreOp::GetGeoRegion)?;

        state
            .geo_slot(external_id)
            .map(|slot| state.geo_regions[slot].clone())
            .ok_or_else(|| GeoError::not_found(format!("geo region {}", external_id)))
    }

    async fn save_geo_region(&self, mut region: GeoRegion) -> Result<GeoRegion> {
        let mut state = self.lock();
        state.check(StoreOp::SaveGeoRegion)?;

        let geometry = region
            .geometry
            .as_ref()
            .ok_or_else(|| GeoError::missing("geometry"))?;

        let slot = state.geo_regions.len();
        if let Some(entry) = IndexedGeoRegion::new(slot, geometry) {
            state.geo_index.insert(entry);
        }

        region.id = Uuid::new_v4().to_string();
        state.geo_regions.push(region.clone());

        debug!(
            "Stored geo region {} ({}) at slot {}",
            region.external_id, region.region_type, slot
        );
        Ok(region)
    }

    async fn update_geo_region(&self, region: &GeoRegion) -> Result<()> {
        let mut state = self.lock();
        state.check(StoreOp::UpdateGeoRegion)?;

        let geometry = region
            .geometry
            .as_ref()
            .ok_or_else(|| GeoError::missing("geometry"))?;
        let slot = state
            .geo_slot(&region.external_id)
            .ok_or_else(|| GeoError::not_found(format!("geo region {}", region.external_id)))?;

        let stale = state.geo_regions[slot]
            .geometry
            .as_ref()
            .and_then(|g| IndexedGeoRegion::new(slot, g));
        if let Some(stale) = stale {
            state.geo_index.remove(&stale);
        }
        if let Some(entry) = IndexedGeoRegion::new(slot, geometry) {
            state.geo_index.insert(entry);
        }

        let id = std::mem::take(&mut state.geo_regions[slot].id);
        state.geo_regions[slot] = region.clone();
        state.geo_regions[slot].id = id;
        Ok(())
    }

    async fn find_geo_regions(&self, query: &SpatialQuery) -> Result<Vec<GeoRegion>> {
        let state = self.lock();
        state.check(StoreOp::FindGeoRegions)?;

        let mut slots: Vec<usize> = match query {
            SpatialQuery::Intersects { geometry, .. } => match IndexedGeoRegion::new(0, geometry) {
                Some(probe) => state
                    .geo_index
                    .locate_in_envelope_intersecting(&probe.envelope)
                    .map(|entry| entry.slot)
                    .collect(),
                None => Vec::new(),
            },
            // Caps can wrap the poles or the antimeridian; scan everything
            SpatialQuery::Nearby { .. } => (0..state.geo_regions.len()).collect(),
        };
        slots.sort_unstable();

        let narrow = query.projection().is_some();
        let regions = slots
            .into_iter()
            .map(|slot| &state.geo_regions[slot])
            .filter(|r| query.accepts_type(r.region_type))
            .filter(|r| {
                r.geometry
                    .as_ref()
                    .map(|g| query.matches_geometry(g))
                    .unwrap_or(false)
            })
            .map(|r| {
                let mut r = r.clone();
                if narrow {
                    r.id.clear();
                    r.geometry = None;
                }
                r
            })
            .collect();

        Ok(regions)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_cities(&self, iata_codes: &[String]) -> Result<Vec<CatalogCity>> {
        let state = self.lock();
        state.check(StoreOp::FindCatalogCities)?;

        Ok(state
            .catalog_cities
            .iter()
            .filter(|c| iata_codes.contains(&c.iata_code))
            .cloned()
            .collect())
    }

    async fn find_airports(&self, iata_codes: &[String]) -> Result<Vec<CatalogAirport>> {
        let state = self.lock();
        state.check(StoreOp::FindCatalogAirports)?;

        Ok(state
            .catalog_airports
            .iter()
            .filter(|a| iata_codes.contains(&a.iata_code))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use crate::spatial::{build_intersects, build_nearby};

    fn square(min_x: f64, min_y: f64, size: f64) -> Geometry {
        Geometry::Polygon(vec![vec![
            vec![min_x, min_y],
            vec![min_x + size, min_y],
            vec![min_x + size, min_y + size],
            vec![min_x, min_y + size],
            vec![min_x, min_y],
        ]])
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, region_type, geometry) in [
            ("AR", RegionType::Country, square(-75.0, -56.0, 25.0)),
            ("BA", RegionType::City, square(-59.0, -35.0, 1.0)),
            ("PAL", RegionType::Neighborhood, square(-58.5, -34.7, 0.2)),
            ("MVD", RegionType::City, square(-56.5, -35.0, 0.5)),
        ] {
            store
                .save_geo_region(GeoRegion::new(id, region_type, geometry))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_intersects_returns_narrow_projection() {
        let store = seeded().await;
        let query = build_intersects(&Geometry::point(-58.4, -34.6), &[]);

        let found = store.find_geo_regions(&query).await.unwrap();
        let ids: Vec<_> = found.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["AR", "BA", "PAL"]);
        assert!(found.iter().all(|r| r.geometry.is_none() && r.id.is_empty()));
    }

    #[tokio::test]
    async fn test_intersects_with_type_filter() {
        let store = seeded().await;
        let query = build_intersects(&Geometry::point(-58.4, -34.6), &[RegionType::City]);

        let found = store.find_geo_regions(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].external_id, "BA");
    }

    #[tokio::test]
    async fn test_no_match_is_empty_not_error() {
        let store = seeded().await;
        let query = build_intersects(&Geometry::point(100.0, 40.0), &[]);
        assert!(store.find_geo_regions(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nearby_returns_full_documents() {
        let store = seeded().await;
        let query = build_nearby(GeoPoint::new(-34.6, -58.4), 50.0, &[]).unwrap();

        let found = store.find_geo_regions(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].external_id, "PAL");
        assert!(found[0].geometry.is_some());
    }

    #[tokio::test]
    async fn test_update_geo_region_reindexes() {
        let store = seeded().await;
        let moved = GeoRegion::new("MVD", RegionType::City, square(100.0, 40.0, 1.0));
        store.update_geo_region(&moved).await.unwrap();

        let here = build_intersects(&Geometry::point(-56.2, -34.8), &[RegionType::City]);
        assert!(store.find_geo_regions(&here).await.unwrap().is_empty());

        let there = build_intersects(&Geometry::point(100.5, 40.5), &[]);
        let found = store.find_geo_regions(&there).await.unwrap();
        assert_eq!(found[0].external_id, "MVD");

        let stored = store.get_geo_region("MVD").await.unwrap();
        assert!(!stored.id.is_empty());
    }

    #[tokio::test]
    async fn test_save_geo_region_requires_geometry() {
        let store = MemoryStore::new();
        let region = GeoRegion {
            id: String::new(),
            external_id: "x".to_string(),
            region_type: RegionType::City,
            geometry: None,
        };
        let err = store.save_geo_region(region).await.unwrap_err();
        assert!(matches!(err, GeoError::MissingParameters(_)));
    }

    #[tokio::test]
    async fn test_regions_pagination_and_basic() {
        let store = MemoryStore::new();
        for i in 0..5 {
            let mut region = Region::new(&format!("c{}", i), RegionType::City);
            region.add_name("en", &format!("City {}", i));
            region.country_code = Some("AR".to_string());
            store.save_region(region).await.unwrap();
        }

        let mut query = RegionQuery::new(RegionType::City);
        query.page = 2;
        query.limit = 2;
        query.basic = true;

        let page = store.get_regions(&query).await.unwrap();
        let ids: Vec<_> = page.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c3"]);
        assert!(page.iter().all(|r| r.country_code.is_none()));
        assert_eq!(store.count(RegionType::City).await.unwrap(), 5);

        let empty = store
            .get_regions(&RegionQuery::new(RegionType::Continent))
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_page_is_rejected() {
        let store = MemoryStore::new();
        store.save_region(Region::new("c0", RegionType::City)).await.unwrap();

        let mut query = RegionQuery::new(RegionType::City);
        query.page = usize::MAX / 2;
        query.limit = 10;
        assert!(matches!(
            store.get_regions(&query).await,
            Err(GeoError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_update_missing_region_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_region(&Region::new("nope", RegionType::City))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_country_by_code() {
        let store = MemoryStore::new();
        let mut country = Region::new("AR", RegionType::Country);
        country.country_code = Some("AR".to_string());
        store.save_region(country).await.unwrap();

        assert_eq!(
            store.get_country_by_code("AR").await.unwrap().external_id,
            "AR"
        );
        assert!(store.get_country_by_code("BR").await.unwrap_err().is_not_found());
        assert!(matches!(
            store.get_country_by_code("").await,
            Err(GeoError::MissingParameters(_))
        ));
    }

    #[tokio::test]
    async fn test_fail_on_and_recover() {
        let store = MemoryStore::new();
        store.fail_on(StoreOp::FindCatalogCities);
        assert!(matches!(
            store.find_cities(&["EZE".to_string()]).await,
            Err(GeoError::BackendFault(_))
        ));

        store.recover(StoreOp::FindCatalogCities);
        assert!(store.find_cities(&["EZE".to_string()]).await.unwrap().is_empty());
    }
}
