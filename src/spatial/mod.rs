//! Spatial query building.
//!
//! Queries are plain values: building one never touches storage, and two
//! builds from the same arguments compare equal. Each store backend renders
//! a [`SpatialQuery`] into its own geospatial operators.

mod cap;

use crate::error::{GeoError, Result};
use crate::models::{GeoPoint, Geometry, RegionType};

pub use cap::{central_angle, spherical_cap};

/// Earth's mean radius used to turn kilometres into an angular radius.
/// Sphere, not ellipsoid.
pub const EARTH_RADIUS_KM: f64 = 6378.1;

/// Fields returned by an intersection query
pub const INTERSECTS_PROJECTION: &[&str] = &["id", "type"];

#[derive(Debug, Clone, PartialEq)]
pub enum SpatialQuery {
    /// Every GeoRegion whose geometry intersects `geometry`
    Intersects {
        geometry: Geometry,
        types: Vec<RegionType>,
        /// Types never returned, applied after `types`
        excluded: Vec<RegionType>,
    },
    /// Every GeoRegion lying inside the spherical cap around `center`
    Nearby {
        center: GeoPoint,
        /// Cap radius in radians
        angular_radius: f64,
        types: Vec<RegionType>,
    },
}

/// Select GeoRegions intersecting `geometry`, optionally restricted to `types`.
pub fn build_intersects(geometry: &Geometry, types: &[RegionType]) -> SpatialQuery {
    SpatialQuery::Intersects {
        geometry: geometry.clone(),
        types: types.to_vec(),
        excluded: Vec::new(),
    }
}

/// Select GeoRegions of any type but `excluded` intersecting `geometry`.
pub fn build_intersects_excluding(geometry: &Geometry, excluded: &[RegionType]) -> SpatialQuery {
    SpatialQuery::Intersects {
        geometry: geometry.clone(),
        types: Vec::new(),
        excluded: excluded.to_vec(),
    }
}

/// Select GeoRegions within `radius_km` of `center`, optionally restricted to `types`.
pub fn build_nearby(center: GeoPoint, radius_km: f64, types: &[RegionType]) -> Result<SpatialQuery> {
    validate_point(center)?;
    if !radius_km.is_finite() || radius_km < 0.0 {
        return Err(GeoError::invalid_parameter(format!(
            "radius must be a non-negative number of kilometres, got {}",
            radius_km
        )));
    }

    Ok(SpatialQuery::Nearby {
        center,
        angular_radius: radius_km / EARTH_RADIUS_KM,
        types: types.to_vec(),
    })
}

/// Check latitude/longitude ranges
pub fn validate_point(point: GeoPoint) -> Result<()> {
    if !(-90.0..=90.0).contains(&point.lat) {
        return Err(GeoError::invalid_parameter(format!(
            "latitude must be within [-90, 90], got {}",
            point.lat
        )));
    }
    if !(-180.0..=180.0).contains(&point.lon) {
        return Err(GeoError::invalid_parameter(format!(
            "longitude must be within [-180, 180], got {}",
            point.lon
        )));
    }
    Ok(())
}

impl SpatialQuery {
    /// Region type filter; empty means every type
    pub fn types(&self) -> &[RegionType] {
        match self {
            SpatialQuery::Intersects { types, .. } | SpatialQuery::Nearby { types, .. } => types,
        }
    }

    /// Fields to project back, `None` for full documents
    pub fn projection(&self) -> Option<&'static [&'static str]> {
        match self {
            SpatialQuery::Intersects { .. } => Some(INTERSECTS_PROJECTION),
            SpatialQuery::Nearby { .. } => None,
        }
    }

    /// Types filtered out; only intersection queries exclude
    pub fn excluded(&self) -> &[RegionType] {
        match self {
            SpatialQuery::Intersects { excluded, .. } => excluded,
            SpatialQuery::Nearby { .. } => &[],
        }
    }

    pub fn accepts_type(&self, region_type: RegionType) -> bool {
        let types = self.types();
        (types.is_empty() || types.contains(&region_type))
            && !self.excluded().contains(&region_type)
    }

    /// Evaluate the geometric predicate against a stored geometry.
    ///
    /// Used by stores without a native geospatial index.
    pub fn matches_geometry(&self, stored: &Geometry) -> bool {
        match self {
            SpatialQuery::Intersects { geometry, .. } => {
                use geo::Intersects;
                geometry.to_geo().intersects(&stored.to_geo())
            }
            SpatialQuery::Nearby {
                center,
                angular_radius,
                ..
            } => {
                let positions = stored.positions();
                !positions.is_empty()
                    && positions.iter().all(|p| {
                        GeoPoint::from_position(p)
                            .map(|point| central_angle(*center, point) <= *angular_radius)
                            .unwrap_or(false)
                    })
            }
        }
    }
}
