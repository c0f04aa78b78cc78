//! Accommodation ingestion.
//!
//! Storage offers no cross-document transactions, so the workflow is not
//! atomic: ancestor updates that succeeded stay in place even when the final
//! insert fails. The report spells out what happened to every region.

use tracing::{error, info, warn};

use super::GeoService;
use crate::error::{GeoError, Result};
use crate::models::{AccommodationGeometry, GeoRegion, RegionType};
use crate::store::RegionStore;

/// What happened to one intersected region
#[derive(Debug, Clone, PartialEq)]
pub enum AncestorOutcome {
    /// The accommodation is recorded as a descendant
    Linked,
    /// Regions of this type do not collect accommodations
    NotEligible,
    /// No Region document for the intersected GeoRegion
    Missing { reason: String },
    /// Lookup or update failed in the backend
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AncestorUpdate {
    pub external_id: String,
    pub region_type: RegionType,
    pub outcome: AncestorOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccommodationReport {
    /// The stored accommodation GeoRegion
    pub accommodation: GeoRegion,
    /// Regions the accommodation's geometry intersects
    pub intersected: Vec<GeoRegion>,
    pub ancestors: Vec<AncestorUpdate>,
}

impl AccommodationReport {
    /// Regions that ended up linked to the accommodation
    pub fn linked(&self) -> impl Iterator<Item = &AncestorUpdate> {
        self.ancestors
            .iter()
            .filter(|u| u.outcome == AncestorOutcome::Linked)
    }

    /// Whether any ancestor could not be updated
    pub fn is_degraded(&self) -> bool {
        self.ancestors.iter().any(|u| {
            matches!(
                u.outcome,
                AncestorOutcome::Missing { .. } | AncestorOutcome::Failed { .. }
            )
        })
    }
}

impl GeoService {
    /// Link an accommodation to the regions it lies in, then store it.
    ///
    /// Aborts when the intersection lookup or the final insert fails;
    /// problems with single ancestors are reported, not raised.
    pub async fn insert_accommodation(
        &self,
        accommodation: AccommodationGeometry,
    ) -> Result<AccommodationReport> {
        if accommodation.external_id.is_empty() {
            return Err(GeoError::missing("id"));
        }
        let geometry = accommodation
            .geometry
            .ok_or_else(|| GeoError::missing("geometry"))?;
        let external_id = accommodation.external_id;

        let intersected = self.intersected(&geometry, &[]).await?;

        let mut ancestors = Vec::with_capacity(intersected.len());
        for geo_region in &intersected {
            let outcome = self.link_ancestor(geo_region, &external_id).await;
            ancestors.push(AncestorUpdate {
                external_id: geo_region.external_id.clone(),
                region_type: geo_region.region_type,
                outcome,
            });
        }

        let accommodation = self
            .regions
            .save_geo_region(GeoRegion::new(
                &external_id,
                RegionType::Accommodation,
                geometry,
            ))
            .await?;

        let report = AccommodationReport {
            accommodation,
            intersected,
            ancestors,
        };
        info!(
            accommodation = %external_id,
            intersected = report.intersected.len(),
            linked = report.linked().count(),
            "Accommodation stored"
        );
        Ok(report)
    }

    async fn link_ancestor(&self, geo_region: &GeoRegion, accommodation_id: &str) -> AncestorOutcome {
        let region_type = geo_region.region_type;
        let region_id = geo_region.external_id.as_str();

        let mut region = match self.regions.get_region(region_type, region_id).await {
            Ok(region) => region,
            Err(e) if e.is_not_found() => {
                warn!(region_type = %region_type, region_id, "Intersected region has no document");
                return AncestorOutcome::Missing {
                    reason: e.to_string(),
                };
            }
            Err(e) => {
                error!(region_type = %region_type, region_id, "Region lookup failed: {}", e);
                return AncestorOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        if !region_type.accumulates_accommodations() {
            return AncestorOutcome::NotEligible;
        }
        if region
            .descendants
            .accommodations
            .iter()
            .any(|id| id == accommodation_id)
        {
            return AncestorOutcome::Linked;
        }

        region.add_accommodation(accommodation_id);
        match self.regions.update_region(&region).await {
            Ok(()) => AncestorOutcome::Linked,
            Err(e) => {
                error!(region_type = %region_type, region_id, "Region update failed: {}", e);
                AncestorOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{Geometry, Region};
    use crate::store::{MemoryStore, StoreOp};

    fn square(min_x: f64, min_y: f64, size: f64) -> Geometry {
        Geometry::Polygon(vec![vec![
            vec![min_x, min_y],
            vec![min_x + size, min_y],
            vec![min_x + size, min_y + size],
            vec![min_x, min_y + size],
            vec![min_x, min_y],
        ]])
    }

    /// Country, city and neighborhood around (-58.4, -34.6); the
    /// neighborhood has no Region document.
    async fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for (id, region_type, geometry, with_region) in [
            ("AR", RegionType::Country, square(-75.0, -56.0, 25.0), true),
            ("BA", RegionType::City, square(-59.0, -35.0, 1.0), true),
            ("PAL", RegionType::Neighborhood, square(-58.5, -34.7, 0.2), false),
        ] {
            store
                .save_geo_region(GeoRegion::new(id, region_type, geometry))
                .await
                .unwrap();
            if with_region {
                store.save_region(Region::new(id, region_type)).await.unwrap();
            }
        }
        store
    }

    fn accommodation() -> AccommodationGeometry {
        AccommodationGeometry {
            external_id: "acc-1".to_string(),
            geometry: Some(Geometry::point(-58.4, -34.6)),
        }
    }

    #[tokio::test]
    async fn test_missing_ancestor_does_not_fail_ingestion() {
        let store = seeded().await;
        let service = GeoService::new(store.clone(), store.clone());

        let report = service.insert_accommodation(accommodation()).await.unwrap();
        assert_eq!(report.intersected.len(), 3);
        assert!(report.is_degraded());
        assert_eq!(
            report.ancestors.iter().map(|u| &u.outcome).collect::<Vec<_>>(),
            vec![
                &AncestorOutcome::NotEligible,
                &AncestorOutcome::Linked,
                &AncestorOutcome::Missing {
                    reason: "neighborhood PAL not found".to_string()
                },
            ]
        );

        let city = store.get_region(RegionType::City, "BA").await.unwrap();
        assert_eq!(city.descendants.accommodations, vec!["acc-1".to_string()]);
        let country = store.get_region(RegionType::Country, "AR").await.unwrap();
        assert!(country.descendants.accommodations.is_empty());

        let stored = store.get_geo_region("acc-1").await.unwrap();
        assert_eq!(stored.region_type, RegionType::Accommodation);
        assert_eq!(stored.id, report.accommodation.id);
    }

    #[tokio::test]
    async fn test_reingest_does_not_duplicate_descendant() {
        let store = seeded().await;
        let service = GeoService::new(store.clone(), store.clone());

        service.insert_accommodation(accommodation()).await.unwrap();
        service.insert_accommodation(accommodation()).await.unwrap();

        let city = store.get_region(RegionType::City, "BA").await.unwrap();
        assert_eq!(city.descendants.accommodations.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_insert_keeps_ancestor_updates() {
        let store = seeded().await;
        store.fail_on(StoreOp::SaveGeoRegion);
        let service = GeoService::new(store.clone(), store.clone());

        let err = service.insert_accommodation(accommodation()).await.unwrap_err();
        assert!(matches!(err, GeoError::BackendFault(_)));

        assert!(store.get_geo_region("acc-1").await.unwrap_err().is_not_found());
        let city = store.get_region(RegionType::City, "BA").await.unwrap();
        assert_eq!(city.descendants.accommodations, vec!["acc-1".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_update_is_reported() {
        let store = seeded().await;
        store.fail_on(StoreOp::UpdateRegion);
        let service = GeoService::new(store.clone(), store.clone());

        let report = service.insert_accommodation(accommodation()).await.unwrap();
        assert!(matches!(
            report.ancestors[1].outcome,
            AncestorOutcome::Failed { .. }
        ));
        assert_eq!(report.linked().count(), 0);
    }

    #[tokio::test]
    async fn test_intersection_fault_aborts() {
        let store = seeded().await;
        store.fail_on(StoreOp::FindGeoRegions);
        let service = GeoService::new(store.clone(), store.clone());

        assert!(service.insert_accommodation(accommodation()).await.is_err());
        assert_eq!(store.geo_region_count(), 3);
    }

    #[tokio::test]
    async fn test_missing_fields() {
        let service = GeoService::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()));

        let mut body = accommodation();
        body.geometry = None;
        assert!(matches!(
            service.insert_accommodation(body).await,
            Err(GeoError::MissingParameters(_))
        ));

        let mut body = accommodation();
        body.external_id.clear();
        assert!(matches!(
            service.insert_accommodation(body).await,
            Err(GeoError::MissingParameters(_))
        ));
    }
}
