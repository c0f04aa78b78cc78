//! Elasticsearch-backed stores.

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use elasticsearch::params::Refresh;
use elasticsearch::{IndexParts, SearchParts};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::query::{
    airport_query_body, first_hit_id, iata_codes_body, parse_hits, region_query_body, source_of,
    spatial_query_body, term_body,
};
use super::EsClient;
use crate::config::IndexNames;
use crate::error::{GeoError, Result};
use crate::models::{
    Airport, CatalogAirport, CatalogCity, GeoRegion, GeometryDocument, Region, RegionType,
};
use crate::spatial::SpatialQuery;
use crate::store::{AirportQuery, CatalogStore, RegionQuery, RegionStore};

/// Stored form of a GeoRegion; the geometry keeps only `type` and
/// `coordinates`, which is what `geo_shape` accepts.
#[derive(Debug, Serialize)]
struct GeoRegionDocument<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    region_type: RegionType,
    geometry: GeometryDocument,
}

impl<'a> GeoRegionDocument<'a> {
    fn from_region(region: &'a GeoRegion) -> Result<Self> {
        let geometry = region
            .geometry
            .as_ref()
            .ok_or_else(|| GeoError::missing("geometry"))?;
        Ok(Self {
            id: &region.external_id,
            region_type: region.region_type,
            geometry: geometry.to_document(),
        })
    }
}

#[derive(Clone)]
pub struct EsStore {
    client: EsClient,
    names: IndexNames,
}

impl EsStore {
    pub fn new(client: EsClient, names: IndexNames) -> Self {
        Self { client, names }
    }

    pub fn client(&self) -> &EsClient {
        &self.client
    }

    async fn search(&self, index: &str, body: Value) -> AnyResult<Value> {
        debug!("Search {}: {}", index, body);

        let response = self
            .client
            .client()
            .search(SearchParts::Index(&[index]))
            .body(body)
            .send()
            .await
            .with_context(|| format!("Search on {} failed", index))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            // Index not created yet: nothing stored
            warn!("Index {} does not exist", index);
            return Ok(json!({ "hits": { "hits": [] } }));
        }
        if !status.is_success() {
            let error_body = response.text().await?;
            anyhow::bail!("Search on {} returned {}: {}", index, status, error_body);
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("Malformed search response from {}", index))
    }

    /// Index a document under `id`, waiting until it is searchable
    async fn put(&self, index: &str, id: &str, source: Value) -> AnyResult<()> {
        let response = self
            .client
            .client()
            .index(IndexParts::IndexId(index, id))
            .refresh(Refresh::WaitFor)
            .body(source)
            .send()
            .await
            .with_context(|| format!("Indexing into {} failed", index))?;

        if !response.status_code().is_success() {
            let error_body = response.text().await?;
            anyhow::bail!("Indexing into {} failed: {}", index, error_body);
        }
        Ok(())
    }

    /// Internal id of the first document whose `field` equals `value`
    async fn internal_id(&self, index: &str, field: &str, value: &str) -> Result<String> {
        let response = self.search(index, term_body(field, value)).await?;
        first_hit_id(&response).ok_or_else(|| GeoError::not_found(format!("{} {}", index, value)))
    }

    async fn find_one<T: serde::de::DeserializeOwned>(
        &self,
        index: &str,
        field: &str,
        value: &str,
        with_internal_id: bool,
    ) -> Result<T> {
        let response = self.search(index, term_body(field, value)).await?;
        parse_hits::<T>(&response, with_internal_id)?
            .into_iter()
            .next()
            .ok_or_else(|| GeoError::not_found(format!("{} {}", index, value)))
    }
}

#[async_trait]
impl RegionStore for EsStore {
    async fn ping(&self) -> bool {
        match self.client.health_check().await {
            Ok(alive) => alive,
            Err(e) => {
                warn!("Elasticsearch health check failed: {:#}", e);
                false
            }
        }
    }

    async fn get_region(&self, region_type: RegionType, external_id: &str) -> Result<Region> {
        self.find_one(&self.names.region(region_type), "id", external_id, true)
            .await
    }

    async fn get_regions(&self, query: &RegionQuery) -> Result<Vec<Region>> {
        let index = self.names.region(query.region_type);
        let response = self.search(&index, region_query_body(query)?).await?;
        Ok(parse_hits(&response, true)?)
    }

    async fn get_country_by_code(&self, country_code: &str) -> Result<Region> {
        if country_code.is_empty() {
            return Err(GeoError::missing("country_code"));
        }
        self.find_one(
            &self.names.region(RegionType::Country),
            "country_code",
            country_code,
            true,
        )
        .await
    }

    async fn count(&self, region_type: RegionType) -> Result<u64> {
        Ok(self.client.doc_count(&self.names.region(region_type)).await?)
    }

    async fn save_region(&self, mut region: Region) -> Result<Region> {
        region.id = Uuid::new_v4().to_string();
        let index = self.names.region(region.region_type);
        self.put(&index, &region.id, source_of(&region)?).await?;
        Ok(region)
    }

    async fn update_region(&self, region: &Region) -> Result<()> {
        let index = self.names.region(region.region_type);
        let id = self.internal_id(&index, "id", &region.external_id).await?;
        self.put(&index, &id, source_of(region)?).await?;
        Ok(())
    }

    async fn save_airport(&self, mut airport: Airport) -> Result<Airport> {
        airport.id = Uuid::new_v4().to_string();
        self.put(&self.names.airports(), &airport.id, source_of(&airport)?)
            .await?;
        Ok(airport)
    }

    async fn update_airport(&self, airport: &Airport) -> Result<()> {
        let index = self.names.airports();
        let id = self.internal_id(&index, "iata_code", &airport.iata_code).await?;

        let mut airport = airport.clone();
        airport.id = id.clone();
        self.put(&index, &id, source_of(&airport)?).await?;
        Ok(())
    }

    async fn get_airport_by_iata(&self, iata_code: &str) -> Result<Airport> {
        self.find_one(&self.names.airports(), "iata_code", iata_code, false)
            .await
    }

    async fn get_airports(&self, query: &AirportQuery) -> Result<Vec<Airport>> {
        let response = self
            .search(&self.names.airports(), airport_query_body(query))
            .await?;
        Ok(parse_hits(&response, false)?)
    }

    async fn get_geo_region(&self, external_id: &str) -> Result<GeoRegion> {
        self.find_one(&self.names.polygons(), "id", external_id, true)
            .await
    }

    async fn save_geo_region(&self, mut region: GeoRegion) -> Result<GeoRegion> {
        let source = source_of(&GeoRegionDocument::from_region(&region)?)?;
        region.id = Uuid::new_v4().to_string();
        self.put(&self.names.polygons(), &region.id, source).await?;
        Ok(region)
    }

    async fn update_geo_region(&self, region: &GeoRegion) -> Result<()> {
        let source = source_of(&GeoRegionDocument::from_region(region)?)?;
        let index = self.names.polygons();
        let id = self.internal_id(&index, "id", &region.external_id).await?;
        self.put(&index, &id, source).await?;
        Ok(())
    }

    async fn find_geo_regions(&self, query: &SpatialQuery) -> Result<Vec<GeoRegion>> {
        let response = self
            .search(&self.names.polygons(), spatial_query_body(query))
            .await?;
        Ok(parse_hits(&response, query.projection().is_none())?)
    }
}

#[async_trait]
impl CatalogStore for EsStore {
    async fn find_cities(&self, iata_codes: &[String]) -> Result<Vec<CatalogCity>> {
        let response = self
            .search(self.names.catalog_cities(), iata_codes_body(iata_codes))
            .await?;
        Ok(parse_hits(&response, false)?)
    }

    async fn find_airports(&self, iata_codes: &[String]) -> Result<Vec<CatalogAirport>> {
        let response = self
            .search(self.names.catalog_airports(), iata_codes_body(iata_codes))
            .await?;
        Ok(parse_hits(&response, false)?)
    }
}
