//! Elasticsearch index schema management.

use anyhow::{Context, Result};
use elasticsearch::indices::{IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts};
use tracing::info;

use super::EsClient;
use crate::config::IndexNames;
use crate::models::RegionType;

/// Schema JSON embedded at compile time
const REGIONS_MAPPING: &str = include_str!("../../schema/regions_mapping.json");
const POLYGONS_MAPPING: &str = include_str!("../../schema/polygons_mapping.json");
const AIRPORTS_MAPPING: &str = include_str!("../../schema/airports_mapping.json");
const CATALOG_CITIES_MAPPING: &str = include_str!("../../schema/catalog_cities_mapping.json");
const CATALOG_AIRPORTS_MAPPING: &str = include_str!("../../schema/catalog_airports_mapping.json");

/// Every index the service uses, paired with its mapping
pub fn index_mappings(names: &IndexNames) -> Vec<(String, &'static str)> {
    let mut indices: Vec<(String, &'static str)> = RegionType::all()
        .iter()
        .map(|t| (names.region(*t), REGIONS_MAPPING))
        .collect();

    indices.push((names.polygons(), POLYGONS_MAPPING));
    indices.push((names.airports(), AIRPORTS_MAPPING));
    indices.push((names.catalog_cities().to_string(), CATALOG_CITIES_MAPPING));
    indices.push((names.catalog_airports().to_string(), CATALOG_AIRPORTS_MAPPING));
    indices
}

/// Create every index that does not exist yet
pub async fn create_indices(client: &EsClient, names: &IndexNames, delete_existing: bool) -> Result<()> {
    for (index, mapping) in index_mappings(names) {
        create_index(client, &index, mapping, delete_existing).await?;
    }
    Ok(())
}

/// Create one index with the given mapping
pub async fn create_index(
    client: &EsClient,
    index_name: &str,
    mapping: &str,
    delete_existing: bool,
) -> Result<()> {
    let es = client.client();

    // Check if index exists
    let exists = es
        .indices()
        .exists(IndicesExistsParts::Index(&[index_name]))
        .send()
        .await?
        .status_code()
        .is_success();

    if exists {
        if delete_existing {
            info!("Deleting existing index: {}", index_name);
            es.indices()
                .delete(IndicesDeleteParts::Index(&[index_name]))
                .send()
                .await
                .context("Failed to delete existing index")?;
        } else {
            info!("Index {} already exists, skipping creation", index_name);
            return Ok(());
        }
    }

    let mapping: serde_json::Value = serde_json::from_str(mapping)
        .with_context(|| format!("Failed to parse mapping for {}", index_name))?;

    info!("Creating index: {}", index_name);
    let response = es
        .indices()
        .create(IndicesCreateParts::Index(index_name))
        .body(mapping)
        .send()
        .await
        .context("Failed to create index")?;

    if !response.status_code().is_success() {
        let error_body = response.text().await?;
        anyhow::bail!("Failed to create index {}: {}", index_name, error_body);
    }

    info!("Index {} created successfully", index_name);
    Ok(())
}
