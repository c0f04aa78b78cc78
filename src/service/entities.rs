//! City/airport resolution by IATA code.
//!
//! Both catalog lookups run as their own tasks and hand back independent
//! results; nothing is shared between them while they run.

use anyhow::anyhow;
use futures::future::join_all;
use tracing::{debug, warn};

use super::GeoService;
use crate::error::{GeoError, Result};
use crate::models::Entity;
use crate::store::CatalogStore;

/// Combine branch results. The call fails only when every branch failed;
/// a backend fault then wins over not-found.
pub fn merge_branches(outcomes: Vec<Result<Vec<Entity>>>) -> Result<Vec<Entity>> {
    let total = outcomes.len();
    let mut entities = Vec::new();
    let mut failures = Vec::new();

    for outcome in outcomes {
        match outcome {
            Ok(mut found) => entities.append(&mut found),
            Err(e) => failures.push(e),
        }
    }

    if total > 0 && failures.len() == total {
        if let Some(pos) = failures.iter().position(|e| !e.is_not_found()) {
            return Err(failures.swap_remove(pos));
        }
        return Err(GeoError::not_found("entity"));
    }

    for failure in &failures {
        warn!("Entity lookup branch failed: {}", failure);
    }
    Ok(entities)
}

fn split_codes(iata_code: &str) -> Vec<String> {
    iata_code
        .split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(String::from)
        .collect()
}

fn non_empty(entities: Vec<Entity>, what: &str, codes: &[String]) -> Result<Vec<Entity>> {
    if entities.is_empty() {
        return Err(GeoError::not_found(format!("{} {}", what, codes.join(","))));
    }
    Ok(entities)
}

impl GeoService {
    /// Cities and airports carrying any of the comma-separated IATA codes,
    /// named in `language`.
    pub async fn resolve_by_iata_code(&self, iata_code: &str, language: &str) -> Result<Vec<Entity>> {
        let codes = split_codes(iata_code);
        if codes.is_empty() || language.is_empty() {
            return Err(GeoError::missing("iata_code and language are required"));
        }
        let language = language.to_lowercase();

        let cities = {
            let catalog = self.catalog.clone();
            let codes = codes.clone();
            let language = language.clone();
            tokio::spawn(async move {
                let found = catalog.find_cities(&codes).await?;
                let entities = found.iter().map(|c| Entity::from_city(c, &language)).collect();
                non_empty(entities, "city", &codes)
            })
        };

        let airports = {
            let catalog = self.catalog.clone();
            let codes = codes.clone();
            let language = language.clone();
            tokio::spawn(async move {
                let found = catalog.find_airports(&codes).await?;
                let entities = found
                    .iter()
                    .map(|a| Entity::from_airport(a, &language))
                    .collect();
                non_empty(entities, "airport", &codes)
            })
        };

        let outcomes = join_all(vec![cities, airports])
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(GeoError::BackendFault(anyhow!("entity lookup task failed: {}", e)))
                })
            })
            .collect();

        let entities = merge_branches(outcomes)?;
        debug!("Resolved {} entities for {}", entities.len(), iata_code);
        Ok(entities)
    }
}
