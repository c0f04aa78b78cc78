//! Search bodies and hit decoding.
//!
//! Everything here is pure JSON so it can be checked without a cluster.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::spatial::{spherical_cap, SpatialQuery};
use crate::store::{AirportQuery, RegionQuery};

/// Result window used when a query is not paginated
pub const MAX_RESULT_WINDOW: usize = 10_000;

/// Fields of a `basic` region listing
const BASIC_FIELDS: &[&str] = &["id", "type", "name"];

fn bool_filter(filters: Vec<Value>, must_not: Vec<Value>) -> Value {
    let mut bool_query = json!({ "filter": filters });
    if !must_not.is_empty() {
        bool_query["must_not"] = json!(must_not);
    }
    json!({ "bool": bool_query })
}

/// Exact match on a keyword field, first hit only.
///
/// Indices have a single shard, so `_doc` order is index order and the same
/// document wins every time a key is duplicated. `_id` is not sortable
/// without fielddata.
pub fn term_body(field: &str, value: &str) -> Value {
    json!({
        "query": { "term": { field: value } },
        "size": 1,
        "sort": ["_doc"]
    })
}

pub fn region_query_body(query: &RegionQuery) -> crate::Result<Value> {
    let mut filters = Vec::new();
    let mut must_not = Vec::new();

    if !query.external_ids.is_empty() {
        filters.push(json!({ "terms": { "id": query.external_ids } }));
    }

    for key in query.descendants.iter().filter_map(|t| t.descendants_key()) {
        filters.push(json!({ "exists": { "field": format!("descendants.{}", key) } }));
    }

    if let Some(ref code) = query.country_code {
        filters.push(json!({ "term": { "country_code": code } }));
    }

    if let Some(ref ancestors) = query.ancestors {
        filters.push(json!({ "term": { "ancestors.type": ancestors.region_type } }));
        filters.push(json!({ "terms": { "ancestors.id": ancestors.ids } }));
        must_not.push(json!({ "term": { "ancestors.type": query.region_type } }));
    }

    let (from, size) = query.window()?.unwrap_or((0, MAX_RESULT_WINDOW));
    let mut body = json!({
        "query": bool_filter(filters, must_not),
        "from": from,
        "size": size,
        "sort": [{ "id": "asc" }]
    });

    if query.basic {
        body["_source"] = json!(BASIC_FIELDS);
    }

    Ok(body)
}

pub fn airport_query_body(query: &AirportQuery) -> Value {
    let mut filters = Vec::new();
    if !query.iata_codes.is_empty() {
        filters.push(json!({ "terms": { "iata_code": query.iata_codes } }));
    }
    if let Some(ref code) = query.country_code {
        filters.push(json!({ "term": { "country_code": code } }));
    }

    json!({
        "query": bool_filter(filters, Vec::new()),
        "size": MAX_RESULT_WINDOW,
        "sort": [{ "iata_code": "asc" }]
    })
}

/// Catalog documents carrying any of the IATA codes
pub fn iata_codes_body(iata_codes: &[String]) -> Value {
    json!({
        "query": { "terms": { "iata_code": iata_codes } },
        "size": MAX_RESULT_WINDOW
    })
}

/// Render a spatial query as a `geo_shape` search
pub fn spatial_query_body(query: &SpatialQuery) -> Value {
    let shape = match query {
        SpatialQuery::Intersects { geometry, .. } => json!({
            "shape": geometry.to_document(),
            "relation": "intersects"
        }),
        SpatialQuery::Nearby {
            center,
            angular_radius,
            ..
        } => json!({
            "shape": spherical_cap(*center, *angular_radius).to_document(),
            "relation": "within"
        }),
    };

    let mut filters = vec![json!({ "geo_shape": { "geometry": shape } })];
    if !query.types().is_empty() {
        filters.push(json!({ "terms": { "type": query.types() } }));
    }
    let mut must_not = Vec::new();
    if !query.excluded().is_empty() {
        must_not.push(json!({ "terms": { "type": query.excluded() } }));
    }

    let mut body = json!({
        "query": bool_filter(filters, must_not),
        "size": MAX_RESULT_WINDOW,
        "sort": [{ "id": "asc" }]
    });

    if let Some(fields) = query.projection() {
        body["_source"] = json!(fields);
    }

    body
}

/// Serialize a document for indexing. `_id` is metadata in Elasticsearch
/// and may not appear in the source.
pub fn source_of<T: Serialize>(document: &T) -> Result<Value> {
    let mut source = serde_json::to_value(document).context("Failed to serialize document")?;
    if let Some(obj) = source.as_object_mut() {
        obj.remove("_id");
    }
    Ok(source)
}

/// Decode `hits.hits[]._source`, optionally copying the hit `_id` into the
/// source so it lands in the document's internal id.
pub fn parse_hits<T: DeserializeOwned>(response: &Value, with_internal_id: bool) -> Result<Vec<T>> {
    let hits = response["hits"]["hits"]
        .as_array()
        .context("Search response has no hits array")?;

    hits.iter()
        .map(|hit| {
            let mut source = hit["_source"].clone();
            if with_internal_id {
                if let (Some(obj), Some(id)) = (source.as_object_mut(), hit["_id"].as_str()) {
                    obj.insert("_id".to_string(), json!(id));
                }
            }
            serde_json::from_value(source).context("Failed to decode search hit")
        })
        .collect()
}

/// `_id` of the first hit, if any
pub fn first_hit_id(response: &Value) -> Option<String> {
    response["hits"]["hits"]
        .as_array()?
        .first()?["_id"]
        .as_str()
        .map(String::from)
}
