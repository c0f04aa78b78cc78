//! HTTP handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use geoapi::models::{
    parse_region_types, AccommodationGeometry, Airport, Entity, GeoRegion, Region, RegionType,
};
use geoapi::service::GeoService;
use geoapi::store::{AirportQuery, RegionQuery, RegionStore};
use geoapi::GeoError;

/// Application state shared across handlers
pub struct AppState {
    pub service: GeoService,
}

pub type SharedState = State<Arc<AppState>>;

/// Success envelope
#[derive(Serialize)]
pub struct Data<T> {
    pub data: T,
}

fn data<T>(value: T) -> Json<Data<T>> {
    Json(Data { data: value })
}

pub struct ApiError(GeoError);

impl From<GeoError> for ApiError {
    fn from(e: GeoError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            GeoError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            GeoError::MissingParameters(_)
            | GeoError::InvalidParameter(_)
            | GeoError::InvalidGeometry(_) => StatusCode::BAD_REQUEST,
            GeoError::BackendFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<Data<T>>, ApiError>;

#[derive(Serialize)]
pub struct HealthResponse {
    version: &'static str,
    elasticsearch: &'static str,
}

/// Health check endpoint
pub async fn health_handler(State(state): SharedState) -> Json<HealthResponse> {
    let alive = state.service.store().ping().await;

    Json(HealthResponse {
        version: env!("CARGO_PKG_VERSION"),
        elasticsearch: if alive { "Alive" } else { "Dead" },
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct RegionListParams {
    pub ids: Option<String>,
    pub descendants: Option<String>,
    pub basic: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub country_code: Option<String>,
}

fn split_list(list: &Option<String>) -> Vec<String> {
    list.as_deref()
        .map(|l| {
            l.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_number(value: &Option<String>, name: &str) -> Result<Option<i64>, GeoError> {
    match value.as_deref().filter(|v| !v.is_empty()) {
        Some(v) => v
            .parse::<i64>()
            .map(Some)
            .map_err(|_| GeoError::invalid_parameter(format!("[{}] must be a valid number", name))),
        None => Ok(None),
    }
}

/// Descendant keys are accepted either as stored (`cities`) or as a
/// region type (`city`)
fn parse_descendants(list: &Option<String>) -> Result<Vec<RegionType>, GeoError> {
    split_list(list)
        .iter()
        .map(|item| {
            RegionType::all()
                .iter()
                .find(|t| t.descendants_key() == Some(item.as_str()) || t.as_str() == item)
                .copied()
                .filter(|t| t.descendants_key().is_some())
                .ok_or_else(|| {
                    GeoError::invalid_parameter(format!("unknown descendants key '{}'", item))
                })
        })
        .collect()
}

pub fn build_region_query(
    region_type: RegionType,
    params: &RegionListParams,
) -> Result<RegionQuery, GeoError> {
    let mut query = RegionQuery::new(region_type);
    query.external_ids = split_list(&params.ids);
    query.descendants = parse_descendants(&params.descendants)?;
    query.country_code = params.country_code.clone().filter(|c| !c.is_empty());

    if let Some(basic) = params.basic.as_deref().filter(|b| !b.is_empty()) {
        query.basic = basic
            .parse::<bool>()
            .map_err(|_| GeoError::invalid_parameter("[basic] must be true or false"))?;
    }

    if let Some(page) = parse_number(&params.page, "page")? {
        if page <= 0 {
            return Err(GeoError::invalid_parameter(
                "[page] must be a number greater than 0",
            ));
        }
        query.page = page as usize;
    }
    if let Some(limit) = parse_number(&params.limit, "limit")? {
        query.limit = limit.max(0) as usize;
    }
    query.window()?;

    Ok(query)
}

pub async fn get_region(
    region_type: RegionType,
    State(state): SharedState,
    Path(id): Path<String>,
) -> ApiResult<Region> {
    let region = state.service.store().get_region(region_type, &id).await?;
    Ok(data(region))
}

pub async fn list_regions(
    region_type: RegionType,
    State(state): SharedState,
    Query(params): Query<RegionListParams>,
) -> ApiResult<Vec<Region>> {
    let query = build_region_query(region_type, &params)?;
    let regions = state.service.regions_by_query(query).await?;
    Ok(data(regions))
}

fn require_external_id(id: &str) -> Result<(), GeoError> {
    if id.is_empty() {
        return Err(GeoError::missing("id"));
    }
    Ok(())
}

pub async fn create_region(
    State(state): SharedState,
    Json(region): Json<Region>,
) -> Result<(StatusCode, Json<Data<Region>>), ApiError> {
    require_external_id(&region.external_id)?;
    let region = state.service.store().save_region(region).await?;
    Ok((StatusCode::CREATED, data(region)))
}

pub async fn update_region(
    State(state): SharedState,
    Json(region): Json<Region>,
) -> ApiResult<Region> {
    require_external_id(&region.external_id)?;
    state.service.store().update_region(&region).await?;
    Ok(data(region))
}

#[derive(Debug, Default, Deserialize)]
pub struct AirportListParams {
    pub iata_codes: Option<String>,
    pub country_code: Option<String>,
}

pub async fn get_airport(
    State(state): SharedState,
    Path(iata_code): Path<String>,
) -> ApiResult<Airport> {
    let airport = state.service.store().get_airport_by_iata(&iata_code).await?;
    Ok(data(airport))
}

pub async fn list_airports(
    State(state): SharedState,
    Query(params): Query<AirportListParams>,
) -> ApiResult<Vec<Airport>> {
    let query = AirportQuery {
        country_code: params.country_code.filter(|c| !c.is_empty()),
        iata_codes: split_list(&params.iata_codes),
    };
    let airports = state.service.store().get_airports(&query).await?;
    Ok(data(airports))
}

pub async fn create_airport(
    State(state): SharedState,
    Json(airport): Json<Airport>,
) -> Result<(StatusCode, Json<Data<Airport>>), ApiError> {
    if airport.iata_code.is_empty() {
        return Err(GeoError::missing("iata_code").into());
    }
    let airport = state.service.store().save_airport(airport).await?;
    Ok((StatusCode::CREATED, data(airport)))
}

pub async fn update_airport(
    State(state): SharedState,
    Json(airport): Json<Airport>,
) -> ApiResult<Airport> {
    if airport.iata_code.is_empty() {
        return Err(GeoError::missing("iata_code").into());
    }
    state.service.store().update_airport(&airport).await?;
    Ok(data(airport))
}

pub async fn get_polygon(
    State(state): SharedState,
    Path(id): Path<String>,
) -> ApiResult<GeoRegion> {
    let region = state.service.store().get_geo_region(&id).await?;
    Ok(data(region))
}

pub async fn create_polygon(
    State(state): SharedState,
    Json(region): Json<GeoRegion>,
) -> Result<(StatusCode, Json<Data<GeoRegion>>), ApiError> {
    require_external_id(&region.external_id)?;
    let region = state.service.store().save_geo_region(region).await?;
    Ok((StatusCode::CREATED, data(region)))
}

pub async fn update_polygon(
    State(state): SharedState,
    Json(region): Json<GeoRegion>,
) -> ApiResult<GeoRegion> {
    require_external_id(&region.external_id)?;
    state.service.store().update_geo_region(&region).await?;
    Ok(data(region))
}

#[derive(Debug, Default, Deserialize)]
pub struct IntersectionParams {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub region_types: Option<String>,
}

fn require_point(latitude: Option<f64>, longitude: Option<f64>) -> Result<(f64, f64), GeoError> {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => Ok((lat, lon)),
        _ => Err(GeoError::missing("latitude and longitude are required")),
    }
}

fn region_types(list: &Option<String>) -> Result<Vec<RegionType>, GeoError> {
    parse_region_types(list.as_deref().unwrap_or("")).map_err(GeoError::InvalidParameter)
}

pub async fn intersections(
    State(state): SharedState,
    Query(params): Query<IntersectionParams>,
) -> ApiResult<Vec<GeoRegion>> {
    let (lat, lon) = require_point(params.latitude, params.longitude)?;
    let types = region_types(&params.region_types)?;
    let regions = state.service.intersections(lat, lon, &types).await?;
    Ok(data(regions))
}

#[derive(Debug, Default, Deserialize)]
pub struct TypedIntersectionParams {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub excluded_types: Option<String>,
}

/// The region of each type containing a point, keyed by type
pub async fn intersections_by_type(
    State(state): SharedState,
    Query(params): Query<TypedIntersectionParams>,
) -> ApiResult<BTreeMap<RegionType, Region>> {
    let (lat, lon) = require_point(params.latitude, params.longitude)?;
    let excluded = region_types(&params.excluded_types)?;
    let regions = state
        .service
        .intersections_by_type(lat, lon, &excluded)
        .await?;
    Ok(data(regions))
}

#[derive(Debug, Default, Deserialize)]
pub struct NearbyParams {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius: Option<f64>,
    pub types: Option<String>,
}

pub async fn nearby_regions(
    State(state): SharedState,
    Query(params): Query<NearbyParams>,
) -> ApiResult<Vec<GeoRegion>> {
    let (lat, lon) = require_point(params.latitude, params.longitude)?;
    let radius = params
        .radius
        .ok_or_else(|| GeoError::missing("radius is required"))?;
    let types = region_types(&params.types)?;
    let regions = state
        .service
        .nearby_regions(lat, lon, radius, &types)
        .await?;
    Ok(data(regions))
}

/// Ingest an accommodation; answers with the regions it was found in
pub async fn insert_accommodation(
    State(state): SharedState,
    Json(accommodation): Json<AccommodationGeometry>,
) -> ApiResult<Vec<GeoRegion>> {
    let report = state.service.insert_accommodation(accommodation).await?;
    Ok(data(report.intersected))
}

#[derive(Debug, Default, Deserialize)]
pub struct EntityParams {
    pub iata_code: Option<String>,
    pub language: Option<String>,
}

pub async fn entities(
    State(state): SharedState,
    Query(params): Query<EntityParams>,
) -> ApiResult<Vec<Entity>> {
    let entities = state
        .service
        .resolve_by_iata_code(
            params.iata_code.as_deref().unwrap_or(""),
            params.language.as_deref().unwrap_or(""),
        )
        .await?;
    Ok(data(entities))
}
