//! geoapi - geo reference data service backed by Elasticsearch
//!
//! This library holds the models, geometry codec, spatial queries, stores and
//! workflows used by the server binary.

pub mod config;
pub mod elasticsearch;
pub mod error;
pub mod models;
pub mod service;
pub mod spatial;
pub mod store;

pub use error::{GeoError, Result};
