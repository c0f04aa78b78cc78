//! Core data models for the geo reference dataset.

pub mod airport;
pub mod catalog;
pub mod geometry;
pub mod region;

pub use airport::{Airport, AirportRegion, Coordinates};
pub use catalog::{CatalogAirport, CatalogCity, Entity, EntityType};
pub use geometry::{GeoPoint, Geometry, GeometryDocument, GeometryKind, Position, Ring};
pub use region::{
    parse_region_types, AccommodationGeometry, Ancestor, Descendants, GeoRegion, Region,
    RegionType,
};
