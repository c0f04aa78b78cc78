//! GeoJSON-like geometry value and the codec between its untyped nested-array
//! payload and the typed per-shape coordinates.
//!
//! The untyped payload (`coordinates`) is never stored next to the typed one;
//! it is recomputed from the enum on demand, so the two cannot diverge.

use geo_types::{Coord, LineString};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{GeoError, Result};

/// Largest integer an f64 holds exactly (2^53).
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A single `[lon, lat, ...]` position.
pub type Position = Vec<f64>;

/// A closed ring of positions.
pub type Ring = Vec<Position>;

/// Geometry shapes supported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    MultiPoint,
    Polygon,
    MultiPolygon,
}

impl GeometryKind {
    /// Name of the typed field emitted next to `type` on the wire
    pub fn field_name(&self) -> &'static str {
        match self {
            GeometryKind::Point => "point",
            GeometryKind::MultiPoint => "multipoint",
            GeometryKind::Polygon => "polygon",
            GeometryKind::MultiPolygon => "multipolygon",
        }
    }

    /// Array nesting depth of the raw payload for this kind
    pub fn depth(&self) -> usize {
        match self {
            GeometryKind::Point => 1,
            GeometryKind::MultiPoint => 2,
            GeometryKind::Polygon => 3,
            GeometryKind::MultiPolygon => 4,
        }
    }
}

impl std::fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryKind::Point => write!(f, "Point"),
            GeometryKind::MultiPoint => write!(f, "MultiPoint"),
            GeometryKind::Polygon => write!(f, "Polygon"),
            GeometryKind::MultiPolygon => write!(f, "MultiPolygon"),
        }
    }
}

/// Geographic point (lat/lon)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "latitude")]
    pub lat: f64,
    #[serde(rename = "longitude")]
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Read a `[lon, lat, ...]` position
    pub fn from_position(position: &[f64]) -> Option<Self> {
        match position {
            [lon, lat, ..] => Some(Self::new(*lat, *lon)),
            _ => None,
        }
    }
}

/// A geometry with natively-shaped coordinates for each kind.
///
/// Serializes to the wire form `{"type", "<shape>", "coordinates"}` and
/// deserializes from any object carrying `type` and `coordinates`; a typed
/// shape field present in the input is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "GeometryDocument")]
pub enum Geometry {
    Point(Position),
    MultiPoint(Vec<Position>),
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    /// Point geometry from a longitude/latitude pair
    pub fn point(lon: f64, lat: f64) -> Self {
        Geometry::Point(vec![lon, lat])
    }

    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::Polygon(_) => GeometryKind::Polygon,
            Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
        }
    }

    /// Decode an untyped coordinate payload for the given kind.
    ///
    /// Fails with `InvalidGeometry` when a leaf is not a number, a position
    /// has fewer than two numbers, or the nesting depth does not match `kind`.
    pub fn decode(kind: GeometryKind, raw: &Value) -> Result<Self> {
        match kind {
            GeometryKind::Point => decode_position(raw).map(Geometry::Point),
            GeometryKind::MultiPoint => decode_positions(raw).map(Geometry::MultiPoint),
            GeometryKind::Polygon => decode_rings(raw).map(Geometry::Polygon),
            GeometryKind::MultiPolygon => decode_polygons(raw).map(Geometry::MultiPolygon),
        }
    }

    /// Untyped nested-array payload, numerically identical to the typed form
    pub fn coordinates(&self) -> Value {
        match self {
            Geometry::Point(position) => position_value(position),
            Geometry::MultiPoint(positions) => positions_value(positions),
            Geometry::Polygon(rings) => rings_value(rings),
            Geometry::MultiPolygon(polygons) => {
                Value::Array(polygons.iter().map(|rings| rings_value(rings)).collect())
            }
        }
    }

    /// Storage form: `type` and raw `coordinates` only
    pub fn to_document(&self) -> GeometryDocument {
        GeometryDocument {
            kind: self.kind(),
            coordinates: self.coordinates(),
        }
    }

    /// Every position of the geometry, rings flattened in order
    pub fn positions(&self) -> Vec<&Position> {
        match self {
            Geometry::Point(position) => vec![position],
            Geometry::MultiPoint(positions) => positions.iter().collect(),
            Geometry::Polygon(rings) => rings.iter().flatten().collect(),
            Geometry::MultiPolygon(polygons) => polygons.iter().flatten().flatten().collect(),
        }
    }

    /// Convert to a `geo` geometry for planar predicates.
    ///
    /// The first ring of a polygon is the exterior, the rest are holes.
    pub fn to_geo(&self) -> geo::Geometry<f64> {
        match self {
            Geometry::Point(position) => geo::Geometry::Point(to_coord(position).into()),
            Geometry::MultiPoint(positions) => geo::Geometry::MultiPoint(geo::MultiPoint::new(
                positions.iter().map(|p| to_coord(p).into()).collect(),
            )),
            Geometry::Polygon(rings) => geo::Geometry::Polygon(to_polygon(rings)),
            Geometry::MultiPolygon(polygons) => geo::Geometry::MultiPolygon(geo::MultiPolygon::new(
                polygons.iter().map(|rings| to_polygon(rings)).collect(),
            )),
        }
    }
}

impl Serialize for Geometry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let kind = self.kind();
        let coordinates = self.coordinates();

        // Field order is part of the wire contract: type, shape, coordinates
        let mut state = serializer.serialize_struct("Geometry", 3)?;
        state.serialize_field("type", &kind)?;
        state.serialize_field(kind.field_name(), &coordinates)?;
        state.serialize_field("coordinates", &coordinates)?;
        state.end()
    }
}

/// Storage/decoding shape of a geometry: kind plus untyped coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryDocument {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    pub coordinates: Value,
}

impl TryFrom<GeometryDocument> for Geometry {
    type Error = GeoError;

    fn try_from(doc: GeometryDocument) -> Result<Self> {
        Geometry::decode(doc.kind, &doc.coordinates)
    }
}

impl From<&Geometry> for GeometryDocument {
    fn from(geometry: &Geometry) -> Self {
        geometry.to_document()
    }
}

fn as_array<'a>(raw: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    raw.as_array()
        .ok_or_else(|| GeoError::invalid_geometry(format!("not a valid {}, got {}", what, raw)))
}

fn decode_position(raw: &Value) -> Result<Position> {
    let items = as_array(raw, "position")?;
    if items.len() < 2 {
        return Err(GeoError::invalid_geometry(format!(
            "a position needs at least 2 numbers, got {}",
            raw
        )));
    }

    items
        .iter()
        .map(|item| {
            item.as_f64().ok_or_else(|| {
                GeoError::invalid_geometry(format!("not a valid coordinate, got {}", item))
            })
        })
        .collect()
}

/// Like [`as_array`], but an empty container is rejected too
fn as_non_empty<'a>(raw: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    let items = as_array(raw, what)?;
    if items.is_empty() {
        return Err(GeoError::invalid_geometry(format!("empty {}", what)));
    }
    Ok(items)
}

fn decode_positions(raw: &Value) -> Result<Vec<Position>> {
    as_non_empty(raw, "set of positions")?
        .iter()
        .map(decode_position)
        .collect()
}

fn decode_rings(raw: &Value) -> Result<Vec<Ring>> {
    as_non_empty(raw, "polygon")?
        .iter()
        .map(decode_positions)
        .collect()
}

fn decode_polygons(raw: &Value) -> Result<Vec<Vec<Ring>>> {
    as_non_empty(raw, "multipolygon")?
        .iter()
        .map(decode_rings)
        .collect()
}

/// Integral values go out as JSON integers so `[1, 2]` stays `[1,2]`.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn position_value(position: &[f64]) -> Value {
    Value::Array(position.iter().copied().map(number_value).collect())
}

fn positions_value(positions: &[Position]) -> Value {
    Value::Array(positions.iter().map(|p| position_value(p)).collect())
}

fn rings_value(rings: &[Ring]) -> Value {
    Value::Array(rings.iter().map(|r| positions_value(r)).collect())
}

fn to_coord(position: &[f64]) -> Coord<f64> {
    Coord {
        x: position.first().copied().unwrap_or_default(),
        y: position.get(1).copied().unwrap_or_default(),
    }
}

fn to_polygon(rings: &[Ring]) -> geo::Polygon<f64> {
    let mut lines = rings
        .iter()
        .map(|ring| LineString::new(ring.iter().map(|p| to_coord(p)).collect()));
    let exterior = lines.next().unwrap_or_else(|| LineString::new(vec![]));
    geo::Polygon::new(exterior, lines.collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip(kind: GeometryKind, raw: Value) {
        let decoded = Geometry::decode(kind, &raw).unwrap();
        let encoded = serde_json::to_value(&decoded).unwrap();
        let again = Geometry::decode(kind, &encoded["coordinates"]).unwrap();
        assert_eq!(again, decoded);
        assert_eq!(encoded["coordinates"], raw);
    }

    #[test]
    fn test_round_trip_every_kind() {
        round_trip(GeometryKind::Point, json!([-58.38, -34.6]));
        round_trip(GeometryKind::MultiPoint, json!([[1, 2], [3.5, 4.25]]));
        round_trip(
            GeometryKind::Polygon,
            json!([[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]),
        );
        round_trip(
            GeometryKind::MultiPolygon,
            json!([
                [[[1, 2], [3, 4]], [[5, 6], [7, 8]]],
                [[[8, 7], [6, 5]], [[4, 3], [2, 1]]]
            ]),
        );
    }

    #[test]
    fn test_encode_point_has_only_point_field() {
        let g = Geometry::decode(GeometryKind::Point, &json!([1, 2])).unwrap();
        let blob = serde_json::to_string(&g).unwrap();

        assert!(blob.contains("\"point\":[1,2]"));
        assert!(!blob.contains("\"polygon\""));
        assert!(!blob.contains("\"multipoint\""));
        assert!(!blob.contains("\"multipolygon\""));
        assert_eq!(blob, r#"{"type":"Point","point":[1,2],"coordinates":[1,2]}"#);
    }

    #[test]
    fn test_encode_multipoint_has_only_multipoint_field() {
        let g = Geometry::decode(GeometryKind::MultiPoint, &json!([[1, 2], [3, 4]])).unwrap();
        let blob = serde_json::to_string(&g).unwrap();

        assert!(blob.contains("\"multipoint\":[[1,2],[3,4]]"));
        assert!(!blob.contains("\"point\""));
        assert!(!blob.contains("\"polygon\""));
        assert!(!blob.contains("\"multipolygon\""));
    }

    #[test]
    fn test_fractional_coordinates_are_preserved() {
        let g = Geometry::point(-58.3816, -34.6037);
        assert_eq!(g.coordinates(), json!([-58.3816, -34.6037]));
    }

    #[test]
    fn test_polygon_with_two_levels_is_rejected() {
        let err = Geometry::decode(GeometryKind::Polygon, &json!([[1, 2], [3, 4]])).unwrap_err();
        assert!(matches!(err, GeoError::InvalidGeometry(_)));
    }

    #[test]
    fn test_point_too_deep_is_rejected() {
        let err = Geometry::decode(GeometryKind::Point, &json!([[1, 2]])).unwrap_err();
        assert!(matches!(err, GeoError::InvalidGeometry(_)));
    }

    #[test]
    fn test_non_numeric_leaf_is_rejected() {
        let err =
            Geometry::decode(GeometryKind::MultiPoint, &json!([[1, 2], [3, "4"]])).unwrap_err();
        assert!(matches!(err, GeoError::InvalidGeometry(_)));
    }

    #[test]
    fn test_short_position_is_rejected() {
        let err = Geometry::decode(GeometryKind::Point, &json!([1])).unwrap_err();
        assert!(matches!(err, GeoError::InvalidGeometry(_)));
    }

    #[test]
    fn test_empty_containers_are_rejected() {
        for (kind, raw) in [
            (GeometryKind::MultiPoint, json!([])),
            (GeometryKind::Polygon, json!([])),
            (GeometryKind::Polygon, json!([[]])),
            (GeometryKind::MultiPolygon, json!([])),
            (GeometryKind::MultiPolygon, json!([[]])),
            (GeometryKind::MultiPolygon, json!([[[]]])),
        ] {
            let err = Geometry::decode(kind, &raw).unwrap_err();
            assert!(matches!(err, GeoError::InvalidGeometry(_)), "{}", raw);
        }
    }

    #[test]
    fn test_deserialize_reads_only_type_and_coordinates() {
        let raw = r#"{"type":"Point","point":[9,9],"coordinates":[102.0,0.5]}"#;
        let g: Geometry = serde_json::from_str(raw).unwrap();
        assert_eq!(g, Geometry::Point(vec![102.0, 0.5]));
    }

    #[test]
    fn test_deserialize_multipolygon() {
        let raw = r#"{"type": "MultiPolygon", "coordinates": [[[[1,2],[3,4]],[[5,6],[7,8]]],[[[8,7],[6,5]],[[4,3],[2,1]]]]}"#;
        match serde_json::from_str::<Geometry>(raw).unwrap() {
            Geometry::MultiPolygon(polygons) => assert_eq!(polygons.len(), 2),
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_bad_nesting_fails() {
        let raw = r#"{"type":"Polygon","coordinates":[[1,2],[3,4]]}"#;
        assert!(serde_json::from_str::<Geometry>(raw).is_err());
    }

    #[test]
    fn test_document_carries_no_typed_field() {
        let g = Geometry::MultiPoint(vec![vec![1.0, 2.0]]);
        let doc = serde_json::to_value(g.to_document()).unwrap();
        assert_eq!(doc, json!({"type": "MultiPoint", "coordinates": [[1, 2]]}));
    }

    #[test]
    fn test_polygon_to_geo_uses_first_ring_as_exterior() {
        let g = Geometry::Polygon(vec![
            vec![vec![0.0, 0.0], vec![4.0, 0.0], vec![4.0, 4.0], vec![0.0, 4.0], vec![0.0, 0.0]],
            vec![vec![1.0, 1.0], vec![2.0, 1.0], vec![2.0, 2.0], vec![1.0, 1.0]],
        ]);
        match g.to_geo() {
            geo::Geometry::Polygon(p) => {
                assert_eq!(p.exterior().0.len(), 5);
                assert_eq!(p.interiors().len(), 1);
            }
            other => panic!("unexpected geometry {:?}", other),
        }
        assert_eq!(g.positions().len(), 9);
    }
}
