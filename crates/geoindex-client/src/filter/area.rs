//! Area predicates: the single spatial target of a query or geofence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::args::Args;
use crate::errors::EncodeError;

/// Encodes an area predicate block, e.g. `CIRCLE lat lon meters`.
pub trait AreaPredicate {
    /// Keyword that opens the block.
    fn keyword(&self) -> &'static str;

    /// Appends the keyword and its operands.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::NonFiniteCoordinate`] for NaN or infinite
    /// coordinates, [`EncodeError::InvalidObject`] for GeoJSON payloads
    /// that are not JSON objects and [`EncodeError::EmptyOperand`] for empty
    /// keys, ids, patterns, quadkeys or geohashes.
    fn encode_into(&self, args: &mut Args) -> Result<(), EncodeError>;
}

pub(crate) fn finite(name: &'static str, value: f64) -> Result<f64, EncodeError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EncodeError::NonFiniteCoordinate { name })
    }
}

/// An existing object used as the area: `GET key id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTarget {
    /// Collection holding the object.
    pub key: String,
    /// Object id.
    pub id: String,
}

impl GetTarget {
    /// Targets object `id` in collection `key`.
    #[must_use]
    pub fn new(key: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            id: id.into(),
        }
    }
}

/// A latitude/longitude rectangle: `BOUNDS minlat minlon maxlat maxlon`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern edge.
    #[serde(rename = "minlat")]
    pub min_lat: f64,
    /// Western edge.
    #[serde(rename = "minlon")]
    pub min_lon: f64,
    /// Northern edge.
    #[serde(rename = "maxlat")]
    pub max_lat: f64,
    /// Eastern edge.
    #[serde(rename = "maxlon")]
    pub max_lon: f64,
}

impl BoundingBox {
    /// Builds a rectangle from its south-west and north-east corners.
    #[must_use]
    pub const fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    fn encode_operands(&self, args: &mut Args) -> Result<(), EncodeError> {
        args.push(finite("minlat", self.min_lat)?)
            .push(finite("minlon", self.min_lon)?)
            .push(finite("maxlat", self.max_lat)?)
            .push(finite("maxlon", self.max_lon)?);
        Ok(())
    }
}

/// A radius around a centre: `CIRCLE lat lon meters`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    /// Centre latitude.
    pub lat: f64,
    /// Centre longitude.
    pub lon: f64,
    /// Radius in meters.
    pub meters: f64,
}

impl Circle {
    /// Builds a circle of `meters` around `lat`/`lon`.
    #[must_use]
    pub const fn new(lat: f64, lon: f64, meters: f64) -> Self {
        Self { lat, lon, meters }
    }
}

/// A slippy-map tile: `TILE x y zoom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Tile column.
    pub x: u64,
    /// Tile row.
    pub y: u64,
    /// Zoom level.
    pub zoom: u8,
}

/// A point with an optional search radius: `POINT lat lon [meters]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
    /// Radius in meters; omitted for an unbounded k-nearest search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meters: Option<f64>,
}

impl Point {
    /// A bare point, ordered by distance without a radius limit.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            meters: None,
        }
    }

    /// Restricts the search to `meters` around the point.
    #[must_use]
    pub const fn within(mut self, meters: f64) -> Self {
        self.meters = Some(meters);
        self
    }
}

/// Objects of another collection moving near each other:
/// `ROAM key pattern meters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roam {
    /// Collection whose objects are tracked.
    pub key: String,
    /// Glob over object ids in `key`.
    pub pattern: String,
    /// Proximity threshold in meters.
    pub meters: f64,
}

impl Roam {
    /// Tracks objects of `key` matching `pattern` within `meters`.
    #[must_use]
    pub fn new(key: impl Into<String>, pattern: impl Into<String>, meters: f64) -> Self {
        Self {
            key: key.into(),
            pattern: pattern.into(),
            meters,
        }
    }
}

fn non_empty<'a>(
    area: &'static str,
    name: &'static str,
    value: &'a str,
) -> Result<&'a str, EncodeError> {
    if value.is_empty() {
        Err(EncodeError::EmptyOperand { area, name })
    } else {
        Ok(value)
    }
}

fn encode_get(target: &GetTarget, args: &mut Args) -> Result<(), EncodeError> {
    args.push("GET")
        .push(non_empty("GET", "key", &target.key)?)
        .push(non_empty("GET", "id", &target.id)?);
    Ok(())
}

fn encode_quadkey(quadkey: &str, args: &mut Args) -> Result<(), EncodeError> {
    args.push("QUADKEY").push(non_empty("QUADKEY", "key", quadkey)?);
    Ok(())
}

fn encode_hash(hash: &str, args: &mut Args) -> Result<(), EncodeError> {
    args.push("HASH").push(non_empty("HASH", "geohash", hash)?);
    Ok(())
}

fn encode_bounds(bounds: &BoundingBox, args: &mut Args) -> Result<(), EncodeError> {
    args.push("BOUNDS");
    bounds.encode_operands(args)
}

fn encode_object(object: &Value, args: &mut Args) -> Result<(), EncodeError> {
    if !object.is_object() {
        return Err(EncodeError::InvalidObject);
    }
    args.push("OBJECT").push(object.to_string());
    Ok(())
}

fn encode_circle(circle: &Circle, args: &mut Args) -> Result<(), EncodeError> {
    args.push("CIRCLE")
        .push(finite("lat", circle.lat)?)
        .push(finite("lon", circle.lon)?)
        .push(finite("meters", circle.meters)?);
    Ok(())
}

fn encode_tile(tile: Tile, args: &mut Args) {
    args.push("TILE").push(tile.x).push(tile.y).push(tile.zoom);
}

fn encode_point(point: &Point, args: &mut Args) -> Result<(), EncodeError> {
    args.push("POINT")
        .push(finite("lat", point.lat)?)
        .push(finite("lon", point.lon)?);
    if let Some(meters) = point.meters {
        args.push(finite("meters", meters)?);
    }
    Ok(())
}

fn encode_roam(roam: &Roam, args: &mut Args) -> Result<(), EncodeError> {
    args.push("ROAM")
        .push(non_empty("ROAM", "key", &roam.key)?)
        .push(non_empty("ROAM", "pattern", &roam.pattern)?)
        .push(finite("meters", roam.meters)?);
    Ok(())
}

/// Any area predicate the engine understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Area {
    /// `GET key id`.
    Get(GetTarget),
    /// `BOUNDS minlat minlon maxlat maxlon`.
    Bounds(BoundingBox),
    /// `OBJECT geojson`.
    Object(Value),
    /// `CIRCLE lat lon meters`.
    Circle(Circle),
    /// `TILE x y zoom`.
    Tile(Tile),
    /// `QUADKEY key`.
    Quadkey(String),
    /// `HASH geohash`.
    Hash(String),
    /// `POINT lat lon [meters]`.
    Point(Point),
    /// `ROAM key pattern meters`.
    Roam(Roam),
}

impl AreaPredicate for Area {
    fn keyword(&self) -> &'static str {
        match self {
            Self::Get(_) => "GET",
            Self::Bounds(_) => "BOUNDS",
            Self::Object(_) => "OBJECT",
            Self::Circle(_) => "CIRCLE",
            Self::Tile(_) => "TILE",
            Self::Quadkey(_) => "QUADKEY",
            Self::Hash(_) => "HASH",
            Self::Point(_) => "POINT",
            Self::Roam(_) => "ROAM",
        }
    }

    fn encode_into(&self, args: &mut Args) -> Result<(), EncodeError> {
        match self {
            Self::Get(target) => encode_get(target, args)?,
            Self::Bounds(bounds) => encode_bounds(bounds, args)?,
            Self::Object(object) => encode_object(object, args)?,
            Self::Circle(circle) => encode_circle(circle, args)?,
            Self::Tile(tile) => encode_tile(*tile, args),
            Self::Quadkey(quadkey) => encode_quadkey(quadkey, args)?,
            Self::Hash(hash) => encode_hash(hash, args)?,
            Self::Point(point) => encode_point(point, args)?,
            Self::Roam(roam) => encode_roam(roam, args)?,
        }
        Ok(())
    }
}

/// Areas accepted by `NEARBY`.
#[derive(Debug, Clone, PartialEq)]
pub enum NearbyArea {
    /// Distance-ordered search around a point.
    Point(Point),
    /// Proximity between moving objects.
    Roam(Roam),
}

impl AreaPredicate for NearbyArea {
    fn keyword(&self) -> &'static str {
        match self {
            Self::Point(_) => "POINT",
            Self::Roam(_) => "ROAM",
        }
    }

    fn encode_into(&self, args: &mut Args) -> Result<(), EncodeError> {
        match self {
            Self::Point(point) => encode_point(point, args),
            Self::Roam(roam) => encode_roam(roam, args),
        }
    }
}

impl From<Point> for NearbyArea {
    fn from(point: Point) -> Self {
        Self::Point(point)
    }
}

impl From<Roam> for NearbyArea {
    fn from(roam: Roam) -> Self {
        Self::Roam(roam)
    }
}

impl TryFrom<Area> for NearbyArea {
    type Error = Area;

    fn try_from(area: Area) -> Result<Self, Self::Error> {
        match area {
            Area::Point(point) => Ok(Self::Point(point)),
            Area::Roam(roam) => Ok(Self::Roam(roam)),
            other => Err(other),
        }
    }
}

/// Areas accepted by `INTERSECTS` and `WITHIN`.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionArea {
    /// Geometry of an existing object.
    Get(GetTarget),
    /// Latitude/longitude rectangle.
    Bounds(BoundingBox),
    /// GeoJSON geometry.
    Object(Value),
    /// Radius around a centre.
    Circle(Circle),
    /// Slippy-map tile.
    Tile(Tile),
    /// Bing-style quadkey.
    Quadkey(String),
    /// Geohash cell.
    Hash(String),
}

impl AreaPredicate for RegionArea {
    fn keyword(&self) -> &'static str {
        match self {
            Self::Get(_) => "GET",
            Self::Bounds(_) => "BOUNDS",
            Self::Object(_) => "OBJECT",
            Self::Circle(_) => "CIRCLE",
            Self::Tile(_) => "TILE",
            Self::Quadkey(_) => "QUADKEY",
            Self::Hash(_) => "HASH",
        }
    }

    fn encode_into(&self, args: &mut Args) -> Result<(), EncodeError> {
        match self {
            Self::Get(target) => encode_get(target, args)?,
            Self::Bounds(bounds) => encode_bounds(bounds, args)?,
            Self::Object(object) => encode_object(object, args)?,
            Self::Circle(circle) => encode_circle(circle, args)?,
            Self::Tile(tile) => encode_tile(*tile, args),
            Self::Quadkey(quadkey) => encode_quadkey(quadkey, args)?,
            Self::Hash(hash) => encode_hash(hash, args)?,
        }
        Ok(())
    }
}

impl From<BoundingBox> for RegionArea {
    fn from(bounds: BoundingBox) -> Self {
        Self::Bounds(bounds)
    }
}

impl From<Circle> for RegionArea {
    fn from(circle: Circle) -> Self {
        Self::Circle(circle)
    }
}

impl From<GetTarget> for RegionArea {
    fn from(target: GetTarget) -> Self {
        Self::Get(target)
    }
}

impl From<Tile> for RegionArea {
    fn from(tile: Tile) -> Self {
        Self::Tile(tile)
    }
}

impl TryFrom<Area> for RegionArea {
    type Error = Area;

    fn try_from(area: Area) -> Result<Self, Self::Error> {
        match area {
            Area::Get(target) => Ok(Self::Get(target)),
            Area::Bounds(bounds) => Ok(Self::Bounds(bounds)),
            Area::Object(object) => Ok(Self::Object(object)),
            Area::Circle(circle) => Ok(Self::Circle(circle)),
            Area::Tile(tile) => Ok(Self::Tile(tile)),
            Area::Quadkey(quadkey) => Ok(Self::Quadkey(quadkey)),
            Area::Hash(hash) => Ok(Self::Hash(hash)),
            other => Err(other),
        }
    }
}

/// The predicate fields of a loose option record, at most one populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaOptions {
    /// `GET key id`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<GetTarget>,
    /// `BOUNDS minlat minlon maxlat maxlon`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundingBox>,
    /// `OBJECT geojson`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
    /// `CIRCLE lat lon meters`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle: Option<Circle>,
    /// `TILE x y zoom`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile: Option<Tile>,
    /// `QUADKEY key`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quadkey: Option<String>,
    /// `HASH geohash`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// `POINT lat lon [meters]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<Point>,
    /// `ROAM key pattern meters`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roam: Option<Roam>,
}

impl AreaOptions {
    /// Collapses the populated predicate into an [`Area`].
    ///
    /// Empty `quadkey`/`hash` strings count as absent.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::MultipleAreas`] when more than one predicate is
    /// populated; the engine would otherwise receive an ambiguous command.
    pub fn resolve(self) -> Result<Option<Area>, EncodeError> {
        let Self {
            get,
            bounds,
            object,
            circle,
            tile,
            quadkey,
            hash,
            point,
            roam,
        } = self;

        let candidates = [
            get.map(Area::Get),
            bounds.map(Area::Bounds),
            object.map(Area::Object),
            circle.map(Area::Circle),
            tile.map(Area::Tile),
            quadkey.filter(|value| !value.is_empty()).map(Area::Quadkey),
            hash.filter(|value| !value.is_empty()).map(Area::Hash),
            point.map(Area::Point),
            roam.map(Area::Roam),
        ];

        let mut populated: Vec<Area> = candidates.into_iter().flatten().collect();
        match populated.len() {
            0 => Ok(None),
            1 => Ok(populated.pop()),
            _ => Err(EncodeError::MultipleAreas {
                found: populated.iter().map(AreaPredicate::keyword).collect(),
            }),
        }
    }
}
