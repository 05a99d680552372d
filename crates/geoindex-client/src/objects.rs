//! Argument builders for key/object commands.
//!
//! These commands do not use the search grammar; each has its own short
//! positional layout, built here literal by literal.

use std::time::Duration;

use serde_json::Value;

use crate::args::{Arg, Args};
use crate::command::Command;
use crate::errors::EncodeError;
use crate::filter::{Area, AreaPredicate, BoundingBox, ToArgs, finite};

fn require_key(key: &str) -> Result<(), EncodeError> {
    if key.is_empty() {
        Err(EncodeError::MissingKey)
    } else {
        Ok(())
    }
}

/// Value stored by `SET`.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    /// `POINT lat lon [z]`.
    Point {
        /// Latitude.
        lat: f64,
        /// Longitude.
        lon: f64,
        /// Elevation.
        z: Option<f64>,
    },
    /// `BOUNDS minlat minlon maxlat maxlon`.
    Bounds(BoundingBox),
    /// `HASH geohash`.
    Hash(String),
    /// `OBJECT geojson`.
    Object(Value),
    /// `STRING value`.
    String(String),
}

impl SetValue {
    /// A point without elevation.
    #[must_use]
    pub const fn point(lat: f64, lon: f64) -> Self {
        Self::Point { lat, lon, z: None }
    }

    fn encode_into(&self, args: &mut Args) -> Result<(), EncodeError> {
        match self {
            Self::Point { lat, lon, z } => {
                args.push("POINT")
                    .push(finite("lat", *lat)?)
                    .push(finite("lon", *lon)?);
                if let Some(z) = z {
                    args.push(finite("z", *z)?);
                }
            }
            Self::Bounds(bounds) => Area::Bounds(*bounds).encode_into(args)?,
            Self::Hash(hash) => {
                args.push("HASH").push(hash);
            }
            Self::Object(object) => Area::Object(object.clone()).encode_into(args)?,
            Self::String(value) => {
                args.push("STRING").push(value);
            }
        }
        Ok(())
    }
}

/// Write condition of `SET` and `FSET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Only write when the object does not exist.
    Nx,
    /// Only write when the object already exists.
    Xx,
}

impl Condition {
    const fn token(self) -> &'static str {
        match self {
            Self::Nx => "NX",
            Self::Xx => "XX",
        }
    }
}

/// `SET key id [FIELD name value]* [EX seconds] [NX|XX] value`.
#[derive(Debug, Clone, PartialEq)]
pub struct SetCommand {
    /// Collection.
    pub key: String,
    /// Object id.
    pub id: String,
    /// Field values, in insertion order.
    pub fields: Vec<(String, Arg)>,
    /// Time to live.
    pub expire: Option<Duration>,
    /// Write condition.
    pub condition: Option<Condition>,
    /// Stored value.
    pub value: SetValue,
}

impl SetCommand {
    /// Stores `value` as object `id` of `key`.
    #[must_use]
    pub fn new(key: impl Into<String>, id: impl Into<String>, value: SetValue) -> Self {
        Self {
            key: key.into(),
            id: id.into(),
            fields: Vec::new(),
            expire: None,
            condition: None,
            value,
        }
    }

    /// Attaches a field value.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Expires the object after `ttl`.
    #[must_use]
    pub const fn expire_in(mut self, ttl: Duration) -> Self {
        self.expire = Some(ttl);
        self
    }

    /// Writes only under `condition`.
    #[must_use]
    pub const fn only_if(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

impl ToArgs for SetCommand {
    fn command(&self) -> Command {
        Command::Set
    }

    fn to_args(&self) -> Result<Args, EncodeError> {
        require_key(&self.key)?;
        let mut args = Args::new();
        args.push(&self.key).push(&self.id);
        for (name, value) in &self.fields {
            args.push("FIELD").push(name).push(value.clone());
        }
        args.keyword_value("EX", self.expire.filter(|ttl| !ttl.is_zero()));
        if let Some(condition) = self.condition {
            args.push(condition.token());
        }
        self.value.encode_into(&mut args)?;
        Ok(args)
    }
}

/// Representation requested from `GET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetFormat {
    /// GeoJSON or string value.
    Object,
    /// Point.
    Point,
    /// Bounding box.
    Bounds,
    /// Geohash at the given precision.
    Hash(u8),
}

/// `GET key id [WITHFIELDS] [OBJECT|POINT|BOUNDS|HASH precision]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetQuery {
    /// Collection.
    pub key: String,
    /// Object id.
    pub id: String,
    /// Include field values.
    pub with_fields: bool,
    /// Representation; the engine defaults to `OBJECT`.
    pub format: Option<GetFormat>,
}

impl GetQuery {
    /// Fetches object `id` of `key` in its default form.
    #[must_use]
    pub fn new(key: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            id: id.into(),
            with_fields: false,
            format: None,
        }
    }

    /// Includes field values in the reply.
    #[must_use]
    pub const fn with_fields(mut self) -> Self {
        self.with_fields = true;
        self
    }

    /// Requests a specific representation.
    #[must_use]
    pub const fn format(mut self, format: GetFormat) -> Self {
        self.format = Some(format);
        self
    }
}

impl ToArgs for GetQuery {
    fn command(&self) -> Command {
        Command::Get
    }

    fn to_args(&self) -> Result<Args, EncodeError> {
        require_key(&self.key)?;
        let mut args = Args::new();
        args.push(&self.key)
            .push(&self.id)
            .flag(self.with_fields, "WITHFIELDS");
        match self.format {
            None => {}
            Some(GetFormat::Object) => {
                args.push("OBJECT");
            }
            Some(GetFormat::Point) => {
                args.push("POINT");
            }
            Some(GetFormat::Bounds) => {
                args.push("BOUNDS");
            }
            Some(GetFormat::Hash(precision)) => {
                args.push("HASH").push(precision);
            }
        }
        Ok(args)
    }
}

/// `FSET key id [XX] field value [field value ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FsetCommand {
    /// Collection.
    pub key: String,
    /// Object id.
    pub id: String,
    /// Skip silently when the object does not exist.
    pub only_existing: bool,
    /// Field values, in insertion order.
    pub fields: Vec<(String, Arg)>,
}

impl FsetCommand {
    /// Updates fields of object `id` in `key`.
    #[must_use]
    pub fn new<I, N, V>(key: impl Into<String>, id: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<Arg>,
    {
        Self {
            key: key.into(),
            id: id.into(),
            only_existing: false,
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }

    /// Adds `XX`.
    #[must_use]
    pub const fn only_existing(mut self) -> Self {
        self.only_existing = true;
        self
    }
}

impl ToArgs for FsetCommand {
    fn command(&self) -> Command {
        Command::Fset
    }

    fn to_args(&self) -> Result<Args, EncodeError> {
        require_key(&self.key)?;
        let mut args = Args::new();
        args.push(&self.key)
            .push(&self.id)
            .flag(self.only_existing, Condition::Xx.token());
        for (name, value) in &self.fields {
            args.push(name).push(value.clone());
        }
        Ok(args)
    }
}

/// How `JSET` interprets its value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JsetMode {
    /// Let the engine infer the JSON type.
    #[default]
    Auto,
    /// Store the value as raw JSON.
    Raw,
    /// Store the value as a JSON string.
    Str,
}

/// `JSET key id path value [RAW|STR]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsetCommand {
    /// Collection.
    pub key: String,
    /// Object id.
    pub id: String,
    /// Dotted JSON path.
    pub path: String,
    /// Value to store.
    pub value: String,
    /// Value interpretation.
    pub mode: JsetMode,
}

impl JsetCommand {
    /// Sets `path` of object `id` in `key` to `value`.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        id: impl Into<String>,
        path: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            id: id.into(),
            path: path.into(),
            value: value.into(),
            mode: JsetMode::Auto,
        }
    }

    /// Selects the value interpretation.
    #[must_use]
    pub const fn mode(mut self, mode: JsetMode) -> Self {
        self.mode = mode;
        self
    }
}

impl ToArgs for JsetCommand {
    fn command(&self) -> Command {
        Command::Jset
    }

    fn to_args(&self) -> Result<Args, EncodeError> {
        require_key(&self.key)?;
        let mut args = Args::new();
        args.push(&self.key)
            .push(&self.id)
            .push(&self.path)
            .push(&self.value)
            .flag(self.mode == JsetMode::Raw, "RAW")
            .flag(self.mode == JsetMode::Str, "STR");
        Ok(args)
    }
}

/// Spatial relation checked by `TEST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The areas overlap.
    Intersects,
    /// The first area lies inside the second.
    Within,
}

impl Relation {
    const fn token(self) -> &'static str {
        match self {
            Self::Intersects => "INTERSECTS",
            Self::Within => "WITHIN",
        }
    }
}

/// `TEST area (INTERSECTS|WITHIN) [CLIP] area`.
#[derive(Debug, Clone, PartialEq)]
pub struct TestQuery {
    /// Subject area.
    pub subject: Area,
    /// Relation to check.
    pub relation: Relation,
    /// Return the subject clipped to the target.
    pub clip: bool,
    /// Target area.
    pub target: Area,
}

impl TestQuery {
    /// Checks whether `subject` stands in `relation` to `target`.
    #[must_use]
    pub const fn new(subject: Area, relation: Relation, target: Area) -> Self {
        Self {
            subject,
            relation,
            clip: false,
            target,
        }
    }

    /// Adds `CLIP`.
    #[must_use]
    pub const fn clipped(mut self) -> Self {
        self.clip = true;
        self
    }
}

fn static_area(area: &Area) -> Result<&Area, EncodeError> {
    if matches!(area, Area::Roam(_)) {
        Err(EncodeError::AreaNotAllowed {
            command: Command::Test,
            area: area.keyword(),
        })
    } else {
        Ok(area)
    }
}

impl ToArgs for TestQuery {
    fn command(&self) -> Command {
        Command::Test
    }

    fn to_args(&self) -> Result<Args, EncodeError> {
        let mut args = Args::new();
        static_area(&self.subject)?.encode_into(&mut args)?;
        args.push(self.relation.token()).flag(self.clip, "CLIP");
        static_area(&self.target)?.encode_into(&mut args)?;
        Ok(args)
    }
}
