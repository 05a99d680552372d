//! Reply envelope decoding and typed result payloads.
//!
//! Once JSON output is negotiated every reply is a JSON object carrying
//! `ok`, `elapsed` and, on failure, `err`. [`decode_reply`] checks the
//! envelope first and only then deserialises the payload, so a failed
//! command never yields a partially populated result.

use std::collections::BTreeMap;

use serde::de::{DeserializeOwned, Error as _};
use serde::Deserialize;
use serde_json::Value;

use crate::command::Command;
use crate::errors::{ClientError, CommandError};

/// Decodes a raw JSON reply into `T`, raising on `ok: false`.
///
/// # Errors
///
/// Returns [`ClientError::Decode`] when the reply is not a JSON object with
/// an `ok` member or does not match `T`, and [`ClientError::Command`] when
/// the engine reported failure.
pub fn decode_reply<T>(command: Command, raw: &str) -> Result<T, ClientError>
where
    T: DeserializeOwned,
{
    let decode = |source| ClientError::Decode { command, source };
    let value: Value = serde_json::from_str(raw).map_err(decode)?;

    let ok = value
        .get("ok")
        .and_then(Value::as_bool)
        .ok_or_else(|| decode(serde_json::Error::missing_field("ok")))?;
    if !ok {
        return Err(failure(command, &value));
    }

    serde_json::from_value(value).map_err(decode)
}

fn failure(command: Command, envelope: &Value) -> ClientError {
    let message = envelope
        .get("err")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    CommandError::new(command, message).into()
}

/// Raises on a JSON envelope carrying `ok: false`; any other reply passes.
///
/// Used for replies that may arrive in either output mode, where a plain
/// RESP acknowledgement is not an error.
///
/// # Errors
///
/// Returns [`ClientError::Command`] when `raw` is a failed JSON envelope.
pub(crate) fn reject_failed_envelope(command: Command, raw: &str) -> Result<(), ClientError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) if value.get("ok").and_then(Value::as_bool) == Some(false) => {
            Err(failure(command, &value))
        }
        _ => Ok(()),
    }
}

/// Reply of commands that only acknowledge success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Ack {
    /// Server-side processing time, e.g. `"25.3µs"`.
    #[serde(default)]
    pub elapsed: String,
}

/// Reply of `PING`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PingResult {
    /// Always `"pong"`.
    pub ping: String,
    /// Server-side processing time.
    #[serde(default)]
    pub elapsed: String,
}

/// A latitude/longitude pair as the engine reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Coordinates {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
    /// Optional elevation.
    #[serde(default)]
    pub z: Option<f64>,
}

/// South-west and north-east corners of a bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Corners {
    /// South-west corner.
    pub sw: Coordinates,
    /// North-east corner.
    pub ne: Coordinates,
}

/// One result of an `objects` search.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectHit {
    /// Object id.
    pub id: String,
    /// GeoJSON geometry or string value.
    pub object: Value,
    /// Field values, if the object has any and `NOFIELDS` was not set.
    #[serde(default)]
    pub fields: Option<Value>,
    /// Distance in meters, with `DISTANCE`.
    #[serde(default)]
    pub distance: Option<f64>,
}

/// One result of a `points` search.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PointHit {
    /// Object id.
    pub id: String,
    /// Object position.
    pub point: Coordinates,
    /// Field values.
    #[serde(default)]
    pub fields: Option<Value>,
    /// Distance in meters, with `DISTANCE`.
    #[serde(default)]
    pub distance: Option<f64>,
}

/// One result of a `bounds` search.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoundsHit {
    /// Object id.
    pub id: String,
    /// Object bounding box.
    pub bounds: Corners,
    /// Field values.
    #[serde(default)]
    pub fields: Option<Value>,
    /// Distance in meters, with `DISTANCE`.
    #[serde(default)]
    pub distance: Option<f64>,
}

/// One result of a `hashes` search.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HashHit {
    /// Object id.
    pub id: String,
    /// Geohash of the object.
    pub hash: String,
    /// Field values.
    #[serde(default)]
    pub fields: Option<Value>,
    /// Distance in meters, with `DISTANCE`.
    #[serde(default)]
    pub distance: Option<f64>,
}

/// Reply of `SCAN`, `SEARCH`, `NEARBY`, `INTERSECTS` and `WITHIN`.
///
/// Only the list matching the requested output format is populated; the
/// others stay empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterResult {
    /// Number of results in this page.
    pub count: u64,
    /// Cursor for the next page; `0` when exhausted.
    pub cursor: u64,
    /// Field names, in the order per-hit field arrays use.
    pub fields: Vec<String>,
    /// `ids` output.
    pub ids: Vec<String>,
    /// `objects` output.
    pub objects: Vec<ObjectHit>,
    /// `points` output.
    pub points: Vec<PointHit>,
    /// `bounds` output.
    pub bounds: Vec<BoundsHit>,
    /// `hashes` output.
    pub hashes: Vec<HashHit>,
    /// Server-side processing time.
    pub elapsed: String,
}

/// Reply of `GET`.
///
/// Exactly one of `object`, `point`, `bounds` or `hash` is populated,
/// depending on the requested format.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GetResult {
    /// GeoJSON geometry or string value.
    pub object: Option<Value>,
    /// Point form.
    pub point: Option<Coordinates>,
    /// Bounding-box form.
    pub bounds: Option<Corners>,
    /// Geohash form.
    pub hash: Option<String>,
    /// Field values, with `WITHFIELDS`.
    pub fields: Option<Value>,
    /// Server-side processing time.
    pub elapsed: String,
}

/// Reply of `TTL`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TtlResult {
    /// Remaining seconds; `-1` when the object does not expire.
    pub ttl: f64,
    /// Server-side processing time.
    #[serde(default)]
    pub elapsed: String,
}

/// Reply of `KEYS`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeysResult {
    /// Matching collection names.
    #[serde(default)]
    pub keys: Vec<String>,
    /// Server-side processing time.
    #[serde(default)]
    pub elapsed: String,
}

/// Reply of `BOUNDS`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BoundsResult {
    /// GeoJSON polygon enclosing every object of the collection.
    pub bounds: Value,
    /// Server-side processing time.
    #[serde(default)]
    pub elapsed: String,
}

/// Reply of `STATS`: one entry per requested key, `null` when absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatsResult {
    /// Per-collection statistics.
    #[serde(default)]
    pub stats: Vec<Value>,
    /// Server-side processing time.
    #[serde(default)]
    pub elapsed: String,
}

/// Reply of `SERVER`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerResult {
    /// Server statistics keyed by name.
    #[serde(default)]
    pub stats: BTreeMap<String, Value>,
    /// Server-side processing time.
    #[serde(default)]
    pub elapsed: String,
}

/// Reply of `JGET`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JgetResult {
    /// Value at the requested path.
    #[serde(default)]
    pub value: Value,
    /// Server-side processing time.
    #[serde(default)]
    pub elapsed: String,
}

/// Reply of the `EVAL` family.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EvalResult {
    /// Value returned by the script.
    #[serde(default)]
    pub result: Value,
    /// Server-side processing time.
    #[serde(default)]
    pub elapsed: String,
}

/// Reply of `SCRIPT LOAD`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScriptLoadResult {
    /// SHA-1 digest identifying the cached script.
    pub result: String,
    /// Server-side processing time.
    #[serde(default)]
    pub elapsed: String,
}

/// Reply of `SCRIPT EXISTS`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScriptExistsResult {
    /// `1` for each cached digest, `0` otherwise, in request order.
    #[serde(default)]
    pub result: Vec<u8>,
    /// Server-side processing time.
    #[serde(default)]
    pub elapsed: String,
}

impl ScriptExistsResult {
    /// Whether each requested digest is cached.
    #[must_use]
    pub fn exists(&self) -> Vec<bool> {
        self.result.iter().map(|flag| *flag != 0).collect()
    }
}

/// Reply of `TEST`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TestResult {
    /// Whether the relation holds.
    pub result: bool,
    /// Clipped geometry, with `CLIP`.
    #[serde(default)]
    pub object: Option<Value>,
    /// Server-side processing time.
    #[serde(default)]
    pub elapsed: String,
}

/// A hook or channel registered in the engine.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HookInfo {
    /// Registration name.
    pub name: String,
    /// Collection the geofence watches.
    pub key: String,
    /// Remaining lifetime in seconds, if the registration expires.
    pub ttl: Option<f64>,
    /// Delivery endpoints; empty for channels.
    pub endpoints: Vec<String>,
    /// Geofence command tokens as registered.
    pub command: Vec<String>,
    /// Metadata attached with `META`.
    pub meta: BTreeMap<String, String>,
}

/// Reply of `HOOKS`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HooksResult {
    /// Matching hooks.
    #[serde(default)]
    pub hooks: Vec<HookInfo>,
    /// Server-side processing time.
    #[serde(default)]
    pub elapsed: String,
}

/// Reply of `CHANS`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChansResult {
    /// Matching channels.
    #[serde(default)]
    pub chans: Vec<HookInfo>,
    /// Server-side processing time.
    #[serde(default)]
    pub elapsed: String,
}
