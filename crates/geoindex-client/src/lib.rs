//! Client for a Tile38-compatible geospatial index engine.
//!
//! The crate turns typed query builders into the engine's positional command
//! grammar, sends them over a RESP connection, and decodes the JSON reply
//! envelope into typed results. Geofence notifications arrive through
//! [`Subscription`] handles, each owning a dedicated connection.
//!
//! The network sits behind the [`Transport`] trait so tests and embedding
//! applications can substitute their own connection.
//!
//! ```no_run
//! use geoindex_client::{Client, NearbyQuery, Point};
//! use geoindex_config::Config;
//!
//! # fn main() -> Result<(), geoindex_client::ClientError> {
//! let client = Client::connect(&Config::default())?;
//! let query = NearbyQuery::new("fleet", Point::new(33.5123, -112.2693).within(500.0));
//! let found = client.nearby(&query)?;
//! println!("{} objects nearby", found.count);
//! # Ok(())
//! # }
//! ```

mod args;
mod client;
mod command;
mod envelope;
mod errors;
mod filter;
mod hooks;
mod objects;
mod subscription;
pub mod telemetry;
mod transport;

pub use args::{Arg, Args};
pub use client::{Client, OutputMode, ScriptCall};
pub use command::Command;
pub use envelope::{
    Ack, BoundsHit, BoundsResult, ChansResult, Coordinates, Corners, EvalResult, FilterResult,
    GetResult, HashHit, HookInfo, HooksResult, JgetResult, KeysResult, ObjectHit, PingResult,
    PointHit, ScriptExistsResult, ScriptLoadResult, ServerResult, StatsResult, TestResult,
    TtlResult, decode_reply,
};
pub use errors::{ClientError, CommandError, EncodeError, TransportError};
pub use filter::{
    Area, AreaOptions, AreaPredicate, BoundingBox, Circle, Detect, FenceCommand, FenceOptions,
    FilterOption, GetTarget, IntersectsQuery, NearbyArea, NearbyQuery, Output, OutputFormat, Page,
    Point, Query, QueryKind, RegionArea, Roam, ScanQuery, ScriptFilter, SearchQuery, Sort, Tile,
    ToArgs, ValueFilters, WhereIn, WhereRange, WithinQuery,
};
pub use geoindex_config::Config;
pub use hooks::{
    ChannelRegistration, Geofence, GeofenceEvent, GeofenceKind, HookRegistration,
    RegistrationOption,
};
pub use objects::{
    Condition, FsetCommand, GetFormat, GetQuery, JsetCommand, JsetMode, Relation, SetCommand,
    SetValue, TestQuery,
};
pub use subscription::{PushMessage, Subscription, SubscriptionKind};
pub use transport::{
    CONNECTION_TIMEOUT, CloseHandle, ConnectionSettings, PushTransport, RespCloser,
    RespConnection, RespSubscriber, Transport,
};

#[cfg(test)]
mod tests;
