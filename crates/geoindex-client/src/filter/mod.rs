//! Search-family argument encoding.
//!
//! `SCAN`, `SEARCH`, `NEARBY`, `INTERSECTS` and `WITHIN` share one
//! positional grammar. The engine parses it left to right, so the encoder
//! always emits clauses in the same order, whatever order the caller set
//! them in:
//!
//! 1. key
//! 2. `CURSOR`, `LIMIT`, `SPARSE`, `MATCH`
//! 3. `DISTANCE`
//! 4. `asc` / `desc`
//! 5. `WHERE`, `WHEREIN`, `WHEREEVAL`, `WHEREEVALSHA`
//! 6. `CLIP`, `NOFIELDS`, `FENCE`, `NODWELL`
//! 7. `COMMANDS`
//! 8. `DETECT`
//! 9. output format, then geohash precision
//! 10. exactly one area predicate
//!
//! Absent, zero and empty values are omitted rather than sent as empty
//! tokens. Each family has a typed query carrying only its legal options;
//! [`FilterOption`] is the loose superset, converted through
//! [`Query::from_option`].

mod area;
mod loose;
mod options;
mod query;

pub use self::area::{
    Area, AreaOptions, AreaPredicate, BoundingBox, Circle, GetTarget, NearbyArea, Point,
    RegionArea, Roam, Tile,
};
pub use self::loose::{FilterOption, Query, QueryKind};
pub use self::options::{
    Detect, FenceCommand, FenceOptions, Output, OutputFormat, Page, ScriptFilter, Sort,
    ValueFilters, WhereIn, WhereRange,
};
pub use self::query::{
    IntersectsQuery, NearbyQuery, ScanQuery, SearchQuery, ToArgs, WithinQuery,
};

pub(crate) use self::area::finite;
pub(crate) use self::query::Clauses;

#[cfg(test)]
mod tests;
