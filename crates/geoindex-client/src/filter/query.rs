//! Typed search-family queries and the shared clause encoder.

use crate::args::Args;
use crate::command::Command;
use crate::errors::EncodeError;

use super::area::{AreaPredicate, NearbyArea, RegionArea};
use super::options::{FenceOptions, Output, Page, Sort, ValueFilters, WhereRange};

/// Converts a typed query into the argument vector of its command.
pub trait ToArgs {
    /// Command the arguments belong to.
    fn command(&self) -> Command;

    /// Encodes the arguments in engine grammar order.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodeError`] when a value cannot be expressed on the
    /// wire, such as an empty key or a NaN coordinate.
    fn to_args(&self) -> Result<Args, EncodeError>;
}

/// Borrowed view over every clause the search grammar knows.
///
/// All five query types (and hook/channel registrations) encode through
/// [`Clauses::encode`], so the positional order lives in one place.
#[derive(Default)]
pub(crate) struct Clauses<'a> {
    pub(crate) key: &'a str,
    pub(crate) page: Option<&'a Page>,
    pub(crate) sparse: Option<u8>,
    pub(crate) distance: bool,
    pub(crate) sort: Option<Sort>,
    pub(crate) filters: Option<&'a ValueFilters>,
    pub(crate) clip: bool,
    pub(crate) no_fields: bool,
    pub(crate) fence: Option<&'a FenceOptions>,
    pub(crate) output: Option<Output>,
    pub(crate) area: Option<&'a dyn AreaPredicate>,
}

static DEFAULT_FENCE: FenceOptions = FenceOptions {
    no_dwell: false,
    commands: Vec::new(),
    detect: Vec::new(),
};

impl<'a> Clauses<'a> {
    /// Turns `FENCE` on even when the caller did not ask for it.
    pub(crate) fn force_fence(mut self) -> Self {
        if self.fence.is_none() {
            self.fence = Some(&DEFAULT_FENCE);
        }
        self
    }

    pub(crate) fn encode(&self) -> Result<Args, EncodeError> {
        if self.key.is_empty() {
            return Err(EncodeError::MissingKey);
        }

        let mut args = Args::new();
        args.push(self.key);

        if let Some(page) = self.page {
            args.keyword_value("CURSOR", page.wire_cursor())
                .keyword_value("LIMIT", page.wire_limit());
        }
        args.keyword_value("SPARSE", self.sparse.filter(|value| *value > 0));
        if let Some(pattern) = self.page.and_then(Page::wire_pattern) {
            args.push("MATCH").push(pattern);
        }

        args.flag(self.distance, "DISTANCE");
        if let Some(sort) = self.sort {
            args.push(sort.token());
        }

        if let Some(filters) = self.filters {
            filters.encode_into(&mut args);
        }

        args.flag(self.clip, "CLIP").flag(self.no_fields, "NOFIELDS");
        if let Some(fence) = self.fence {
            fence.encode_into(&mut args);
        }

        if let Some(output) = self.output {
            output.encode_into(&mut args);
        }

        if let Some(area) = self.area {
            area.encode_into(&mut args)?;
        }

        Ok(args)
    }
}

/// `SCAN`: iterate a collection in id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanQuery {
    /// Collection to scan.
    pub key: String,
    /// Pagination and id matching.
    pub page: Page,
    /// Id ordering.
    pub sort: Option<Sort>,
    /// Field filters.
    pub filters: ValueFilters,
    /// Omit fields from the reply.
    pub no_fields: bool,
    /// Reply shape.
    pub output: Option<Output>,
}

impl ScanQuery {
    /// Scans every object of `key`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Caps the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.page.limit = Some(limit);
        self
    }

    /// Orders results by id.
    #[must_use]
    pub const fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Selects the reply shape.
    #[must_use]
    pub const fn output(mut self, output: Output) -> Self {
        self.output = Some(output);
        self
    }
}

impl ToArgs for ScanQuery {
    fn command(&self) -> Command {
        Command::Scan
    }

    fn to_args(&self) -> Result<Args, EncodeError> {
        Clauses {
            key: &self.key,
            page: Some(&self.page),
            sort: self.sort,
            filters: Some(&self.filters),
            no_fields: self.no_fields,
            output: self.output,
            ..Clauses::default()
        }
        .encode()
    }
}

/// `SEARCH`: string-value search with no geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    /// Collection to search.
    pub key: String,
    /// Pagination and value matching.
    pub page: Page,
    /// Value ordering.
    pub sort: Option<Sort>,
    /// Field filters.
    pub filters: ValueFilters,
    /// Omit fields from the reply.
    pub no_fields: bool,
    /// Reply shape.
    pub output: Option<Output>,
}

impl SearchQuery {
    /// Searches the string values of `key`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Keeps values matching the glob `pattern`.
    #[must_use]
    pub fn matching(mut self, pattern: impl Into<String>) -> Self {
        self.page.pattern = Some(pattern.into());
        self
    }

    /// Orders results by value.
    #[must_use]
    pub const fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Selects the reply shape.
    #[must_use]
    pub const fn output(mut self, output: Output) -> Self {
        self.output = Some(output);
        self
    }
}

impl ToArgs for SearchQuery {
    fn command(&self) -> Command {
        Command::Search
    }

    fn to_args(&self) -> Result<Args, EncodeError> {
        Clauses {
            key: &self.key,
            page: Some(&self.page),
            sort: self.sort,
            filters: Some(&self.filters),
            no_fields: self.no_fields,
            output: self.output,
            ..Clauses::default()
        }
        .encode()
    }
}

/// `NEARBY`: distance-ordered search around a point, or a roaming fence.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    /// Collection to search.
    pub key: String,
    /// Pagination and id matching.
    pub page: Page,
    /// Spread results over `4^sparse` sub-areas.
    pub sparse: Option<u8>,
    /// Include the distance to each result.
    pub distance: bool,
    /// Field filters.
    pub filters: ValueFilters,
    /// Omit fields from the reply.
    pub no_fields: bool,
    /// Geofence behaviour; `None` for a one-shot query.
    pub fence: Option<FenceOptions>,
    /// Reply shape.
    pub output: Option<Output>,
    /// Search centre.
    pub area: NearbyArea,
}

/// `INTERSECTS`: objects overlapping an area.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectsQuery {
    /// Collection to search.
    pub key: String,
    /// Pagination and id matching.
    pub page: Page,
    /// Spread results over `4^sparse` sub-areas.
    pub sparse: Option<u8>,
    /// Field filters.
    pub filters: ValueFilters,
    /// Clip returned geometries to the area.
    pub clip: bool,
    /// Omit fields from the reply.
    pub no_fields: bool,
    /// Geofence behaviour; `None` for a one-shot query.
    pub fence: Option<FenceOptions>,
    /// Reply shape.
    pub output: Option<Output>,
    /// Area to intersect.
    pub area: RegionArea,
}

/// `WITHIN`: objects fully contained in an area.
#[derive(Debug, Clone, PartialEq)]
pub struct WithinQuery {
    /// Collection to search.
    pub key: String,
    /// Pagination and id matching.
    pub page: Page,
    /// Spread results over `4^sparse` sub-areas.
    pub sparse: Option<u8>,
    /// Field filters.
    pub filters: ValueFilters,
    /// Omit fields from the reply.
    pub no_fields: bool,
    /// Geofence behaviour; `None` for a one-shot query.
    pub fence: Option<FenceOptions>,
    /// Reply shape.
    pub output: Option<Output>,
    /// Containing area.
    pub area: RegionArea,
}

/// Builder methods shared by the three geometric queries.
macro_rules! geometric_builders {
    ($query:ident, $command:expr) => {
        impl $query {
            /// Caps the number of results.
            #[must_use]
            pub const fn limit(mut self, limit: u64) -> Self {
                self.page.limit = Some(limit);
                self
            }

            /// Resumes from a previous reply's cursor.
            #[must_use]
            pub const fn cursor(mut self, cursor: u64) -> Self {
                self.page.cursor = Some(cursor);
                self
            }

            /// Spreads results over `4^sparse` sub-areas.
            #[must_use]
            pub const fn sparse(mut self, sparse: u8) -> Self {
                self.sparse = Some(sparse);
                self
            }

            /// Selects the reply shape.
            #[must_use]
            pub const fn output(mut self, output: Output) -> Self {
                self.output = Some(output);
                self
            }

            /// Adds a `WHERE` range; repeated fields are kept as-is.
            #[must_use]
            pub fn where_range(mut self, range: WhereRange) -> Self {
                self.filters.wheres.push(range);
                self
            }

            /// Turns the query into a geofence.
            #[must_use]
            pub fn fence(mut self, fence: FenceOptions) -> Self {
                self.fence = Some(fence);
                self
            }
        }

        impl ToArgs for $query {
            fn command(&self) -> Command {
                $command
            }

            fn to_args(&self) -> Result<Args, EncodeError> {
                self.clauses().encode()
            }
        }
    };
}

geometric_builders!(NearbyQuery, Command::Nearby);
geometric_builders!(IntersectsQuery, Command::Intersects);
geometric_builders!(WithinQuery, Command::Within);

impl NearbyQuery {
    /// Searches `key` around `area`.
    #[must_use]
    pub fn new(key: impl Into<String>, area: impl Into<NearbyArea>) -> Self {
        Self {
            key: key.into(),
            page: Page::default(),
            sparse: None,
            distance: false,
            filters: ValueFilters::default(),
            no_fields: false,
            fence: None,
            output: None,
            area: area.into(),
        }
    }

    /// Includes the distance to each result.
    #[must_use]
    pub const fn with_distance(mut self) -> Self {
        self.distance = true;
        self
    }

    pub(crate) fn clauses(&self) -> Clauses<'_> {
        Clauses {
            key: &self.key,
            page: Some(&self.page),
            sparse: self.sparse,
            distance: self.distance,
            filters: Some(&self.filters),
            no_fields: self.no_fields,
            fence: self.fence.as_ref(),
            output: self.output,
            area: Some(&self.area),
            ..Clauses::default()
        }
    }
}

impl IntersectsQuery {
    /// Searches `key` for objects overlapping `area`.
    #[must_use]
    pub fn new(key: impl Into<String>, area: impl Into<RegionArea>) -> Self {
        Self {
            key: key.into(),
            page: Page::default(),
            sparse: None,
            filters: ValueFilters::default(),
            clip: false,
            no_fields: false,
            fence: None,
            output: None,
            area: area.into(),
        }
    }

    /// Clips returned geometries to the area.
    #[must_use]
    pub const fn clipped(mut self) -> Self {
        self.clip = true;
        self
    }

    pub(crate) fn clauses(&self) -> Clauses<'_> {
        Clauses {
            key: &self.key,
            page: Some(&self.page),
            sparse: self.sparse,
            filters: Some(&self.filters),
            clip: self.clip,
            no_fields: self.no_fields,
            fence: self.fence.as_ref(),
            output: self.output,
            area: Some(&self.area),
            ..Clauses::default()
        }
    }
}

impl WithinQuery {
    /// Searches `key` for objects inside `area`.
    #[must_use]
    pub fn new(key: impl Into<String>, area: impl Into<RegionArea>) -> Self {
        Self {
            key: key.into(),
            page: Page::default(),
            sparse: None,
            filters: ValueFilters::default(),
            no_fields: false,
            fence: None,
            output: None,
            area: area.into(),
        }
    }

    pub(crate) fn clauses(&self) -> Clauses<'_> {
        Clauses {
            key: &self.key,
            page: Some(&self.page),
            sparse: self.sparse,
            filters: Some(&self.filters),
            no_fields: self.no_fields,
            fence: self.fence.as_ref(),
            output: self.output,
            area: Some(&self.area),
            ..Clauses::default()
        }
    }
}
