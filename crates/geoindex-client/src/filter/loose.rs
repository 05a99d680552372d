//! The loose option record and its checked conversion into typed queries.
//!
//! [`FilterOption`] mirrors the engine's JSON-friendly superset of every
//! search-family option. It is convenient for callers that receive options
//! as data (a request body, a fixture file), but nothing stops it from
//! carrying a `CLIP` for a `NEARBY` or a `DISTANCE` for a `WITHIN`.
//! [`Query::from_option`] applies the per-family rules and produces the
//! typed query, so illegal combinations fail before any I/O.

use serde::{Deserialize, Serialize};

use crate::args::Args;
use crate::command::Command;
use crate::errors::EncodeError;

use super::area::{Area, AreaOptions, AreaPredicate, NearbyArea, RegionArea};
use super::options::{
    Detect, FenceCommand, FenceOptions, Output, OutputFormat, Page, Sort, ValueFilters,
};
use super::query::{
    IntersectsQuery, NearbyQuery, ScanQuery, SearchQuery, ToArgs, WithinQuery,
};

/// Superset of every search-family option, at most one area populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterOption {
    /// Collection to query.
    pub key: String,
    /// `CURSOR`, `LIMIT` and `MATCH`.
    #[serde(flatten)]
    pub page: Page,
    /// `SPARSE n`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparse: Option<u8>,
    /// `DISTANCE`.
    pub distance: bool,
    /// `asc` or `desc`.
    #[serde(alias = "order", skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
    /// `WHERE`, `WHEREIN`, `WHEREEVAL` and `WHEREEVALSHA`.
    #[serde(flatten)]
    pub filters: ValueFilters,
    /// `CLIP`.
    pub clip: bool,
    /// `NOFIELDS`.
    pub no_fields: bool,
    /// `FENCE`.
    pub fence: bool,
    /// `NODWELL`.
    #[serde(alias = "nodwell")]
    pub no_dwell: bool,
    /// `COMMANDS`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<FenceCommand>,
    /// `DETECT`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub detect: Vec<Detect>,
    /// Output format keyword.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputFormat>,
    /// Geohash precision for `hashes` output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,
    /// The area predicate fields.
    #[serde(flatten)]
    pub area: AreaOptions,
}

/// Search-family command a [`FilterOption`] is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// `SCAN`.
    Scan,
    /// `SEARCH`.
    Search,
    /// `NEARBY`.
    Nearby,
    /// `INTERSECTS`.
    Intersects,
    /// `WITHIN`.
    Within,
}

impl QueryKind {
    /// Engine command of this family.
    #[must_use]
    pub const fn command(self) -> Command {
        match self {
            Self::Scan => Command::Scan,
            Self::Search => Command::Search,
            Self::Nearby => Command::Nearby,
            Self::Intersects => Command::Intersects,
            Self::Within => Command::Within,
        }
    }
}

/// A validated search-family query.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// `SCAN`.
    Scan(ScanQuery),
    /// `SEARCH`.
    Search(SearchQuery),
    /// `NEARBY`.
    Nearby(NearbyQuery),
    /// `INTERSECTS`.
    Intersects(IntersectsQuery),
    /// `WITHIN`.
    Within(WithinQuery),
}

fn reject(command: Command, present: bool, option: &'static str) -> Result<(), EncodeError> {
    if present {
        Err(EncodeError::UnsupportedOption { command, option })
    } else {
        Ok(())
    }
}

fn resolve_output(
    format: Option<OutputFormat>,
    precision: Option<u8>,
) -> Result<Option<Output>, EncodeError> {
    let output = match (format, precision) {
        (None, None) => return Ok(None),
        (Some(OutputFormat::Hashes), Some(precision)) => Output::Hashes(precision),
        (Some(OutputFormat::Hashes), None) => return Err(EncodeError::MissingPrecision),
        (_, Some(_)) => return Err(EncodeError::PrecisionWithoutHashes),
        (Some(OutputFormat::Count), None) => Output::Count,
        (Some(OutputFormat::Ids), None) => Output::Ids,
        (Some(OutputFormat::Objects), None) => Output::Objects,
        (Some(OutputFormat::Points), None) => Output::Points,
        (Some(OutputFormat::Bounds), None) => Output::Bounds,
    };
    Ok(Some(output))
}

fn resolve_fence(option: &mut FilterOption) -> Result<Option<FenceOptions>, EncodeError> {
    if option.fence {
        return Ok(Some(FenceOptions {
            no_dwell: option.no_dwell,
            commands: std::mem::take(&mut option.commands),
            detect: std::mem::take(&mut option.detect),
        }));
    }
    let stray = [
        (option.no_dwell, "NODWELL"),
        (!option.commands.is_empty(), "COMMANDS"),
        (!option.detect.is_empty(), "DETECT"),
    ];
    match stray.into_iter().find(|(present, _)| *present) {
        Some((_, name)) => Err(EncodeError::FenceOptionWithoutFence { option: name }),
        None => Ok(None),
    }
}

fn sparse_present(option: &FilterOption) -> bool {
    option.sparse.is_some_and(|value| value > 0)
}

fn reject_geometric_options(command: Command, option: &FilterOption) -> Result<(), EncodeError> {
    reject(command, sparse_present(option), "SPARSE")?;
    reject(command, option.distance, "DISTANCE")?;
    reject(command, option.clip, "CLIP")?;
    reject(command, option.fence, "FENCE")?;
    reject(command, option.no_dwell, "NODWELL")?;
    reject(command, !option.commands.is_empty(), "COMMANDS")?;
    reject(command, !option.detect.is_empty(), "DETECT")
}

fn require_area<A>(command: Command, area: Option<Area>) -> Result<A, EncodeError>
where
    A: TryFrom<Area, Error = Area>,
{
    let area = area.ok_or(EncodeError::MissingArea { command })?;
    A::try_from(area).map_err(|rejected| EncodeError::AreaNotAllowed {
        command,
        area: rejected.keyword(),
    })
}

impl Query {
    /// Validates `option` against the grammar of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::MultipleAreas`] when more than one area is
    /// populated, [`EncodeError::MissingArea`] or
    /// [`EncodeError::AreaNotAllowed`] when the area does not fit the
    /// family, [`EncodeError::UnsupportedOption`] for options outside the
    /// family's grammar, and the output/fence consistency errors.
    pub fn from_option(kind: QueryKind, mut option: FilterOption) -> Result<Self, EncodeError> {
        let command = kind.command();
        let area = std::mem::take(&mut option.area).resolve()?;
        let output = resolve_output(option.output, option.precision)?;

        match kind {
            QueryKind::Scan | QueryKind::Search => {
                reject_geometric_options(command, &option)?;
                if let Some(area) = area {
                    return Err(EncodeError::AreaNotAllowed {
                        command,
                        area: area.keyword(),
                    });
                }
                let FilterOption {
                    key,
                    page,
                    sort,
                    filters,
                    no_fields,
                    ..
                } = option;
                Ok(if kind == QueryKind::Scan {
                    Self::Scan(ScanQuery {
                        key,
                        page,
                        sort,
                        filters,
                        no_fields,
                        output,
                    })
                } else {
                    Self::Search(SearchQuery {
                        key,
                        page,
                        sort,
                        filters,
                        no_fields,
                        output,
                    })
                })
            }
            QueryKind::Nearby => {
                reject(command, option.sort.is_some(), "sort")?;
                reject(command, option.clip, "CLIP")?;
                let area: NearbyArea = require_area(command, area)?;
                let fence = resolve_fence(&mut option)?;
                Ok(Self::Nearby(NearbyQuery {
                    key: option.key,
                    page: option.page,
                    sparse: option.sparse,
                    distance: option.distance,
                    filters: option.filters,
                    no_fields: option.no_fields,
                    fence,
                    output,
                    area,
                }))
            }
            QueryKind::Intersects => {
                reject(command, option.sort.is_some(), "sort")?;
                reject(command, option.distance, "DISTANCE")?;
                let area: RegionArea = require_area(command, area)?;
                let fence = resolve_fence(&mut option)?;
                Ok(Self::Intersects(IntersectsQuery {
                    key: option.key,
                    page: option.page,
                    sparse: option.sparse,
                    filters: option.filters,
                    clip: option.clip,
                    no_fields: option.no_fields,
                    fence,
                    output,
                    area,
                }))
            }
            QueryKind::Within => {
                reject(command, option.sort.is_some(), "sort")?;
                reject(command, option.distance, "DISTANCE")?;
                reject(command, option.clip, "CLIP")?;
                let area: RegionArea = require_area(command, area)?;
                let fence = resolve_fence(&mut option)?;
                Ok(Self::Within(WithinQuery {
                    key: option.key,
                    page: option.page,
                    sparse: option.sparse,
                    filters: option.filters,
                    no_fields: option.no_fields,
                    fence,
                    output,
                    area,
                }))
            }
        }
    }

    /// Family of this query.
    #[must_use]
    pub const fn kind(&self) -> QueryKind {
        match self {
            Self::Scan(_) => QueryKind::Scan,
            Self::Search(_) => QueryKind::Search,
            Self::Nearby(_) => QueryKind::Nearby,
            Self::Intersects(_) => QueryKind::Intersects,
            Self::Within(_) => QueryKind::Within,
        }
    }

    fn as_to_args(&self) -> &dyn ToArgs {
        match self {
            Self::Scan(query) => query,
            Self::Search(query) => query,
            Self::Nearby(query) => query,
            Self::Intersects(query) => query,
            Self::Within(query) => query,
        }
    }
}

impl ToArgs for Query {
    fn command(&self) -> Command {
        self.kind().command()
    }

    fn to_args(&self) -> Result<Args, EncodeError> {
        self.as_to_args().to_args()
    }
}

impl From<ScanQuery> for Query {
    fn from(query: ScanQuery) -> Self {
        Self::Scan(query)
    }
}

impl From<SearchQuery> for Query {
    fn from(query: SearchQuery) -> Self {
        Self::Search(query)
    }
}

impl From<NearbyQuery> for Query {
    fn from(query: NearbyQuery) -> Self {
        Self::Nearby(query)
    }
}

impl From<IntersectsQuery> for Query {
    fn from(query: IntersectsQuery) -> Self {
        Self::Intersects(query)
    }
}

impl From<WithinQuery> for Query {
    fn from(query: WithinQuery) -> Self {
        Self::Within(query)
    }
}
