//! Option groups shared by the search-family commands.

use serde::{Deserialize, Serialize};

use crate::args::{Arg, Args};

/// Cursor-based pagination and id matching.
///
/// Zero and empty values are treated as absent: the engine rejects a
/// present-but-empty token instead of applying its default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Page {
    /// Number of results to skip, as returned by a previous reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<u64>,
    /// Maximum number of results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Glob over object ids.
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl Page {
    pub(crate) fn wire_cursor(&self) -> Option<u64> {
        self.cursor.filter(|value| *value > 0)
    }

    pub(crate) fn wire_limit(&self) -> Option<u64> {
        self.limit.filter(|value| *value > 0)
    }

    pub(crate) fn wire_pattern(&self) -> Option<&str> {
        self.pattern.as_deref().filter(|value| !value.is_empty())
    }
}

/// Result ordering for `SCAN` and `SEARCH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sort {
    /// Ascending by id (or value for `SEARCH`).
    Asc,
    /// Descending by id (or value for `SEARCH`).
    Desc,
}

impl Sort {
    /// Wire token.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// `WHERE field min max`: keep objects whose field lies within a range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereRange {
    /// Field name.
    pub field: String,
    /// Lower bound, e.g. `0`, `"-inf"` or `"(10"` for exclusive.
    pub min: Arg,
    /// Upper bound, e.g. `100`, `"+inf"` or `"50)"` for exclusive.
    pub max: Arg,
}

impl WhereRange {
    /// Builds a range over `field`.
    #[must_use]
    pub fn new(field: impl Into<String>, min: impl Into<Arg>, max: impl Into<Arg>) -> Self {
        Self {
            field: field.into(),
            min: min.into(),
            max: max.into(),
        }
    }
}

/// `WHEREIN field count value...`: keep objects whose field is in a set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereIn {
    /// Field name.
    pub field: String,
    /// Accepted values.
    pub values: Vec<Arg>,
}

impl WhereIn {
    /// Builds a membership filter over `field`.
    #[must_use]
    pub fn new<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Arg>,
    {
        Self {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Script-backed filter: `WHEREEVAL script argc arg...`.
///
/// The same shape serves `WHEREEVALSHA`, with `script` holding the SHA-1
/// digest of a previously loaded script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptFilter {
    /// Script source or SHA-1 digest.
    pub script: String,
    /// Positional script arguments.
    #[serde(default)]
    pub args: Vec<Arg>,
}

impl ScriptFilter {
    /// Builds a script filter with its arguments.
    #[must_use]
    pub fn new<I, V>(script: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Arg>,
    {
        Self {
            script: script.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn encode_into(&self, keyword: &str, args: &mut Args) {
        args.push(keyword)
            .push(&self.script)
            .push(Arg::count(self.args.len()));
        for arg in &self.args {
            args.push(arg.clone());
        }
    }
}

/// Value filters applied to object fields.
///
/// `wheres` and `where_in` keep insertion order and are not deduplicated:
/// two ranges over the same field produce two `WHERE` clauses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValueFilters {
    /// `WHERE` clauses in insertion order.
    #[serde(rename = "where", skip_serializing_if = "Vec::is_empty")]
    pub wheres: Vec<WhereRange>,
    /// `WHEREIN` clauses in insertion order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub where_in: Vec<WhereIn>,
    /// `WHEREEVAL` clause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub where_eval: Option<ScriptFilter>,
    /// `WHEREEVALSHA` clause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub where_eval_sha: Option<ScriptFilter>,
}

impl ValueFilters {
    pub(crate) fn encode_into(&self, args: &mut Args) {
        for range in &self.wheres {
            args.push("WHERE")
                .push(&range.field)
                .push(range.min.clone())
                .push(range.max.clone());
        }
        for set in &self.where_in {
            args.push("WHEREIN")
                .push(&set.field)
                .push(Arg::count(set.values.len()));
            for value in &set.values {
                args.push(value.clone());
            }
        }
        if let Some(filter) = &self.where_eval {
            filter.encode_into("WHEREEVAL", args);
        }
        if let Some(filter) = &self.where_eval_sha {
            filter.encode_into("WHEREEVALSHA", args);
        }
    }
}

/// Geofence transition kinds reported to hooks and channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detect {
    /// Object is inside the area.
    Inside,
    /// Object is outside the area.
    Outside,
    /// Object moved from outside to inside.
    Enter,
    /// Object moved from inside to outside.
    Exit,
    /// Object's path crossed the area without stopping in it.
    Cross,
}

impl Detect {
    /// Wire token.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Inside => "inside",
            Self::Outside => "outside",
            Self::Enter => "enter",
            Self::Exit => "exit",
            Self::Cross => "cross",
        }
    }
}

/// Mutating commands that can trigger geofence delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FenceCommand {
    /// `SET` and `FSET`.
    Set,
    /// `DEL`.
    Del,
    /// `DROP`.
    Drop,
}

impl FenceCommand {
    /// Wire token.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Del => "del",
            Self::Drop => "drop",
        }
    }
}

/// Options that only make sense once `FENCE` is on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FenceOptions {
    /// Suppress repeated `inside`/`outside` notifications.
    pub no_dwell: bool,
    /// Mutating commands that trigger delivery; empty means all.
    pub commands: Vec<FenceCommand>,
    /// Transitions to deliver; empty means all.
    pub detect: Vec<Detect>,
}

impl FenceOptions {
    /// Delivers only the listed transitions.
    #[must_use]
    pub fn detect(mut self, detect: impl IntoIterator<Item = Detect>) -> Self {
        self.detect = detect.into_iter().collect();
        self
    }

    /// Delivers only on the listed mutating commands.
    #[must_use]
    pub fn commands(mut self, commands: impl IntoIterator<Item = FenceCommand>) -> Self {
        self.commands = commands.into_iter().collect();
        self
    }

    /// Suppresses dwell notifications.
    #[must_use]
    pub const fn no_dwell(mut self) -> Self {
        self.no_dwell = true;
        self
    }

    pub(crate) fn encode_into(&self, args: &mut Args) {
        args.push("FENCE").flag(self.no_dwell, "NODWELL");
        if !self.commands.is_empty() {
            let joined: Vec<&str> = self.commands.iter().map(|command| command.token()).collect();
            args.push("COMMANDS").push(joined.join(","));
        }
        if !self.detect.is_empty() {
            let joined: Vec<&str> = self.detect.iter().map(|detect| detect.token()).collect();
            args.push("DETECT").push(joined.join(","));
        }
    }
}

/// Output format keyword of a loose option record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Only the total count.
    Count,
    /// Object ids.
    Ids,
    /// Full GeoJSON objects.
    Objects,
    /// Points.
    Points,
    /// Bounding boxes.
    Bounds,
    /// Geohashes; needs a precision.
    Hashes,
}

/// Output format of a search-family reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Only the total count.
    Count,
    /// Object ids.
    Ids,
    /// Full GeoJSON objects.
    Objects,
    /// Points.
    Points,
    /// Bounding boxes.
    Bounds,
    /// Geohashes at the given precision.
    Hashes(u8),
}

impl Output {
    /// Wire token.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Ids => "ids",
            Self::Objects => "objects",
            Self::Points => "points",
            Self::Bounds => "bounds",
            Self::Hashes(_) => "hashes",
        }
    }

    pub(crate) fn encode_into(self, args: &mut Args) {
        args.push(self.token());
        if let Self::Hashes(precision) = self {
            args.push(precision);
        }
    }
}
