//! Scalar-to-wire token conversion.
//!
//! Every argument the client sends passes through [`Arg`], so a coordinate
//! renders the same way whether it came from a `SET`, a `NEARBY` or a
//! `TEST`. Floats use Rust's shortest round-trip `Display` form (`500.0`
//! renders as `500`, `11.575105` stays `11.575105`), infinities use the
//! engine's `+inf`/`-inf` spelling, and booleans have no token form at all:
//! a flag is either pushed or omitted.

use std::borrow::Cow;
use std::fmt;
use std::slice;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single positional argument of an engine command.
///
/// Deserialises from a JSON string or number so option records can carry
/// `WHERE` bounds such as `0`, `12.5` or `"-inf"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    /// Verbatim text: keys, ids, keywords, JSON documents.
    Text(String),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(f64),
}

impl Arg {
    /// Builds an unsigned count token, e.g. the arity in `WHEREIN`.
    #[must_use]
    pub fn count(value: usize) -> Self {
        Self::UInt(u64::try_from(value).unwrap_or(u64::MAX))
    }

    /// Renders the argument as the token written to the wire.
    #[must_use]
    pub fn to_wire(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text.as_str()),
            Self::Int(value) => Cow::Owned(value.to_string()),
            Self::UInt(value) => Cow::Owned(value.to_string()),
            Self::Float(value) => Cow::Owned(format_float(*value)),
        }
    }
}

fn format_float(value: f64) -> String {
    if value.is_infinite() {
        if value.is_sign_positive() {
            String::from("+inf")
        } else {
            String::from("-inf")
        }
    } else {
        value.to_string()
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.to_wire())
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for Arg {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<u8> for Arg {
    fn from(value: u8) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for Arg {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

/// Whole seconds render as integers; sub-second precision renders as a float.
impl From<Duration> for Arg {
    fn from(value: Duration) -> Self {
        if value.subsec_nanos() == 0 {
            Self::UInt(value.as_secs())
        } else {
            Self::Float(value.as_secs_f64())
        }
    }
}

/// Ordered argument vector for one engine command.
///
/// The engine parses positionally, so the order in which callers push is
/// the order on the wire. Helpers exist for the two recurring shapes:
/// presence flags ([`Args::flag`]) and keyword/value pairs that vanish when
/// the value is absent ([`Args::keyword_value`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Vec<Arg>);

impl Args {
    /// Creates an empty argument vector.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends one argument.
    pub fn push(&mut self, arg: impl Into<Arg>) -> &mut Self {
        self.0.push(arg.into());
        self
    }

    /// Appends `token` only when `enabled` is set.
    pub fn flag(&mut self, enabled: bool, token: &str) -> &mut Self {
        if enabled {
            self.push(token);
        }
        self
    }

    /// Appends `token value` when `value` is present.
    pub fn keyword_value<V>(&mut self, token: &str, value: Option<V>) -> &mut Self
    where
        V: Into<Arg>,
    {
        if let Some(value) = value {
            self.push(token);
            self.push(value);
        }
        self
    }

    /// Appends every argument from `other`.
    pub fn append(&mut self, other: Self) -> &mut Self {
        self.0.extend(other.0);
        self
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no argument has been pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the arguments as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Arg] {
        &self.0
    }

    /// Iterates over the arguments in wire order.
    pub fn iter(&self) -> slice::Iter<'_, Arg> {
        self.0.iter()
    }

    /// Renders every argument as its wire token.
    #[must_use]
    pub fn to_wire(&self) -> Vec<String> {
        self.0.iter().map(|arg| arg.to_wire().into_owned()).collect()
    }
}

impl<A> FromIterator<A> for Args
where
    A: Into<Arg>,
{
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for Args {
    type Item = Arg;
    type IntoIter = std::vec::IntoIter<Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Args {
    type Item = &'a Arg;
    type IntoIter = slice::Iter<'a, Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
