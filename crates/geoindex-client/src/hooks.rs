//! Hook and channel registrations, and the geofence events they deliver.
//!
//! A registration is a geometric query that stays active in the engine.
//! `FENCE` is always emitted for it, whether or not the query set one.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::args::Args;
use crate::command::Command;
use crate::errors::EncodeError;
use crate::filter::{
    Detect, FilterOption, IntersectsQuery, NearbyQuery, Query, QueryKind, ToArgs, WithinQuery,
};

/// The geometric query behind a hook or channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Geofence {
    /// Fence around a point or roaming objects.
    Nearby(NearbyQuery),
    /// Fence on objects inside an area.
    Within(WithinQuery),
    /// Fence on objects overlapping an area.
    Intersects(IntersectsQuery),
}

impl Geofence {
    /// Type token written before the query.
    #[must_use]
    pub const fn token(&self) -> &'static str {
        match self {
            Self::Nearby(_) => "nearby",
            Self::Within(_) => "within",
            Self::Intersects(_) => "intersects",
        }
    }

    fn encode_into(&self, args: &mut Args) -> Result<(), EncodeError> {
        let clauses = match self {
            Self::Nearby(query) => query.clauses(),
            Self::Within(query) => query.clauses(),
            Self::Intersects(query) => query.clauses(),
        };
        args.push(self.token())
            .append(clauses.force_fence().encode()?);
        Ok(())
    }
}

impl From<NearbyQuery> for Geofence {
    fn from(query: NearbyQuery) -> Self {
        Self::Nearby(query)
    }
}

impl From<WithinQuery> for Geofence {
    fn from(query: WithinQuery) -> Self {
        Self::Within(query)
    }
}

impl From<IntersectsQuery> for Geofence {
    fn from(query: IntersectsQuery) -> Self {
        Self::Intersects(query)
    }
}

/// Geofence type of a loose registration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeofenceKind {
    /// `nearby`.
    Nearby,
    /// `within`.
    Within,
    /// `intersects`.
    Intersects,
}

impl From<GeofenceKind> for QueryKind {
    fn from(kind: GeofenceKind) -> Self {
        match kind {
            GeofenceKind::Nearby => Self::Nearby,
            GeofenceKind::Within => Self::Within,
            GeofenceKind::Intersects => Self::Intersects,
        }
    }
}

impl Geofence {
    /// Validates a loose option record as a fence of `kind`.
    ///
    /// `fence` is switched on before validation so `DETECT`, `COMMANDS` and
    /// `NODWELL` are accepted.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Query::from_option`].
    pub fn from_option(kind: GeofenceKind, mut option: FilterOption) -> Result<Self, EncodeError> {
        option.fence = true;
        match Query::from_option(kind.into(), option)? {
            Query::Nearby(query) => Ok(Self::Nearby(query)),
            Query::Within(query) => Ok(Self::Within(query)),
            Query::Intersects(query) => Ok(Self::Intersects(query)),
            Query::Scan(_) | Query::Search(_) => Err(EncodeError::UnsupportedOption {
                command: QueryKind::from(kind).command(),
                option: "FENCE",
            }),
        }
    }
}

fn require_name(name: &str) -> Result<(), EncodeError> {
    if name.is_empty() {
        Err(EncodeError::MissingName)
    } else {
        Ok(())
    }
}

fn encode_meta_and_expiry(
    meta: &[(String, String)],
    expire: Option<Duration>,
    args: &mut Args,
) {
    for (name, value) in meta {
        args.push("META").push(name).push(value);
    }
    args.keyword_value("EX", expire.filter(|ttl| !ttl.is_zero()));
}

/// `SETHOOK name endpoint [META name value]* [EX seconds] type query`.
#[derive(Debug, Clone, PartialEq)]
pub struct HookRegistration {
    /// Hook name.
    pub name: String,
    /// Delivery endpoints, tried in order.
    pub endpoints: Vec<String>,
    /// Metadata echoed in every event.
    pub meta: Vec<(String, String)>,
    /// Lifetime of the hook.
    pub expire: Option<Duration>,
    /// Geofence query.
    pub fence: Geofence,
}

impl HookRegistration {
    /// Registers `fence` under `name`, delivering to `endpoint`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        fence: impl Into<Geofence>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoints: vec![endpoint.into()],
            meta: Vec::new(),
            expire: None,
            fence: fence.into(),
        }
    }

    /// Adds a fallback endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// Attaches a metadata entry.
    #[must_use]
    pub fn meta(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.push((name.into(), value.into()));
        self
    }

    /// Expires the hook after `ttl`.
    #[must_use]
    pub const fn expire_in(mut self, ttl: Duration) -> Self {
        self.expire = Some(ttl);
        self
    }
}

impl ToArgs for HookRegistration {
    fn command(&self) -> Command {
        Command::SetHook
    }

    fn to_args(&self) -> Result<Args, EncodeError> {
        require_name(&self.name)?;
        let endpoints: Vec<&str> = self
            .endpoints
            .iter()
            .map(String::as_str)
            .filter(|endpoint| !endpoint.is_empty())
            .collect();
        if endpoints.is_empty() {
            return Err(EncodeError::MissingEndpoint);
        }

        let mut args = Args::new();
        args.push(&self.name).push(endpoints.join(","));
        encode_meta_and_expiry(&self.meta, self.expire, &mut args);
        self.fence.encode_into(&mut args)?;
        Ok(args)
    }
}

/// `SETCHAN name [META name value]* [EX seconds] type query`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRegistration {
    /// Channel name; also the pub/sub channel events are published on.
    pub name: String,
    /// Metadata echoed in every event.
    pub meta: Vec<(String, String)>,
    /// Lifetime of the channel.
    pub expire: Option<Duration>,
    /// Geofence query.
    pub fence: Geofence,
}

impl ChannelRegistration {
    /// Registers `fence` as channel `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, fence: impl Into<Geofence>) -> Self {
        Self {
            name: name.into(),
            meta: Vec::new(),
            expire: None,
            fence: fence.into(),
        }
    }

    /// Attaches a metadata entry.
    #[must_use]
    pub fn meta(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.push((name.into(), value.into()));
        self
    }

    /// Expires the channel after `ttl`.
    #[must_use]
    pub const fn expire_in(mut self, ttl: Duration) -> Self {
        self.expire = Some(ttl);
        self
    }
}

impl ToArgs for ChannelRegistration {
    fn command(&self) -> Command {
        Command::SetChan
    }

    fn to_args(&self) -> Result<Args, EncodeError> {
        require_name(&self.name)?;
        let mut args = Args::new();
        args.push(&self.name);
        encode_meta_and_expiry(&self.meta, self.expire, &mut args);
        self.fence.encode_into(&mut args)?;
        Ok(args)
    }
}

/// Loose hook or channel record: registration fields plus a filter record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationOption {
    /// Hook or channel name.
    pub name: String,
    /// Hook endpoint; ignored for channels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Metadata entries.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
    /// Lifetime in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ex: Option<u64>,
    /// Geofence type.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<GeofenceKind>,
    /// The geofence query.
    #[serde(flatten)]
    pub filter: FilterOption,
}

/// Registration fields shared by hooks and channels.
struct RegistrationParts {
    name: String,
    endpoint: Option<String>,
    meta: Vec<(String, String)>,
    expire: Option<Duration>,
    fence: Geofence,
}

impl RegistrationOption {
    fn into_parts(self) -> Result<RegistrationParts, EncodeError> {
        let kind = self.kind.unwrap_or(GeofenceKind::Nearby);
        let fence = Geofence::from_option(kind, self.filter)?;
        Ok(RegistrationParts {
            name: self.name,
            endpoint: self.endpoint,
            meta: self.meta.into_iter().collect(),
            expire: self.ex.filter(|seconds| *seconds > 0).map(Duration::from_secs),
            fence,
        })
    }

    /// Validates the record as a hook registration.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::MissingEndpoint`] without an endpoint, and the
    /// errors of [`Geofence::from_option`].
    pub fn into_hook(self) -> Result<HookRegistration, EncodeError> {
        let parts = self.into_parts()?;
        let endpoint = parts
            .endpoint
            .filter(|endpoint| !endpoint.is_empty())
            .ok_or(EncodeError::MissingEndpoint)?;
        Ok(HookRegistration {
            name: parts.name,
            endpoints: vec![endpoint],
            meta: parts.meta,
            expire: parts.expire,
            fence: parts.fence,
        })
    }

    /// Validates the record as a channel registration.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Geofence::from_option`].
    pub fn into_channel(self) -> Result<ChannelRegistration, EncodeError> {
        let parts = self.into_parts()?;
        Ok(ChannelRegistration {
            name: parts.name,
            meta: parts.meta,
            expire: parts.expire,
            fence: parts.fence,
        })
    }
}

fn rfc3339<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    OffsetDateTime::parse(&text, &Rfc3339).map_err(serde::de::Error::custom)
}

/// A geofence notification delivered to a hook or channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeofenceEvent {
    /// Mutating command that triggered the event, e.g. `set`.
    pub command: String,
    /// Identifier shared by events describing the same transition.
    #[serde(default)]
    pub group: Option<String>,
    /// Transition kind; `roam` for roaming fences.
    pub detect: String,
    /// Hook or channel name.
    #[serde(default)]
    pub hook: Option<String>,
    /// Collection of the object.
    pub key: String,
    /// Object id.
    pub id: String,
    /// When the engine observed the transition.
    #[serde(deserialize_with = "rfc3339")]
    pub time: OffsetDateTime,
    /// Object geometry after the mutation.
    #[serde(default)]
    pub object: Option<Value>,
    /// Object field values.
    #[serde(default)]
    pub fields: Option<Value>,
    /// Registration metadata.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    /// Nearby object for `roam` events.
    #[serde(default)]
    pub nearby: Option<Value>,
    /// Object that left proximity for `roam` events.
    #[serde(default)]
    pub faraway: Option<Value>,
}

impl GeofenceEvent {
    /// Transition as a [`Detect`] value; `None` for `roam` and unknown kinds.
    #[must_use]
    pub fn transition(&self) -> Option<Detect> {
        match self.detect.as_str() {
            "inside" => Some(Detect::Inside),
            "outside" => Some(Detect::Outside),
            "enter" => Some(Detect::Enter),
            "exit" => Some(Detect::Exit),
            "cross" => Some(Detect::Cross),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::filter::{BoundingBox, FenceOptions, Point};

    fn wire(registration: &impl ToArgs) -> Vec<String> {
        match registration.to_args() {
            Ok(args) => args.to_wire(),
            Err(error) => panic!("registration should encode: {error}"),
        }
    }

    #[rstest]
    fn loose_hook_forces_fence() {
        let option: RegistrationOption = match serde_json::from_value(json!({
            "name": "warehouse",
            "endpoint": "http://x/hook",
            "type": "nearby",
            "key": "fleet",
            "point": {"lat": 33.5123, "lon": -112.2693, "meters": 500},
            "detect": ["cross", "enter"],
        })) {
            Ok(option) => option,
            Err(error) => panic!("record should deserialise: {error}"),
        };
        let hook = match option.into_hook() {
            Ok(hook) => hook,
            Err(error) => panic!("record should validate: {error}"),
        };

        assert_eq!(
            wire(&hook),
            [
                "warehouse", "http://x/hook", "nearby", "fleet", "FENCE", "DETECT", "cross,enter",
                "POINT", "33.5123", "-112.2693", "500",
            ]
        );
    }

    #[rstest]
    fn typed_hook_with_meta_and_expiry() {
        let fence = WithinQuery::new("fleet", BoundingBox::new(1.0, 2.0, 3.0, 4.0))
            .fence(FenceOptions::default().detect([Detect::Exit]));
        let hook = HookRegistration::new("depot", "http://a/hook", fence)
            .endpoint("http://b/hook")
            .meta("owner", "ops")
            .expire_in(Duration::from_secs(60));

        assert_eq!(
            wire(&hook),
            [
                "depot", "http://a/hook,http://b/hook", "META", "owner", "ops", "EX", "60",
                "within", "fleet", "FENCE", "DETECT", "exit", "BOUNDS", "1", "2", "3", "4",
            ]
        );
    }

    #[rstest]
    fn channel_has_no_endpoint() {
        let channel = ChannelRegistration::new(
            "nearby-trucks",
            NearbyQuery::new("fleet", Point::new(1.0, 2.0).within(50.0)),
        );

        assert_eq!(
            wire(&channel),
            ["nearby-trucks", "nearby", "fleet", "FENCE", "POINT", "1", "2", "50"]
        );
    }

    #[rstest]
    fn zero_expiry_is_omitted_from_loose_records() {
        let option = RegistrationOption {
            name: "warehouse".into(),
            endpoint: Some("http://x/hook".into()),
            ex: Some(0),
            filter: FilterOption {
                key: "fleet".into(),
                area: crate::filter::AreaOptions {
                    point: Some(Point::new(1.0, 2.0)),
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        let hook = match option.into_hook() {
            Ok(hook) => hook,
            Err(error) => panic!("record should validate: {error}"),
        };

        assert_eq!(hook.expire, None);
        assert_eq!(
            wire(&hook),
            ["warehouse", "http://x/hook", "nearby", "fleet", "FENCE", "POINT", "1", "2"]
        );
    }

    #[rstest]
    fn zero_expiry_is_omitted_from_typed_registrations() {
        let channel = ChannelRegistration::new(
            "nearby-trucks",
            NearbyQuery::new("fleet", Point::new(1.0, 2.0).within(50.0)),
        )
        .expire_in(Duration::ZERO);

        assert_eq!(
            wire(&channel),
            ["nearby-trucks", "nearby", "fleet", "FENCE", "POINT", "1", "2", "50"]
        );
    }

    #[rstest]
    fn hook_without_endpoint_is_rejected() {
        let option = RegistrationOption {
            name: "warehouse".into(),
            kind: Some(GeofenceKind::Nearby),
            filter: FilterOption {
                key: "fleet".into(),
                area: crate::filter::AreaOptions {
                    point: Some(Point::new(1.0, 2.0)),
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };

        assert_eq!(option.into_hook(), Err(EncodeError::MissingEndpoint));
    }

    #[rstest]
    fn empty_name_is_rejected() {
        let channel = ChannelRegistration::new("", NearbyQuery::new("fleet", Point::new(1.0, 2.0)));

        assert_eq!(channel.to_args(), Err(EncodeError::MissingName));
    }

    #[rstest]
    fn event_time_parses_as_rfc3339() {
        let event: GeofenceEvent = match serde_json::from_value(json!({
            "command": "set",
            "group": "5c5203ccf5ec4e4f349fd038",
            "detect": "enter",
            "hook": "warehouse",
            "key": "fleet",
            "time": "2019-01-30T13:06:36.769273-07:00",
            "id": "bus",
            "meta": {"owner": "ops"},
            "object": {"type": "Point", "coordinates": [-112.2693, 33.5123]},
        })) {
            Ok(event) => event,
            Err(error) => panic!("event should deserialise: {error}"),
        };

        assert_eq!(event.transition(), Some(Detect::Enter));
        assert_eq!(event.time.year(), 2019);
        assert_eq!(event.time.offset().whole_hours(), -7);
        assert_eq!(event.meta.get("owner").map(String::as_str), Some("ops"));
    }
}
