//! Unit tests for search-family encoding.

use insta::assert_snapshot;
use rstest::rstest;
use serde_json::json;

use super::*;
use crate::args::Arg;
use crate::command::Command;
use crate::errors::EncodeError;

fn wire(query: &impl ToArgs) -> Vec<String> {
    match query.to_args() {
        Ok(args) => args.to_wire(),
        Err(error) => panic!("query should encode: {error}"),
    }
}

fn loose(kind: QueryKind, value: serde_json::Value) -> Result<Query, EncodeError> {
    let option: FilterOption = match serde_json::from_value(value) {
        Ok(option) => option,
        Err(error) => panic!("option record should deserialise: {error}"),
    };
    Query::from_option(kind, option)
}

fn loose_wire(kind: QueryKind, value: serde_json::Value) -> Vec<String> {
    match loose(kind, value) {
        Ok(query) => wire(&query),
        Err(error) => panic!("option record should validate: {error}"),
    }
}

#[rstest]
fn intersects_circle_with_limit_and_ids() {
    let query = IntersectsQuery::new("fleet", Circle::new(11.575_105, 104.922_686, 500.0))
        .output(Output::Ids)
        .limit(2);

    assert_eq!(
        wire(&query),
        ["fleet", "LIMIT", "2", "ids", "CIRCLE", "11.575105", "104.922686", "500"]
    );
}

#[rstest]
fn loose_record_encodes_like_typed_query() {
    let args = loose_wire(
        QueryKind::Intersects,
        json!({
            "key": "fleet",
            "circle": {"lat": 11.575_105, "lon": 104.922_686, "meters": 500},
            "output": "ids",
            "limit": 2,
        }),
    );

    assert_eq!(
        args,
        ["fleet", "LIMIT", "2", "ids", "CIRCLE", "11.575105", "104.922686", "500"]
    );
}

#[rstest]
#[case::get(
    WithinQuery::new("fleet", GetTarget::new("zones", "depot")),
    &["fleet", "GET", "zones", "depot"][..]
)]
#[case::bounds(
    WithinQuery::new("fleet", BoundingBox::new(33.1, -112.5, 33.9, -111.8)),
    &["fleet", "BOUNDS", "33.1", "-112.5", "33.9", "-111.8"][..]
)]
#[case::tile(
    WithinQuery::new("fleet", Tile { x: 10, y: 20, zoom: 5 }),
    &["fleet", "TILE", "10", "20", "5"][..]
)]
#[case::quadkey(
    WithinQuery::new("fleet", RegionArea::Quadkey("0231".into())),
    &["fleet", "QUADKEY", "0231"][..]
)]
#[case::hash(
    WithinQuery::new("fleet", RegionArea::Hash("9tbnt".into())),
    &["fleet", "HASH", "9tbnt"][..]
)]
fn single_region_predicate_has_no_extra_tokens(
    #[case] query: WithinQuery,
    #[case] expected: &[&str],
) {
    assert_eq!(wire(&query), expected);
}

#[rstest]
#[case::bare_point(
    NearbyQuery::new("fleet", Point::new(33.5, -112.2)),
    &["fleet", "POINT", "33.5", "-112.2"][..]
)]
#[case::point_with_radius(
    NearbyQuery::new("fleet", Point::new(33.5, -112.2).within(250.0)),
    &["fleet", "POINT", "33.5", "-112.2", "250"][..]
)]
#[case::roam(
    NearbyQuery::new("fleet", Roam::new("truck", "*", 1000.0)),
    &["fleet", "ROAM", "truck", "*", "1000"][..]
)]
fn single_nearby_predicate_has_no_extra_tokens(
    #[case] query: NearbyQuery,
    #[case] expected: &[&str],
) {
    assert_eq!(wire(&query), expected);
}

#[rstest]
fn object_predicate_carries_serialised_geojson() {
    let geometry = json!({"type": "Point", "coordinates": [1.5, 2.5]});
    let query = IntersectsQuery::new("fleet", RegionArea::Object(geometry.clone()));

    assert_eq!(wire(&query), ["fleet".to_owned(), "OBJECT".to_owned(), geometry.to_string()]);
}

#[rstest]
fn every_clause_lands_in_grammar_order() {
    let mut query = NearbyQuery::new("fleet", Point::new(33.5, -112.2).within(500.0))
        .output(Output::Hashes(6))
        .fence(
            FenceOptions::default()
                .detect([Detect::Enter, Detect::Exit])
                .commands([FenceCommand::Set, FenceCommand::Del])
                .no_dwell(),
        )
        .where_range(WhereRange::new("speed", 0, f64::INFINITY))
        .with_distance()
        .sparse(2)
        .limit(5)
        .cursor(10);
    query.no_fields = true;
    query.page.pattern = Some("truck*".into());
    query
        .filters
        .where_in
        .push(WhereIn::new("status", ["active", "idle"]));
    query.filters.where_eval = Some(ScriptFilter::new("return FIELDS.speed > ARGV[1]", [10]));
    query.filters.where_eval_sha = Some(ScriptFilter::new("abc123", Vec::<i64>::new()));

    assert_snapshot!(
        wire(&query).join(" "),
        @"fleet CURSOR 10 LIMIT 5 SPARSE 2 MATCH truck* DISTANCE WHERE speed 0 +inf WHEREIN status 2 active idle WHEREEVAL return FIELDS.speed > ARGV[1] 1 10 WHEREEVALSHA abc123 0 NOFIELDS FENCE NODWELL COMMANDS set,del DETECT enter,exit hashes 6 POINT 33.5 -112.2 500"
    );
}

#[rstest]
fn clip_precedes_fence_for_intersects() {
    let query = IntersectsQuery::new("fleet", BoundingBox::new(1.0, 2.0, 3.0, 4.0))
        .fence(FenceOptions::default())
        .clipped();

    assert_eq!(
        wire(&query),
        ["fleet", "CLIP", "FENCE", "BOUNDS", "1", "2", "3", "4"]
    );
}

#[rstest]
fn scan_sort_follows_pagination() {
    let query = ScanQuery::new("fleet").sort(Sort::Desc).limit(3).output(Output::Count);

    assert_eq!(wire(&query), ["fleet", "LIMIT", "3", "desc", "count"]);
}

#[rstest]
fn search_match_and_sort() {
    let query = SearchQuery::new("names").matching("J*").sort(Sort::Asc);

    assert_eq!(wire(&query), ["names", "MATCH", "J*", "asc"]);
}

#[rstest]
fn encoding_ignores_json_field_order() {
    let forward = loose_wire(
        QueryKind::Nearby,
        json!({
            "key": "fleet",
            "limit": 5,
            "distance": true,
            "point": {"lat": 1.0, "lon": 2.0},
            "output": "points",
        }),
    );
    let reversed = loose_wire(
        QueryKind::Nearby,
        json!({
            "output": "points",
            "point": {"lat": 1.0, "lon": 2.0},
            "distance": true,
            "limit": 5,
            "key": "fleet",
        }),
    );

    assert_eq!(forward, reversed);
    assert_eq!(
        forward,
        ["fleet", "LIMIT", "5", "DISTANCE", "points", "POINT", "1", "2"]
    );
}

#[rstest]
fn repeated_where_fields_are_not_deduplicated() {
    let query = WithinQuery::new("fleet", Circle::new(1.0, 2.0, 3.0))
        .where_range(WhereRange::new("speed", 0, 50))
        .where_range(WhereRange::new("speed", 10, f64::INFINITY));

    assert_eq!(
        wire(&query),
        [
            "fleet", "WHERE", "speed", "0", "50", "WHERE", "speed", "10", "+inf", "CIRCLE", "1",
            "2", "3",
        ]
    );
}

#[rstest]
fn where_bounds_accept_strings_and_numbers() {
    let args = loose_wire(
        QueryKind::Scan,
        json!({
            "key": "fleet",
            "where": [{"field": "speed", "min": "-inf", "max": 12.5}],
            "whereIn": [{"field": "kind", "values": ["car", 3]}],
        }),
    );

    assert_eq!(
        args,
        [
            "fleet", "WHERE", "speed", "-inf", "12.5", "WHEREIN", "kind", "2", "car", "3",
        ]
    );
}

#[rstest]
fn script_filters_emit_arity_before_arguments() {
    let mut query = ScanQuery::new("fleet");
    query.filters.where_eval = Some(ScriptFilter::new("script", [Arg::from(1), Arg::from(2.5)]));

    assert_eq!(wire(&query), ["fleet", "WHEREEVAL", "script", "2", "1", "2.5"]);
}

#[rstest]
fn zero_and_empty_values_are_omitted() {
    let mut query = WithinQuery::new("fleet", Circle::new(1.0, 2.0, 3.0)).sparse(0);
    query.page = Page {
        cursor: Some(0),
        limit: Some(0),
        pattern: Some(String::new()),
    };

    assert_eq!(wire(&query), ["fleet", "CIRCLE", "1", "2", "3"]);
}

#[rstest]
fn empty_key_is_rejected() {
    assert_eq!(ScanQuery::new("").to_args(), Err(EncodeError::MissingKey));
}

#[rstest]
fn non_finite_coordinates_are_rejected() {
    let query = IntersectsQuery::new("fleet", Circle::new(f64::NAN, 1.0, 5.0));

    assert_eq!(
        query.to_args(),
        Err(EncodeError::NonFiniteCoordinate { name: "lat" })
    );
}

#[rstest]
fn object_predicate_must_be_a_json_object() {
    let query = WithinQuery::new("fleet", RegionArea::Object(json!([1, 2])));

    assert_eq!(query.to_args(), Err(EncodeError::InvalidObject));
}

#[rstest]
#[case(RegionArea::Hash(String::new()), "HASH", "geohash")]
#[case(RegionArea::Quadkey(String::new()), "QUADKEY", "key")]
#[case(RegionArea::Get(GetTarget::new("", "truck1")), "GET", "key")]
#[case(RegionArea::Get(GetTarget::new("fleet", "")), "GET", "id")]
fn empty_region_operands_are_rejected(
    #[case] area: RegionArea,
    #[case] keyword: &'static str,
    #[case] name: &'static str,
) {
    let query = WithinQuery::new("fleet", area);

    assert_eq!(
        query.to_args(),
        Err(EncodeError::EmptyOperand {
            area: keyword,
            name,
        })
    );
}

#[rstest]
#[case(Roam::new("", "*", 100.0), "key")]
#[case(Roam::new("truck", "", 100.0), "pattern")]
fn empty_roam_operands_are_rejected(#[case] roam: Roam, #[case] name: &'static str) {
    let query = NearbyQuery::new("fleet", roam);

    assert_eq!(
        query.to_args(),
        Err(EncodeError::EmptyOperand { area: "ROAM", name })
    );
}

#[rstest]
fn multiple_areas_are_rejected() {
    let result = loose(
        QueryKind::Within,
        json!({
            "key": "fleet",
            "circle": {"lat": 1.0, "lon": 2.0, "meters": 3.0},
            "bounds": {"minlat": 1.0, "minlon": 2.0, "maxlat": 3.0, "maxlon": 4.0},
        }),
    );

    assert_eq!(
        result,
        Err(EncodeError::MultipleAreas {
            found: vec!["BOUNDS", "CIRCLE"],
        })
    );
}

#[rstest]
#[case::clip_on_nearby(
    QueryKind::Nearby,
    json!({"key": "k", "clip": true, "point": {"lat": 1.0, "lon": 2.0}}),
    EncodeError::UnsupportedOption { command: Command::Nearby, option: "CLIP" }
)]
#[case::sort_on_nearby(
    QueryKind::Nearby,
    json!({"key": "k", "sort": "asc", "point": {"lat": 1.0, "lon": 2.0}}),
    EncodeError::UnsupportedOption { command: Command::Nearby, option: "sort" }
)]
#[case::distance_on_within(
    QueryKind::Within,
    json!({"key": "k", "distance": true, "hash": "9tb"}),
    EncodeError::UnsupportedOption { command: Command::Within, option: "DISTANCE" }
)]
#[case::fence_on_search(
    QueryKind::Search,
    json!({"key": "k", "fence": true}),
    EncodeError::UnsupportedOption { command: Command::Search, option: "FENCE" }
)]
#[case::area_on_scan(
    QueryKind::Scan,
    json!({"key": "k", "circle": {"lat": 1.0, "lon": 2.0, "meters": 3.0}}),
    EncodeError::AreaNotAllowed { command: Command::Scan, area: "CIRCLE" }
)]
#[case::bounds_on_nearby(
    QueryKind::Nearby,
    json!({"key": "k", "bounds": {"minlat": 1.0, "minlon": 2.0, "maxlat": 3.0, "maxlon": 4.0}}),
    EncodeError::AreaNotAllowed { command: Command::Nearby, area: "BOUNDS" }
)]
#[case::roam_on_intersects(
    QueryKind::Intersects,
    json!({"key": "k", "roam": {"key": "truck", "pattern": "*", "meters": 5.0}}),
    EncodeError::AreaNotAllowed { command: Command::Intersects, area: "ROAM" }
)]
#[case::missing_area(
    QueryKind::Within,
    json!({"key": "k"}),
    EncodeError::MissingArea { command: Command::Within }
)]
#[case::detect_without_fence(
    QueryKind::Intersects,
    json!({"key": "k", "detect": ["enter"], "quadkey": "023"}),
    EncodeError::FenceOptionWithoutFence { option: "DETECT" }
)]
#[case::hashes_without_precision(
    QueryKind::Within,
    json!({"key": "k", "output": "hashes", "hash": "9tb"}),
    EncodeError::MissingPrecision
)]
#[case::precision_without_hashes(
    QueryKind::Within,
    json!({"key": "k", "output": "ids", "precision": 5, "hash": "9tb"}),
    EncodeError::PrecisionWithoutHashes
)]
fn loose_records_are_checked_per_family(
    #[case] kind: QueryKind,
    #[case] option: serde_json::Value,
    #[case] expected: EncodeError,
) {
    assert_eq!(loose(kind, option), Err(expected));
}

#[rstest]
fn loose_fence_options_follow_fence_flag() {
    let args = loose_wire(
        QueryKind::Within,
        json!({
            "key": "fleet",
            "fence": true,
            "nodwell": true,
            "detect": ["inside", "outside"],
            "commands": ["drop"],
            "tile": {"x": 1, "y": 2, "zoom": 3},
        }),
    );

    assert_eq!(
        args,
        [
            "fleet", "FENCE", "NODWELL", "COMMANDS", "drop", "DETECT", "inside,outside", "TILE",
            "1", "2", "3",
        ]
    );
}

#[rstest]
fn empty_quadkey_counts_as_absent() {
    let args = loose_wire(
        QueryKind::Within,
        json!({"key": "fleet", "quadkey": "", "hash": "9tb"}),
    );

    assert_eq!(args, ["fleet", "HASH", "9tb"]);
}
