//! Behavioural tests for the client facade using `rstest-bdd`.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::json;

use crate::client::OutputMode;
use crate::errors::ClientError;
use crate::filter::{Detect, QueryKind};
use crate::subscription::PushMessage;
use crate::tests::support::{TestWorld, geofence_payload};

#[fixture]
fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}

#[given("a client with JSON output negotiated")]
fn given_client(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    assert!(world.client.json_output());
    let negotiated = world.transport.calls();
    assert_eq!(negotiated.len(), 1);
    assert_eq!(negotiated[0].name, "OUTPUT");
    assert_eq!(negotiated[0].args, vec!["json"]);
}

#[given("the engine will report {message}")]
fn given_engine_failure(world: &RefCell<TestWorld>, message: String) {
    let message = message.trim_matches('"');
    let reply = json!({ "ok": false, "err": message, "elapsed": "2µs" });
    world.borrow().transport.reply(reply.to_string());
}

#[when("the client runs an intersects query for ids inside a 500 meter circle")]
fn when_intersects_circle(world: &RefCell<TestWorld>) {
    world.borrow_mut().run_query(
        QueryKind::Intersects,
        json!({
            "key": "fleet",
            "circle": { "lat": 11.575105, "lon": 104.922686, "meters": 500 },
            "output": "ids",
            "limit": 2,
        }),
    );
}

#[when("the client runs a nearby query with two area predicates")]
fn when_nearby_two_areas(world: &RefCell<TestWorld>) {
    world.borrow_mut().run_query(
        QueryKind::Nearby,
        json!({
            "key": "fleet",
            "point": { "lat": 33.5, "lon": -112.2, "meters": 100 },
            "hash": "9tbnthxzr",
        }),
    );
}

#[when("the client registers hook {name} on {endpoint} detecting {detect}")]
fn when_registers_hook(
    world: &RefCell<TestWorld>,
    name: String,
    endpoint: String,
    detect: String,
) {
    let detect: Vec<&str> = detect.trim_matches('"').split(',').collect();
    world.borrow_mut().run_sethook(json!({
        "name": name.trim_matches('"'),
        "endpoint": endpoint.trim_matches('"'),
        "type": "nearby",
        "key": "fleet",
        "point": { "lat": 33.5123, "lon": -112.2693, "meters": 500 },
        "detect": detect,
    }));
}

#[when("the client deletes {id} from {key}")]
fn when_deletes(world: &RefCell<TestWorld>, id: String, key: String) {
    world
        .borrow_mut()
        .run_del(key.trim_matches('"'), id.trim_matches('"'));
}

#[when("the client requests JSON output")]
fn when_requests_json(world: &RefCell<TestWorld>) {
    world.borrow_mut().run_output(OutputMode::Json);
}

#[when("the client requests RESP output")]
fn when_requests_resp(world: &RefCell<TestWorld>) {
    world.borrow_mut().run_output(OutputMode::Resp);
    assert!(!world.borrow().client.json_output());
}

#[when("the client subscribes to {channel}")]
fn when_subscribes(world: &RefCell<TestWorld>, channel: String) {
    world.borrow_mut().subscribe(&[channel.trim_matches('"')]);
}

#[when("the engine publishes an {detect} event for {id} on {channel}")]
fn when_engine_publishes(world: &RefCell<TestWorld>, detect: String, id: String, channel: String) {
    let channel = channel.trim_matches('"');
    let payload = geofence_payload(channel, detect.trim_matches('"'), id.trim_matches('"'));
    world
        .borrow()
        .transport
        .publish(&PushMessage::new(channel.to_owned(), None, payload));
}

#[when("the subscription is dropped")]
fn when_subscription_dropped(world: &RefCell<TestWorld>) {
    let subscription = world.borrow_mut().subscription.take();
    assert!(subscription.is_some(), "a subscription should be open");
    drop(subscription);
}

#[then("the engine receives {line}")]
fn then_engine_receives(world: &RefCell<TestWorld>, line: String) {
    let world = world.borrow();
    let call = world
        .new_calls()
        .pop()
        .expect("a command should have been sent");
    let mut tokens = vec![call.name];
    tokens.extend(call.args);
    assert_eq!(tokens.join(" "), line.trim_matches('"'));
}

#[then("the command succeeds")]
fn then_command_succeeds(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    assert!(world.last_error.is_none(), "unexpected error: {:?}", world.last_error);
    assert!(world.last_ack.is_some());
}

#[then("the command fails with message {message}")]
fn then_fails_with_message(world: &RefCell<TestWorld>, message: String) {
    let world = world.borrow();
    let error = world
        .last_error
        .as_ref()
        .and_then(ClientError::as_command_error)
        .expect("the command should have been rejected");
    assert_eq!(error.message(), message.trim_matches('"'));
}

#[then("the command fails with an encoding error")]
fn then_fails_with_encoding_error(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    assert!(
        matches!(world.last_error, Some(ClientError::Encode(_))),
        "expected an encoding error, got {:?}",
        world.last_error
    );
}

#[then("nothing is sent to the engine")]
fn then_nothing_sent(world: &RefCell<TestWorld>) {
    assert!(world.borrow().new_calls().is_empty());
}

#[then("the subscriber receives an {detect} event for {id}")]
fn then_subscriber_receives(world: &RefCell<TestWorld>, detect: String, id: String) {
    let message = world
        .borrow()
        .next_message()
        .expect("a message should have been delivered");
    let event = message.event().expect("payload should be a geofence event");
    let detect = detect.trim_matches('"');
    assert_eq!(event.transition().map(Detect::token), Some(detect));
    assert_eq!(event.id, id.trim_matches('"'));
}

#[then("the duplicated connection subscribed to {channel}")]
fn then_duplicate_subscribed(world: &RefCell<TestWorld>, channel: String) {
    let world = world.borrow();
    let subscriptions = world.transport.subscriptions();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].name, "SUBSCRIBE");
    assert_eq!(subscriptions[0].args, vec![channel.trim_matches('"')]);
    assert!(world.new_calls().is_empty());
}

#[then("the subscriber receives nothing more")]
fn then_nothing_more(world: &RefCell<TestWorld>) {
    assert!(!world.borrow().received_more());
}

#[scenario(
    path = "tests/features/client.feature",
    name = "Intersects query encodes clauses in grammar order"
)]
fn intersects_grammar_order(#[from(world)] _: RefCell<TestWorld>) {}

#[scenario(
    path = "tests/features/client.feature",
    name = "Hook registration always carries FENCE"
)]
fn hook_registration_forces_fence(#[from(world)] _: RefCell<TestWorld>) {}

#[scenario(
    path = "tests/features/client.feature",
    name = "Engine failure surfaces the reported error text"
)]
fn engine_failure_surfaces_error_text(#[from(world)] _: RefCell<TestWorld>) {}

#[scenario(
    path = "tests/features/client.feature",
    name = "Invalid options are rejected before any I/O"
)]
fn invalid_options_skip_io(#[from(world)] _: RefCell<TestWorld>) {}

#[scenario(
    path = "tests/features/client.feature",
    name = "Requesting JSON output again sends nothing"
)]
fn repeated_json_output_is_a_no_op(#[from(world)] _: RefCell<TestWorld>) {}

#[scenario(
    path = "tests/features/client.feature",
    name = "Returning to JSON after RESP renegotiates"
)]
fn json_after_resp_renegotiates(#[from(world)] _: RefCell<TestWorld>) {}

#[scenario(
    path = "tests/features/client.feature",
    name = "Channel messages stop after the subscription is dropped"
)]
fn dropped_subscription_stops_delivery(#[from(world)] _: RefCell<TestWorld>) {}
