//! Shared fixtures and helpers for client tests.

mod recording_transport;
mod world;

use rstest::fixture;

use crate::client::Client;

pub use recording_transport::{RecordedCall, RecordingTransport, ScriptedSubscriber};
pub use world::TestWorld;

/// Client over a fresh recording transport, with JSON already negotiated.
#[fixture]
pub fn client() -> Client<RecordingTransport> {
    Client::new(RecordingTransport::new())
}

/// Builds a JSON channel message for `hook` reporting `detect` on `id`.
#[must_use]
pub fn geofence_payload(hook: &str, detect: &str, id: &str) -> String {
    format!(
        r#"{{"command":"set","group":"g1","detect":"{detect}","hook":"{hook}","key":"fleet","time":"2024-05-01T10:00:00.5Z","id":"{id}","object":{{"type":"Point","coordinates":[-112.26,33.51]}}}}"#
    )
}
