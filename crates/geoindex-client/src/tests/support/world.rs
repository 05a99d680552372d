//! BDD test world wrapping a client over a recording transport.

use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use serde_json::Value;

use crate::client::{Client, OutputMode};
use crate::envelope::{Ack, FilterResult};
use crate::errors::ClientError;
use crate::filter::{FilterOption, Query, QueryKind};
use crate::hooks::RegistrationOption;
use crate::subscription::{PushMessage, Subscription};

use super::recording_transport::{RecordedCall, RecordingTransport};

/// How long a step waits for a pushed message before giving up.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state exercised by BDD step implementations.
pub struct TestWorld {
    /// Transport shared with the client.
    pub transport: RecordingTransport,
    /// Client under test.
    pub client: Client<RecordingTransport>,
    /// Commands recorded before the step under test ran.
    pub calls_before: usize,
    /// Last error observed while exercising the client.
    pub last_error: Option<ClientError>,
    /// Last search-family reply observed.
    pub last_filter: Option<FilterResult>,
    /// Last acknowledgement observed.
    pub last_ack: Option<Ack>,
    /// Active subscription, if a step opened one.
    pub subscription: Option<Subscription>,
    received: Option<Receiver<PushMessage>>,
}

impl TestWorld {
    /// Builds a world whose client has already negotiated JSON output.
    #[must_use]
    pub fn new() -> Self {
        let transport = RecordingTransport::new();
        let client = Client::new(transport.clone());
        let calls_before = transport.calls().len();
        Self {
            transport,
            client,
            calls_before,
            last_error: None,
            last_filter: None,
            last_ack: None,
            subscription: None,
            received: None,
        }
    }

    /// Marks the current call log length as the baseline for later checks.
    pub fn mark(&mut self) {
        self.calls_before = self.transport.calls().len();
    }

    /// Commands recorded since the last [`TestWorld::mark`].
    #[must_use]
    pub fn new_calls(&self) -> Vec<RecordedCall> {
        self.transport
            .calls()
            .into_iter()
            .skip(self.calls_before)
            .collect()
    }

    /// Runs a loose search-family query parsed from JSON.
    pub fn run_query(&mut self, kind: QueryKind, option: Value) {
        self.mark();
        let option: FilterOption = match serde_json::from_value(option) {
            Ok(option) => option,
            Err(error) => panic!("query option should parse: {error}"),
        };
        match Query::from_option(kind, option)
            .map_err(ClientError::from)
            .and_then(|query| self.client.query(&query))
        {
            Ok(result) => self.last_filter = Some(result),
            Err(error) => self.last_error = Some(error),
        }
    }

    /// Registers a hook parsed from JSON.
    pub fn run_sethook(&mut self, option: Value) {
        self.mark();
        let option: RegistrationOption = match serde_json::from_value(option) {
            Ok(option) => option,
            Err(error) => panic!("registration should parse: {error}"),
        };
        match option
            .into_hook()
            .map_err(ClientError::from)
            .and_then(|hook| self.client.sethook(&hook))
        {
            Ok(ack) => self.last_ack = Some(ack),
            Err(error) => self.last_error = Some(error),
        }
    }

    /// Deletes an object, recording the outcome.
    pub fn run_del(&mut self, key: &str, id: &str) {
        self.mark();
        match self.client.del(key, id) {
            Ok(ack) => self.last_ack = Some(ack),
            Err(error) => self.last_error = Some(error),
        }
    }

    /// Requests an output mode, recording the outcome.
    pub fn run_output(&mut self, mode: OutputMode) {
        self.mark();
        match self.client.output(mode) {
            Ok(ack) => self.last_ack = Some(ack),
            Err(error) => self.last_error = Some(error),
        }
    }

    /// Subscribes to `channels`, forwarding deliveries to the world.
    pub fn subscribe(&mut self, channels: &[&str]) {
        let (sender, receiver) = mpsc::channel();
        let subscription = self.client.subscribe(channels, move |message| {
            let _ = sender.send(message);
        });
        match subscription {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.received = Some(receiver);
            }
            Err(error) => self.last_error = Some(error),
        }
    }

    /// Waits for the next delivered message.
    pub fn next_message(&self) -> Option<PushMessage> {
        self.received
            .as_ref()
            .and_then(|receiver| receiver.recv_timeout(DELIVERY_TIMEOUT).ok())
    }

    /// Waits briefly and reports whether any further message arrived.
    pub fn received_more(&self) -> bool {
        self.received
            .as_ref()
            .is_some_and(|receiver| receiver.recv_timeout(Duration::from_millis(100)).is_ok())
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}
