//! Pub/sub subscriptions on duplicated connections.
//!
//! Every subscription owns its own connection and reader thread, so a slow
//! callback only delays its own messages. The handle closes the connection
//! when dropped; [`Subscription::close`] does the same and also waits for
//! the reader to finish, re-raising a panic from the callback.

use std::fmt;
use std::panic;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::errors::{ClientError, TransportError};
use crate::hooks::GeofenceEvent;
use crate::transport::{CloseHandle, PushTransport};

/// Log target for subscription lifecycle events.
pub(crate) const SUBSCRIPTION_TARGET: &str = "geoindex_client::subscription";

/// A message published on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    channel: String,
    pattern: Option<String>,
    payload: String,
}

impl PushMessage {
    /// Builds a message received on `channel`, via `pattern` for pattern
    /// subscriptions.
    #[must_use]
    pub const fn new(channel: String, pattern: Option<String>, payload: String) -> Self {
        Self {
            channel,
            pattern,
            payload,
        }
    }

    /// Channel the message was published on.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Pattern that matched, for `PSUBSCRIBE` deliveries.
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// Raw message body, usually a JSON geofence event.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Decodes the body as a geofence event.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the body is not a geofence event.
    pub fn event(&self) -> Result<GeofenceEvent, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

/// Whether a subscription names channels or glob patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// `SUBSCRIBE channel...`.
    Channels,
    /// `PSUBSCRIBE pattern...`.
    Patterns,
}

/// An active subscription.
///
/// Dropping the handle closes the dedicated connection. Messages already
/// being delivered finish; nothing is delivered afterwards.
pub struct Subscription {
    kind: SubscriptionKind,
    targets: Vec<String>,
    closer: Box<dyn CloseHandle>,
    reader: Option<JoinHandle<Result<(), TransportError>>>,
}

impl Subscription {
    /// Subscribes `transport` to `targets` and starts delivering to
    /// `on_message` on a dedicated thread.
    pub(crate) fn start<P, F>(
        mut transport: P,
        kind: SubscriptionKind,
        targets: Vec<String>,
        on_message: F,
    ) -> Result<Self, ClientError>
    where
        P: PushTransport,
        F: FnMut(PushMessage) + Send + 'static,
    {
        match kind {
            SubscriptionKind::Channels => transport.subscribe(&targets)?,
            SubscriptionKind::Patterns => transport.psubscribe(&targets)?,
        }
        let closer = transport.closer()?;

        let reader = thread::Builder::new()
            .name(String::from("geoindex-subscription"))
            .spawn(move || deliver(transport, on_message))
            .map_err(ClientError::Spawn)?;

        debug!(target: SUBSCRIPTION_TARGET, ?kind, ?targets, "subscription started");
        Ok(Self {
            kind,
            targets,
            closer,
            reader: Some(reader),
        })
    }

    /// Channels or patterns this subscription listens on.
    #[must_use]
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Whether the targets are channels or patterns.
    #[must_use]
    pub const fn kind(&self) -> SubscriptionKind {
        self.kind
    }

    /// Whether the reader has stopped, because the connection closed or
    /// failed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.reader.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Closes the connection and waits for the reader thread.
    ///
    /// # Errors
    ///
    /// Returns the transport error that stopped delivery, if any.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from the message callback.
    pub fn close(mut self) -> Result<(), ClientError> {
        self.closer.close();
        let Some(reader) = self.reader.take() else {
            return Ok(());
        };
        debug!(target: SUBSCRIPTION_TARGET, targets = ?self.targets, "subscription closed");
        match reader.join() {
            Ok(result) => result.map_err(ClientError::from),
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.reader.take().is_some() {
            self.closer.close();
            debug!(target: SUBSCRIPTION_TARGET, targets = ?self.targets, "subscription dropped");
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("targets", &self.targets)
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

fn deliver<P, F>(mut transport: P, mut on_message: F) -> Result<(), TransportError>
where
    P: PushTransport,
    F: FnMut(PushMessage),
{
    loop {
        match transport.receive() {
            Ok(Some(message)) => on_message(message),
            Ok(None) => {
                debug!(target: SUBSCRIPTION_TARGET, "subscription connection closed");
                return Ok(());
            }
            Err(error) => {
                warn!(target: SUBSCRIPTION_TARGET, %error, "subscription delivery failed");
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::filter::Detect;

    #[rstest]
    fn event_decodes_geofence_payload() {
        let message = PushMessage::new(
            String::from("warehouse"),
            None,
            String::from(
                r#"{"command":"del","detect":"exit","hook":"warehouse","key":"fleet","id":"truck1","time":"2024-05-01T10:00:00Z"}"#,
            ),
        );

        let event = match message.event() {
            Ok(event) => event,
            Err(error) => panic!("payload should decode: {error}"),
        };

        assert_eq!(event.transition(), Some(Detect::Exit));
        assert_eq!(event.id, "truck1");
        assert_eq!(message.pattern(), None);
    }

    #[rstest]
    fn non_event_payload_is_a_decode_error() {
        let message = PushMessage::new(String::from("news"), None, String::from("hello"));

        assert!(message.event().is_err());
    }
}
