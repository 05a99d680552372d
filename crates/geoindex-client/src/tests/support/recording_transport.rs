//! Scripted transport that records every command routed through it.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use crate::args::Arg;
use crate::errors::TransportError;
use crate::subscription::PushMessage;
use crate::transport::{CloseHandle, PushTransport, Transport};

/// Reply returned when no reply has been scripted.
pub const DEFAULT_REPLY: &str = r#"{"ok":true,"elapsed":"1µs"}"#;

/// One command as it would appear on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Command word.
    pub name: String,
    /// Arguments rendered as wire tokens.
    pub args: Vec<String>,
}

#[derive(Default)]
struct RecordingState {
    replies: VecDeque<Result<String, TransportError>>,
    calls: Vec<RecordedCall>,
    subscriptions: Vec<RecordedCall>,
    pending_pushes: Vec<PushMessage>,
    publishers: Vec<Sender<Option<PushMessage>>>,
    duplicate_error: Option<String>,
}

/// Request/reply double whose clones share one script and one call log.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    shared: Arc<Mutex<RecordingState>>,
}

impl RecordingTransport {
    /// Creates a transport answering every command with [`DEFAULT_REPLY`].
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a raw reply for the next command.
    pub fn reply(&self, raw: impl Into<String>) {
        self.state().replies.push_back(Ok(raw.into()));
    }

    /// Queues a transport failure for the next command.
    pub fn fail(&self, error: TransportError) {
        self.state().replies.push_back(Err(error));
    }

    /// Makes the next duplicate fail to connect.
    pub fn fail_duplicate(&self, message: impl Into<String>) {
        self.state().duplicate_error = Some(message.into());
    }

    /// Queues a message delivered by the next duplicated connection.
    pub fn queue_push(&self, message: PushMessage) {
        self.state().pending_pushes.push(message);
    }

    /// Publishes `message` on every open duplicated connection.
    pub fn publish(&self, message: &PushMessage) {
        for publisher in &self.state().publishers {
            let _ = publisher.send(Some(message.clone()));
        }
    }

    /// Commands sent so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Most recent command, if any.
    pub fn last_call(&self) -> Option<RecordedCall> {
        self.state().calls.last().cloned()
    }

    /// `SUBSCRIBE`/`PSUBSCRIBE` requests issued on duplicated connections.
    pub fn subscriptions(&self) -> Vec<RecordedCall> {
        self.state().subscriptions.clone()
    }
}

impl Transport for RecordingTransport {
    type Duplicate = ScriptedSubscriber;

    fn send_command(&self, name: &str, args: &[Arg]) -> Result<String, TransportError> {
        let mut state = self.state();
        state.calls.push(RecordedCall {
            name: name.to_owned(),
            args: args.iter().map(|arg| arg.to_wire().into_owned()).collect(),
        });
        state
            .replies
            .pop_front()
            .unwrap_or_else(|| Ok(String::from(DEFAULT_REPLY)))
    }

    fn duplicate(&self) -> Result<Self::Duplicate, TransportError> {
        let mut state = self.state();
        if let Some(message) = state.duplicate_error.take() {
            return Err(TransportError::Connect {
                endpoint: String::from("127.0.0.1:9851"),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, message),
            });
        }
        let (sender, receiver) = mpsc::channel();
        for message in state.pending_pushes.drain(..) {
            let _ = sender.send(Some(message));
        }
        state.publishers.push(sender.clone());
        Ok(ScriptedSubscriber {
            shared: Arc::clone(&self.shared),
            sender,
            receiver,
        })
    }
}

/// Duplicated connection fed from the owning [`RecordingTransport`].
pub struct ScriptedSubscriber {
    shared: Arc<Mutex<RecordingState>>,
    sender: Sender<Option<PushMessage>>,
    receiver: Receiver<Option<PushMessage>>,
}

impl ScriptedSubscriber {
    fn record(&self, name: &str, targets: &[String]) {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscriptions
            .push(RecordedCall {
                name: name.to_owned(),
                args: targets.to_vec(),
            });
    }
}

impl PushTransport for ScriptedSubscriber {
    fn subscribe(&mut self, channels: &[String]) -> Result<(), TransportError> {
        self.record("SUBSCRIBE", channels);
        Ok(())
    }

    fn psubscribe(&mut self, patterns: &[String]) -> Result<(), TransportError> {
        self.record("PSUBSCRIBE", patterns);
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<PushMessage>, TransportError> {
        Ok(self.receiver.recv().ok().flatten())
    }

    fn closer(&self) -> Result<Box<dyn CloseHandle>, TransportError> {
        Ok(Box::new(ScriptedCloser {
            sender: self.sender.clone(),
        }))
    }
}

struct ScriptedCloser {
    sender: Sender<Option<PushMessage>>,
}

impl CloseHandle for ScriptedCloser {
    fn close(&self) {
        let _ = self.sender.send(None);
    }
}
