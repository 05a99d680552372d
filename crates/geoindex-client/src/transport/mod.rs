//! Transport port between the client and the engine connection.
//!
//! The client never touches sockets directly. Request/reply traffic goes
//! through [`Transport`], and pub/sub traffic through the dedicated
//! connection a [`Transport`] duplicates into a [`PushTransport`]. The RESP
//! adapter in [`resp`] is the production implementation; tests substitute
//! scripted doubles.

mod resp;

use crate::args::Arg;
use crate::errors::TransportError;
use crate::subscription::PushMessage;

pub use self::resp::{
    CONNECTION_TIMEOUT, ConnectionSettings, RespCloser, RespConnection, RespSubscriber,
};

/// Log target for transport operations.
pub(crate) const TRANSPORT_TARGET: &str = "geoindex_client::transport";

/// Request/reply connection to the engine.
///
/// Implementations pair each request with exactly one reply. The protocol
/// has no request identifiers, so concurrent callers must be serialised
/// inside the implementation.
pub trait Transport: Send + Sync {
    /// Connection type returned by [`Transport::duplicate`].
    type Duplicate: PushTransport;

    /// Sends `name` followed by `args` and returns the raw reply text.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Rejected`] when the engine answers with a
    /// protocol-level error, and other variants for I/O or framing failures.
    fn send_command(&self, name: &str, args: &[Arg]) -> Result<String, TransportError>;

    /// Opens an independent connection to the same engine for push delivery.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the new connection cannot be
    /// established or authenticated.
    fn duplicate(&self) -> Result<Self::Duplicate, TransportError>;
}

/// Connection dedicated to pub/sub delivery.
pub trait PushTransport: Send + 'static {
    /// Subscribes to the named channels.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the request cannot be written.
    fn subscribe(&mut self, channels: &[String]) -> Result<(), TransportError>;

    /// Subscribes to channels matching the glob patterns.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the request cannot be written.
    fn psubscribe(&mut self, patterns: &[String]) -> Result<(), TransportError>;

    /// Blocks until the next published message.
    ///
    /// Returns `Ok(None)` once the connection has been closed.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] on I/O or framing failures.
    fn receive(&mut self) -> Result<Option<PushMessage>, TransportError>;

    /// Handle able to close this connection from another thread.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the handle cannot be created.
    fn closer(&self) -> Result<Box<dyn CloseHandle>, TransportError>;
}

/// Closes a [`PushTransport`] from outside its reader thread.
pub trait CloseHandle: Send + Sync {
    /// Closes the connection, unblocking a pending
    /// [`PushTransport::receive`]. Closing twice is harmless.
    fn close(&self);
}
