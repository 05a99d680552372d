//! Error types surfaced by the client.

use std::io;

use thiserror::Error;

use crate::command::Command;

/// The caller supplied options the engine grammar cannot express.
///
/// Raised before any network I/O takes place.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// The index key was empty.
    #[error("a key is required")]
    MissingKey,

    /// More than one area predicate was populated.
    #[error("exactly one area predicate is allowed, found {}", found.join(", "))]
    MultipleAreas {
        /// Predicate names that were populated, in grammar order.
        found: Vec<&'static str>,
    },

    /// A geometric command was issued without an area predicate.
    #[error("{command} requires an area predicate")]
    MissingArea {
        /// Command being encoded.
        command: Command,
    },

    /// The area predicate is not part of the command's grammar.
    #[error("{command} does not accept a {area} area")]
    AreaNotAllowed {
        /// Command being encoded.
        command: Command,
        /// Offending predicate keyword.
        area: &'static str,
    },

    /// An option is not part of the command's grammar.
    #[error("{command} does not accept the {option} option")]
    UnsupportedOption {
        /// Command being encoded.
        command: Command,
        /// Offending option name.
        option: &'static str,
    },

    /// `NODWELL`, `DETECT` or `COMMANDS` supplied while `FENCE` is off.
    #[error("{option} requires fence to be enabled")]
    FenceOptionWithoutFence {
        /// Offending option name.
        option: &'static str,
    },

    /// `hashes` output requested without a geohash precision.
    #[error("hashes output requires a precision")]
    MissingPrecision,

    /// A precision was supplied for an output format other than `hashes`.
    #[error("precision is only valid with hashes output")]
    PrecisionWithoutHashes,

    /// A coordinate or distance was NaN or infinite.
    #[error("{name} must be a finite number")]
    NonFiniteCoordinate {
        /// Name of the offending value.
        name: &'static str,
    },

    /// A hook or channel registration had an empty name.
    #[error("a hook or channel name is required")]
    MissingName,

    /// A hook registration had no endpoint.
    #[error("a hook requires at least one endpoint")]
    MissingEndpoint,

    /// A GeoJSON payload was not a JSON object.
    #[error("GeoJSON payload must be a JSON object")]
    InvalidObject,

    /// A string operand of an area predicate was empty.
    #[error("{area} {name} must not be empty")]
    EmptyOperand {
        /// Predicate keyword, e.g. `HASH`.
        area: &'static str,
        /// Name of the empty operand.
        name: &'static str,
    },
}

/// Transport-layer errors.
///
/// These are returned by [`Transport`](crate::Transport) implementations and
/// reach callers unchanged.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The engine address could not be resolved.
    #[error("failed to resolve engine address {endpoint}: {source}")]
    Resolve {
        /// Address that was looked up.
        endpoint: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },

    /// The TCP connection could not be established.
    #[error("failed to connect to engine at {endpoint}: {source}")]
    Connect {
        /// Address that was dialled.
        endpoint: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// A reply frame did not follow the wire protocol.
    #[error("malformed reply frame: {message}")]
    Protocol {
        /// What was wrong with the frame.
        message: String,
    },

    /// The engine answered with a protocol-level error frame.
    #[error("engine error: {message}")]
    Rejected {
        /// Error text sent by the engine.
        message: String,
    },

    /// The connection was closed by either side.
    #[error("connection closed")]
    Closed,
}

/// The engine processed a command and reported failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CommandError {
    command: Command,
    message: String,
}

impl CommandError {
    /// Builds an error for `command` carrying the engine's `err` text.
    #[must_use]
    pub fn new(command: Command, message: impl Into<String>) -> Self {
        Self {
            command,
            message: message.into(),
        }
    }

    /// Command that failed.
    #[must_use]
    pub const fn command(&self) -> Command {
        self.command
    }

    /// Error text reported by the engine, verbatim.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors returned by [`Client`](crate::Client) operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Options could not be encoded; nothing was sent.
    #[error("invalid command options: {0}")]
    Encode(#[from] EncodeError),

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The engine rejected the command.
    #[error("{} failed: {}", .0.command(), .0.message())]
    Command(#[from] CommandError),

    /// The reply was not the JSON document the command promises.
    #[error("failed to decode {command} reply: {source}")]
    Decode {
        /// Command whose reply failed to decode.
        command: Command,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The subscription reader thread could not be started.
    #[error("failed to start subscription reader: {0}")]
    Spawn(#[source] io::Error),
}

impl ClientError {
    /// Returns the engine error when the command was rejected.
    #[must_use]
    pub const fn as_command_error(&self) -> Option<&CommandError> {
        match self {
            Self::Command(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn command_error_message_is_engine_text() {
        let error = CommandError::new(Command::Get, "key not found");

        assert_eq!(error.message(), "key not found");
        assert_eq!(error.to_string(), "key not found");
    }

    #[rstest]
    fn client_error_names_failed_command() {
        let error = ClientError::from(CommandError::new(Command::Del, "id not found"));

        assert_eq!(error.to_string(), "DEL failed: id not found");
    }

    #[rstest]
    fn multiple_areas_lists_predicates() {
        let error = EncodeError::MultipleAreas {
            found: vec!["BOUNDS", "CIRCLE"],
        };

        assert_eq!(
            error.to_string(),
            "exactly one area predicate is allowed, found BOUNDS, CIRCLE"
        );
    }
}
