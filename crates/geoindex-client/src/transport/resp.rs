//! RESP-over-TCP adapter.
//!
//! Requests are written as arrays of bulk strings:
//! ```text
//! *3\r\n$3\r\nGET\r\n$5\r\nfleet\r\n$6\r\ntruck1\r\n
//! ```
//! Replies are single frames. Once JSON output is negotiated the engine
//! answers with one bulk string holding a JSON document; error frames
//! (`-ERR ...`) surface as [`TransportError::Rejected`].

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use geoindex_config::Config;
use socket2::SockRef;
use tracing::{debug, warn};

use super::{CloseHandle, PushTransport, TRANSPORT_TARGET, Transport};
use crate::args::Arg;
use crate::errors::TransportError;
use crate::subscription::PushMessage;

/// Default limit for establishing a TCP connection.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest bulk string accepted from the engine.
pub(crate) const MAX_BULK_LENGTH: usize = 512 * 1024 * 1024;

/// Deepest array nesting accepted from the engine.
pub(crate) const MAX_NESTING: usize = 32;

/// Where and how to connect.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Password sent with `AUTH` right after connecting.
    pub password: Option<String>,
    /// Limit for establishing the TCP connection.
    pub connect_timeout: Duration,
}

impl ConnectionSettings {
    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&Config> for ConnectionSettings {
    fn from(config: &Config) -> Self {
        Self {
            host: config.host().to_owned(),
            port: config.port(),
            password: config.password().map(ToOwned::to_owned),
            connect_timeout: CONNECTION_TIMEOUT,
        }
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// A decoded RESP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<String>),
    Array(Option<Vec<Frame>>),
}

fn protocol(message: impl Into<String>) -> TransportError {
    TransportError::Protocol {
        message: message.into(),
    }
}

pub(crate) fn encode_request(name: &str, args: &[Arg]) -> Vec<u8> {
    let mut request = format!("*{}\r\n", args.len() + 1).into_bytes();
    push_bulk(&mut request, name.as_bytes());
    for arg in args {
        push_bulk(&mut request, arg.to_wire().as_bytes());
    }
    request
}

fn push_bulk(buffer: &mut Vec<u8>, payload: &[u8]) {
    buffer.extend_from_slice(format!("${}\r\n", payload.len()).as_bytes());
    buffer.extend_from_slice(payload);
    buffer.extend_from_slice(b"\r\n");
}

fn read_line<R: BufRead>(reader: &mut R) -> Result<String, TransportError> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line)? == 0 {
        return Err(TransportError::Closed);
    }
    if !line.ends_with(b"\r\n") {
        return Err(protocol("frame line is not CRLF terminated"));
    }
    line.truncate(line.len() - 2);
    String::from_utf8(line).map_err(|_| protocol("frame line is not UTF-8"))
}

fn parse_number(body: &str) -> Result<i64, TransportError> {
    body.parse()
        .map_err(|_| protocol(format!("invalid length or integer {body:?}")))
}

pub(crate) fn read_frame<R: BufRead>(reader: &mut R) -> Result<Frame, TransportError> {
    read_nested_frame(reader, 0)
}

fn read_nested_frame<R: BufRead>(reader: &mut R, depth: usize) -> Result<Frame, TransportError> {
    if depth > MAX_NESTING {
        return Err(protocol(format!("arrays nested deeper than {MAX_NESTING}")));
    }
    let line = read_line(reader)?;
    let Some(marker) = line.chars().next() else {
        return Err(protocol("empty frame"));
    };
    let body = line.get(marker.len_utf8()..).unwrap_or_default();

    match marker {
        '+' => Ok(Frame::Simple(body.to_owned())),
        '-' => Ok(Frame::Error(body.to_owned())),
        ':' => parse_number(body).map(Frame::Integer),
        '$' => {
            let Ok(length) = usize::try_from(parse_number(body)?) else {
                return Ok(Frame::Bulk(None));
            };
            if length > MAX_BULK_LENGTH {
                return Err(protocol(format!(
                    "bulk string of {length} bytes exceeds {MAX_BULK_LENGTH}"
                )));
            }
            let mut payload = vec![0_u8; length + 2];
            reader.read_exact(&mut payload)?;
            if !payload.ends_with(b"\r\n") {
                return Err(protocol("bulk string is not CRLF terminated"));
            }
            payload.truncate(length);
            String::from_utf8(payload)
                .map(|text| Frame::Bulk(Some(text)))
                .map_err(|_| protocol("bulk string is not UTF-8"))
        }
        '*' => {
            let Ok(count) = usize::try_from(parse_number(body)?) else {
                return Ok(Frame::Array(None));
            };
            (0..count)
                .map(|_| read_nested_frame(reader, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(|items| Frame::Array(Some(items)))
        }
        other => Err(protocol(format!("unexpected frame marker {other:?}"))),
    }
}

fn reply_text(frame: Frame) -> Result<String, TransportError> {
    match frame {
        Frame::Simple(text) | Frame::Bulk(Some(text)) => Ok(text),
        Frame::Integer(value) => Ok(value.to_string()),
        Frame::Error(message) => Err(TransportError::Rejected { message }),
        Frame::Bulk(None) | Frame::Array(None) => Err(protocol("null reply")),
        Frame::Array(Some(_)) => Err(protocol("unexpected array reply")),
    }
}

fn resolve_tcp_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    let mut addrs = (host, port).to_socket_addrs()?;
    addrs
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}

fn open_stream(settings: &ConnectionSettings) -> Result<TcpStream, TransportError> {
    let endpoint = settings.endpoint();
    let address = resolve_tcp_address(&settings.host, settings.port).map_err(|source| {
        TransportError::Resolve {
            endpoint: endpoint.clone(),
            source,
        }
    })?;

    let stream = TcpStream::connect_timeout(&address, settings.connect_timeout)
        .map_err(|source| TransportError::Connect { endpoint, source })?;
    stream.set_nodelay(true)?;
    debug!(target: TRANSPORT_TARGET, %address, "connected to engine");
    Ok(stream)
}

fn round_trip<S>(
    stream: &mut BufReader<S>,
    name: &str,
    args: &[Arg],
) -> Result<String, TransportError>
where
    S: Read + Write,
{
    let request = encode_request(name, args);
    let writer = stream.get_mut();
    writer.write_all(&request)?;
    writer.flush()?;
    reply_text(read_frame(stream)?)
}

fn authenticate<S>(stream: &mut BufReader<S>, password: Option<&str>) -> Result<(), TransportError>
where
    S: Read + Write,
{
    if let Some(password) = password {
        round_trip(stream, "AUTH", &[Arg::from(password)])?;
    }
    Ok(())
}

/// Request/reply connection speaking RESP over TCP.
///
/// One request is in flight at a time; callers on other threads wait on
/// the connection lock.
pub struct RespConnection {
    settings: ConnectionSettings,
    stream: Mutex<BufReader<TcpStream>>,
}

impl RespConnection {
    /// Connects and, when a password is configured, authenticates.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Resolve`] or [`TransportError::Connect`]
    /// when the engine cannot be reached, and [`TransportError::Rejected`]
    /// when authentication fails.
    pub fn connect(settings: ConnectionSettings) -> Result<Self, TransportError> {
        let mut stream = BufReader::new(open_stream(&settings)?);
        authenticate(&mut stream, settings.password.as_deref())?;
        Ok(Self {
            settings,
            stream: Mutex::new(stream),
        })
    }

    /// Settings this connection was opened with.
    #[must_use]
    pub const fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }
}

impl fmt::Debug for RespConnection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RespConnection")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Transport for RespConnection {
    type Duplicate = RespSubscriber;

    fn send_command(&self, name: &str, args: &[Arg]) -> Result<String, TransportError> {
        let mut stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        round_trip(&mut *stream, name, args)
    }

    fn duplicate(&self) -> Result<Self::Duplicate, TransportError> {
        RespSubscriber::connect(&self.settings)
    }
}

/// Connection dedicated to pub/sub delivery.
pub struct RespSubscriber {
    reader: BufReader<TcpStream>,
    closed: Arc<AtomicBool>,
}

impl RespSubscriber {
    /// Opens and authenticates a fresh connection for push delivery.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`RespConnection::connect`].
    pub fn connect(settings: &ConnectionSettings) -> Result<Self, TransportError> {
        let stream = open_stream(settings)?;
        SockRef::from(&stream).set_keepalive(true)?;
        let mut reader = BufReader::new(stream);
        authenticate(&mut reader, settings.password.as_deref())?;
        Ok(Self {
            reader,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn write_request(&mut self, name: &str, targets: &[String]) -> Result<(), TransportError> {
        let args: Vec<Arg> = targets.iter().map(Arg::from).collect();
        let writer = self.reader.get_mut();
        writer.write_all(&encode_request(name, &args))?;
        writer.flush()?;
        Ok(())
    }
}

fn bulk_text(frame: Option<Frame>) -> Option<String> {
    match frame {
        Some(Frame::Bulk(Some(text)) | Frame::Simple(text)) => Some(text),
        _ => None,
    }
}

/// Interprets a pushed frame; `None` for confirmations and unknown frames.
pub(crate) fn push_message(frame: Frame) -> Option<PushMessage> {
    let items = match frame {
        Frame::Array(Some(items)) => items,
        other => {
            warn!(target: TRANSPORT_TARGET, frame = ?other, "ignoring non-array push frame");
            return None;
        }
    };
    let mut items = items.into_iter();
    let kind = bulk_text(items.next());
    match kind.as_deref() {
        Some("message") => {
            let channel = bulk_text(items.next())?;
            let payload = bulk_text(items.next())?;
            Some(PushMessage::new(channel, None, payload))
        }
        Some("pmessage") => {
            let pattern = bulk_text(items.next())?;
            let channel = bulk_text(items.next())?;
            let payload = bulk_text(items.next())?;
            Some(PushMessage::new(channel, Some(pattern), payload))
        }
        Some(confirmation @ ("subscribe" | "psubscribe")) => {
            let channel = bulk_text(items.next());
            debug!(target: TRANSPORT_TARGET, confirmation, ?channel, "subscription confirmed");
            None
        }
        other => {
            warn!(target: TRANSPORT_TARGET, kind = ?other, "ignoring unexpected push frame");
            None
        }
    }
}

impl PushTransport for RespSubscriber {
    fn subscribe(&mut self, channels: &[String]) -> Result<(), TransportError> {
        self.write_request("SUBSCRIBE", channels)
    }

    fn psubscribe(&mut self, patterns: &[String]) -> Result<(), TransportError> {
        self.write_request("PSUBSCRIBE", patterns)
    }

    fn receive(&mut self) -> Result<Option<PushMessage>, TransportError> {
        loop {
            let frame = match read_frame(&mut self.reader) {
                Ok(frame) => frame,
                Err(TransportError::Closed) => return Ok(None),
                Err(_) if self.closed.load(Ordering::Acquire) => return Ok(None),
                Err(error) => return Err(error),
            };
            if let Frame::Error(message) = frame {
                return Err(TransportError::Rejected { message });
            }
            if let Some(message) = push_message(frame) {
                return Ok(Some(message));
            }
        }
    }

    fn closer(&self) -> Result<Box<dyn CloseHandle>, TransportError> {
        Ok(Box::new(RespCloser {
            stream: self.reader.get_ref().try_clone()?,
            closed: Arc::clone(&self.closed),
        }))
    }
}

/// Shuts down a [`RespSubscriber`] socket from another thread.
#[derive(Debug)]
pub struct RespCloser {
    stream: TcpStream,
    closed: Arc<AtomicBool>,
}

impl CloseHandle for RespCloser {
    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(error) = self.stream.shutdown(Shutdown::Both) {
            debug!(target: TRANSPORT_TARGET, %error, "subscriber socket already closed");
        }
    }
}
