//! Command facade and dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use geoindex_config::Config;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::args::{Arg, Args};
use crate::command::Command;
use crate::envelope::{
    Ack, BoundsResult, ChansResult, EvalResult, FilterResult, GetResult, HooksResult, JgetResult,
    KeysResult, PingResult, ScriptExistsResult, ScriptLoadResult, ServerResult, StatsResult,
    TestResult, TtlResult, decode_reply, reject_failed_envelope,
};
use crate::errors::{ClientError, CommandError, TransportError};
use crate::filter::{
    IntersectsQuery, NearbyQuery, Query, ScanQuery, SearchQuery, ToArgs, WithinQuery,
};
use crate::hooks::{ChannelRegistration, HookRegistration};
use crate::objects::{FsetCommand, GetQuery, JsetCommand, SetCommand, TestQuery};
use crate::subscription::{PushMessage, Subscription, SubscriptionKind};
use crate::transport::{ConnectionSettings, RespConnection, Transport};

/// Log target for dispatched commands.
pub(crate) const DISPATCH_TARGET: &str = "geoindex_client::dispatch";

/// Reply encoding negotiated with `OUTPUT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// JSON documents; the only mode the client decodes.
    Json,
    /// Native RESP values.
    Resp,
}

impl OutputMode {
    const fn token(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Resp => "resp",
        }
    }
}

/// A script invocation for the `EVAL` family: `script numkeys key... arg...`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCall {
    /// Script source, or SHA-1 digest for the `*SHA` variants.
    pub script: String,
    /// Keys made available as `KEYS`.
    pub keys: Vec<String>,
    /// Arguments made available as `ARGV`.
    pub args: Vec<Arg>,
}

impl ScriptCall {
    /// Calls `script` with no keys or arguments.
    #[must_use]
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            keys: Vec::new(),
            args: Vec::new(),
        }
    }

    /// Adds a key.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    /// Adds an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn to_args(&self) -> Args {
        let mut args = Args::new();
        args.push(&self.script).push(Arg::count(self.keys.len()));
        for key in &self.keys {
            args.push(key);
        }
        for arg in &self.args {
            args.push(arg.clone());
        }
        args
    }
}

/// Client for the geospatial engine.
///
/// Every method sends one command, waits for its reply and returns the
/// decoded payload. A reply with `ok: false` becomes
/// [`ClientError::Command`]; nothing is retried.
#[derive(Debug)]
pub struct Client<T> {
    transport: T,
    json_output: AtomicBool,
}

impl Client<RespConnection> {
    /// Connects to the engine described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when the connection cannot be
    /// established or authenticated.
    pub fn connect(config: &Config) -> Result<Self, ClientError> {
        let transport = RespConnection::connect(ConnectionSettings::from(config))?;
        Ok(Self::new(transport))
    }
}

impl<T: Transport> Client<T> {
    /// Wraps `transport` and switches the connection to JSON replies.
    ///
    /// A failed negotiation is logged rather than returned: later commands
    /// still go out, but their replies may not decode.
    pub fn new(transport: T) -> Self {
        let client = Self {
            transport,
            json_output: AtomicBool::new(false),
        };
        if let Err(error) = client.output(OutputMode::Json) {
            warn!(target: DISPATCH_TARGET, %error, "failed to negotiate JSON output");
        }
        client
    }

    /// Underlying transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether JSON output has been negotiated.
    pub fn json_output(&self) -> bool {
        self.json_output.load(Ordering::Acquire)
    }

    fn dispatch(&self, command: Command, args: Args) -> Result<String, ClientError> {
        let mut wire = Args::new();
        if let Some(subcommand) = command.subcommand() {
            wire.push(subcommand);
        }
        wire.append(args);
        debug!(
            target: DISPATCH_TARGET,
            %command,
            args = wire.len(),
            "dispatching command"
        );

        self.transport
            .send_command(command.name(), wire.as_slice())
            .map_err(|error| match error {
                TransportError::Rejected { message } => CommandError::new(command, message).into(),
                other => ClientError::Transport(other),
            })
    }

    /// Sends `command` with `args` and decodes the reply as `R`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when the transport fails,
    /// [`ClientError::Command`] when the engine rejects the command and
    /// [`ClientError::Decode`] when the reply does not match `R`.
    pub fn send<R>(&self, command: Command, args: Args) -> Result<R, ClientError>
    where
        R: DeserializeOwned,
    {
        let raw = self.dispatch(command, args)?;
        decode_reply(command, &raw)
    }

    /// Encodes `builder` and sends it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Encode`] before any I/O when the builder is
    /// invalid, and otherwise the errors of [`Client::send`].
    pub fn execute<B, R>(&self, builder: &B) -> Result<R, ClientError>
    where
        B: ToArgs + ?Sized,
        R: DeserializeOwned,
    {
        let args = builder.to_args()?;
        self.send(builder.command(), args)
    }

    fn literal<R, I, A>(&self, command: Command, args: I) -> Result<R, ClientError>
    where
        R: DeserializeOwned,
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.send(command, args.into_iter().collect())
    }

    /// `AUTH password`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn auth(&self, password: &str) -> Result<Ack, ClientError> {
        self.literal(Command::Auth, [password])
    }

    /// `PING`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn ping(&self) -> Result<PingResult, ClientError> {
        self.literal(Command::Ping, Vec::<Arg>::new())
    }

    /// `QUIT`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn quit(&self) -> Result<Ack, ClientError> {
        self.literal(Command::Quit, Vec::<Arg>::new())
    }

    /// `OUTPUT json|resp`.
    ///
    /// Asking for JSON while JSON is already negotiated sends nothing.
    /// After switching to RESP the reply is not decoded and an empty
    /// [`Ack`] is returned.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn output(&self, mode: OutputMode) -> Result<Ack, ClientError> {
        match mode {
            OutputMode::Json if self.json_output() => Ok(Ack::default()),
            OutputMode::Json => {
                let ack = self.literal(Command::Output, [mode.token()])?;
                self.json_output.store(true, Ordering::Release);
                Ok(ack)
            }
            OutputMode::Resp => {
                let raw = self.dispatch(Command::Output, [mode.token()].into_iter().collect())?;
                reject_failed_envelope(Command::Output, &raw)?;
                self.json_output.store(false, Ordering::Release);
                Ok(Ack::default())
            }
        }
    }

    /// `SERVER`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn server(&self) -> Result<ServerResult, ClientError> {
        self.literal(Command::Server, Vec::<Arg>::new())
    }

    /// `FLUSHDB`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn flushdb(&self) -> Result<Ack, ClientError> {
        self.literal(Command::FlushDb, Vec::<Arg>::new())
    }

    /// `TEST area (INTERSECTS|WITHIN) [CLIP] area`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::execute`].
    pub fn test(&self, query: &TestQuery) -> Result<TestResult, ClientError> {
        self.execute(query)
    }

    /// `GET key id ...`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::execute`].
    pub fn get(&self, query: &GetQuery) -> Result<GetResult, ClientError> {
        self.execute(query)
    }

    /// `SET key id ...`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::execute`].
    pub fn set(&self, command: &SetCommand) -> Result<Ack, ClientError> {
        self.execute(command)
    }

    /// `FSET key id ...`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::execute`].
    pub fn fset(&self, command: &FsetCommand) -> Result<Ack, ClientError> {
        self.execute(command)
    }

    /// `DEL key id`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn del(&self, key: &str, id: &str) -> Result<Ack, ClientError> {
        self.literal(Command::Del, [key, id])
    }

    /// `DEL key id ERRON404`: fails when the object does not exist.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn del_existing(&self, key: &str, id: &str) -> Result<Ack, ClientError> {
        self.literal(Command::Del, [key, id, "ERRON404"])
    }

    /// `DROP key`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn drop(&self, key: &str) -> Result<Ack, ClientError> {
        self.literal(Command::Drop, [key])
    }

    /// `EXPIRE key id seconds`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn expire(&self, key: &str, id: &str, ttl: Duration) -> Result<Ack, ClientError> {
        self.literal(Command::Expire, [Arg::from(key), Arg::from(id), Arg::from(ttl)])
    }

    /// `PERSIST key id`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn persist(&self, key: &str, id: &str) -> Result<Ack, ClientError> {
        self.literal(Command::Persist, [key, id])
    }

    /// `TTL key id`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn ttl(&self, key: &str, id: &str) -> Result<TtlResult, ClientError> {
        self.literal(Command::Ttl, [key, id])
    }

    /// `BOUNDS key`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn bounds(&self, key: &str) -> Result<BoundsResult, ClientError> {
        self.literal(Command::Bounds, [key])
    }

    /// `KEYS pattern`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn keys(&self, pattern: &str) -> Result<KeysResult, ClientError> {
        self.literal(Command::Keys, [pattern])
    }

    /// `PDEL key pattern`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn pdel(&self, key: &str, pattern: &str) -> Result<Ack, ClientError> {
        self.literal(Command::Pdel, [key, pattern])
    }

    /// `RENAME key newkey`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn rename(&self, key: &str, new_key: &str) -> Result<Ack, ClientError> {
        self.literal(Command::Rename, [key, new_key])
    }

    /// `RENAMENX key newkey`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn renamenx(&self, key: &str, new_key: &str) -> Result<Ack, ClientError> {
        self.literal(Command::RenameNx, [key, new_key])
    }

    /// `JGET key id path [RAW]`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn jget(
        &self,
        key: &str,
        id: &str,
        path: &str,
        raw: bool,
    ) -> Result<JgetResult, ClientError> {
        let mut args: Args = [key, id, path].into_iter().collect();
        args.flag(raw, "RAW");
        self.send(Command::Jget, args)
    }

    /// `JSET key id path value [RAW|STR]`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::execute`].
    pub fn jset(&self, command: &JsetCommand) -> Result<Ack, ClientError> {
        self.execute(command)
    }

    /// `JDEL key id path`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn jdel(&self, key: &str, id: &str, path: &str) -> Result<Ack, ClientError> {
        self.literal(Command::Jdel, [key, id, path])
    }

    /// `STATS key...`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn stats<S: AsRef<str>>(&self, keys: &[S]) -> Result<StatsResult, ClientError> {
        self.literal(Command::Stats, keys.iter().map(AsRef::as_ref))
    }

    /// `SCAN key ...`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::execute`].
    pub fn scan(&self, query: &ScanQuery) -> Result<FilterResult, ClientError> {
        self.execute(query)
    }

    /// `SEARCH key ...`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::execute`].
    pub fn search(&self, query: &SearchQuery) -> Result<FilterResult, ClientError> {
        self.execute(query)
    }

    /// `NEARBY key ...`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::execute`].
    pub fn nearby(&self, query: &NearbyQuery) -> Result<FilterResult, ClientError> {
        self.execute(query)
    }

    /// `INTERSECTS key ...`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::execute`].
    pub fn intersects(&self, query: &IntersectsQuery) -> Result<FilterResult, ClientError> {
        self.execute(query)
    }

    /// `WITHIN key ...`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::execute`].
    pub fn within(&self, query: &WithinQuery) -> Result<FilterResult, ClientError> {
        self.execute(query)
    }

    /// Runs a validated search-family query of any family.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::execute`].
    pub fn query(&self, query: &Query) -> Result<FilterResult, ClientError> {
        self.execute(query)
    }

    fn script(&self, command: Command, call: &ScriptCall) -> Result<EvalResult, ClientError> {
        self.send(command, call.to_args())
    }

    /// `EVAL script numkeys key... arg...`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn eval(&self, call: &ScriptCall) -> Result<EvalResult, ClientError> {
        self.script(Command::Eval, call)
    }

    /// `EVALSHA sha numkeys key... arg...`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn evalsha(&self, call: &ScriptCall) -> Result<EvalResult, ClientError> {
        self.script(Command::EvalSha, call)
    }

    /// `EVALNA`: like `EVAL` without atomicity.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn evalna(&self, call: &ScriptCall) -> Result<EvalResult, ClientError> {
        self.script(Command::EvalNa, call)
    }

    /// `EVALNASHA`: like `EVALSHA` without atomicity.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn evalnasha(&self, call: &ScriptCall) -> Result<EvalResult, ClientError> {
        self.script(Command::EvalNaSha, call)
    }

    /// `EVALRO`: read-only `EVAL`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn evalro(&self, call: &ScriptCall) -> Result<EvalResult, ClientError> {
        self.script(Command::EvalRo, call)
    }

    /// `EVALROSHA`: read-only `EVALSHA`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn evalrosha(&self, call: &ScriptCall) -> Result<EvalResult, ClientError> {
        self.script(Command::EvalRoSha, call)
    }

    /// `SCRIPT LOAD script`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn script_load(&self, script: &str) -> Result<ScriptLoadResult, ClientError> {
        self.literal(Command::ScriptLoad, [script])
    }

    /// `SCRIPT EXISTS sha...`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn script_exists<S: AsRef<str>>(
        &self,
        digests: &[S],
    ) -> Result<ScriptExistsResult, ClientError> {
        self.literal(Command::ScriptExists, digests.iter().map(AsRef::as_ref))
    }

    /// `SCRIPT FLUSH`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn script_flush(&self) -> Result<Ack, ClientError> {
        self.literal(Command::ScriptFlush, Vec::<Arg>::new())
    }

    /// `SETHOOK name endpoint ... type query`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::execute`].
    pub fn sethook(&self, hook: &HookRegistration) -> Result<Ack, ClientError> {
        self.execute(hook)
    }

    /// `DELHOOK name`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn delhook(&self, name: &str) -> Result<Ack, ClientError> {
        self.literal(Command::DelHook, [name])
    }

    /// `PDELHOOK pattern`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn pdelhook(&self, pattern: &str) -> Result<Ack, ClientError> {
        self.literal(Command::PdelHook, [pattern])
    }

    /// `HOOKS pattern`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn hooks(&self, pattern: &str) -> Result<HooksResult, ClientError> {
        self.literal(Command::Hooks, [pattern])
    }

    /// `SETCHAN name ... type query`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::execute`].
    pub fn setchan(&self, channel: &ChannelRegistration) -> Result<Ack, ClientError> {
        self.execute(channel)
    }

    /// `DELCHAN name`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn delchan(&self, name: &str) -> Result<Ack, ClientError> {
        self.literal(Command::DelChan, [name])
    }

    /// `PDELCHAN pattern`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn pdelchan(&self, pattern: &str) -> Result<Ack, ClientError> {
        self.literal(Command::PdelChan, [pattern])
    }

    /// `CHANS pattern`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::send`].
    pub fn chans(&self, pattern: &str) -> Result<ChansResult, ClientError> {
        self.literal(Command::Chans, [pattern])
    }

    fn start_subscription<S, F>(
        &self,
        kind: SubscriptionKind,
        targets: &[S],
        on_message: F,
    ) -> Result<Subscription, ClientError>
    where
        S: AsRef<str>,
        F: FnMut(PushMessage) + Send + 'static,
    {
        let duplicate = self.transport.duplicate()?;
        let targets = targets.iter().map(|target| target.as_ref().to_owned()).collect();
        Subscription::start(duplicate, kind, targets, on_message)
    }

    /// `SUBSCRIBE channel...` on a fresh duplicated connection.
    ///
    /// `on_message` runs on the subscription's reader thread.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when the connection cannot be
    /// duplicated or subscribed, and [`ClientError::Spawn`] when the reader
    /// thread cannot start.
    pub fn subscribe<S, F>(
        &self,
        channels: &[S],
        on_message: F,
    ) -> Result<Subscription, ClientError>
    where
        S: AsRef<str>,
        F: FnMut(PushMessage) + Send + 'static,
    {
        self.start_subscription(SubscriptionKind::Channels, channels, on_message)
    }

    /// `PSUBSCRIBE pattern...` on a fresh duplicated connection.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Client::subscribe`].
    pub fn psubscribe<S, F>(
        &self,
        patterns: &[S],
        on_message: F,
    ) -> Result<Subscription, ClientError>
    where
        S: AsRef<str>,
        F: FnMut(PushMessage) + Send + 'static,
    {
        self.start_subscription(SubscriptionKind::Patterns, patterns, on_message)
    }
}
