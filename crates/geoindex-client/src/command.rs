//! Engine command names.

use std::fmt;

/// Every engine command the client issues.
///
/// Most commands are a single uppercase word on the wire. The `SCRIPT`
/// family carries a subcommand that the dispatcher writes as the first
/// argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Command {
    /// `AUTH password`.
    Auth,
    /// `PING`.
    Ping,
    /// `QUIT`.
    Quit,
    /// `OUTPUT json|resp`.
    Output,
    /// `SERVER`.
    Server,
    /// `FLUSHDB`.
    FlushDb,
    /// `TEST` spatial relation between two areas.
    Test,
    /// `GET key id`.
    Get,
    /// `SET key id ...`.
    Set,
    /// `FSET key id field value ...`.
    Fset,
    /// `DEL key id`.
    Del,
    /// `DROP key`.
    Drop,
    /// `EXPIRE key id seconds`.
    Expire,
    /// `PERSIST key id`.
    Persist,
    /// `TTL key id`.
    Ttl,
    /// `BOUNDS key`.
    Bounds,
    /// `KEYS pattern`.
    Keys,
    /// `PDEL key pattern`.
    Pdel,
    /// `RENAME key newkey`.
    Rename,
    /// `RENAMENX key newkey`.
    RenameNx,
    /// `JGET key id path`.
    Jget,
    /// `JSET key id path value`.
    Jset,
    /// `JDEL key id path`.
    Jdel,
    /// `STATS key ...`.
    Stats,
    /// `SCAN key ...`.
    Scan,
    /// `SEARCH key ...`.
    Search,
    /// `NEARBY key ...`.
    Nearby,
    /// `INTERSECTS key ...`.
    Intersects,
    /// `WITHIN key ...`.
    Within,
    /// `EVAL script numkeys ...`.
    Eval,
    /// `EVALSHA sha numkeys ...`.
    EvalSha,
    /// `EVALNA script numkeys ...`.
    EvalNa,
    /// `EVALNASHA sha numkeys ...`.
    EvalNaSha,
    /// `EVALRO script numkeys ...`.
    EvalRo,
    /// `EVALROSHA sha numkeys ...`.
    EvalRoSha,
    /// `SCRIPT LOAD script`.
    ScriptLoad,
    /// `SCRIPT EXISTS sha ...`.
    ScriptExists,
    /// `SCRIPT FLUSH`.
    ScriptFlush,
    /// `SETHOOK name endpoint ...`.
    SetHook,
    /// `DELHOOK name`.
    DelHook,
    /// `PDELHOOK pattern`.
    PdelHook,
    /// `HOOKS pattern`.
    Hooks,
    /// `SETCHAN name ...`.
    SetChan,
    /// `DELCHAN name`.
    DelChan,
    /// `PDELCHAN pattern`.
    PdelChan,
    /// `CHANS pattern`.
    Chans,
    /// `SUBSCRIBE channel ...`.
    Subscribe,
    /// `PSUBSCRIBE pattern ...`.
    Psubscribe,
}

impl Command {
    /// Command word written first on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Auth => "AUTH",
            Self::Ping => "PING",
            Self::Quit => "QUIT",
            Self::Output => "OUTPUT",
            Self::Server => "SERVER",
            Self::FlushDb => "FLUSHDB",
            Self::Test => "TEST",
            Self::Get => "GET",
            Self::Set => "SET",
            Self::Fset => "FSET",
            Self::Del => "DEL",
            Self::Drop => "DROP",
            Self::Expire => "EXPIRE",
            Self::Persist => "PERSIST",
            Self::Ttl => "TTL",
            Self::Bounds => "BOUNDS",
            Self::Keys => "KEYS",
            Self::Pdel => "PDEL",
            Self::Rename => "RENAME",
            Self::RenameNx => "RENAMENX",
            Self::Jget => "JGET",
            Self::Jset => "JSET",
            Self::Jdel => "JDEL",
            Self::Stats => "STATS",
            Self::Scan => "SCAN",
            Self::Search => "SEARCH",
            Self::Nearby => "NEARBY",
            Self::Intersects => "INTERSECTS",
            Self::Within => "WITHIN",
            Self::Eval => "EVAL",
            Self::EvalSha => "EVALSHA",
            Self::EvalNa => "EVALNA",
            Self::EvalNaSha => "EVALNASHA",
            Self::EvalRo => "EVALRO",
            Self::EvalRoSha => "EVALROSHA",
            Self::ScriptLoad | Self::ScriptExists | Self::ScriptFlush => "SCRIPT",
            Self::SetHook => "SETHOOK",
            Self::DelHook => "DELHOOK",
            Self::PdelHook => "PDELHOOK",
            Self::Hooks => "HOOKS",
            Self::SetChan => "SETCHAN",
            Self::DelChan => "DELCHAN",
            Self::PdelChan => "PDELCHAN",
            Self::Chans => "CHANS",
            Self::Subscribe => "SUBSCRIBE",
            Self::Psubscribe => "PSUBSCRIBE",
        }
    }

    /// Subcommand written as the first argument, if the command has one.
    #[must_use]
    pub const fn subcommand(self) -> Option<&'static str> {
        match self {
            Self::ScriptLoad => Some("LOAD"),
            Self::ScriptExists => Some("EXISTS"),
            Self::ScriptFlush => Some("FLUSH"),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subcommand() {
            Some(subcommand) => write!(formatter, "{} {subcommand}", self.name()),
            None => formatter.write_str(self.name()),
        }
    }
}
