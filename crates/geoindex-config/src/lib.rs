//! Shared configuration for the geospatial index client.
//!
//! Values are layered by `ortho_config`: built-in defaults, an optional
//! configuration file, `GEOINDEX_*` environment variables and finally CLI
//! flags. The resulting [`Config`] carries the engine address, the optional
//! `AUTH` password and the logging knobs consumed by the client's telemetry
//! bootstrap.

mod defaults;
mod logging;

use std::ffi::OsString;
use std::fmt;

use ortho_config::{OrthoConfig, OrthoResult};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_PORT, default_host, default_log_filter,
    default_log_filter_string, default_log_format, default_port,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Connection and logging settings for the engine client.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "GEOINDEX")]
pub struct Config {
    /// Host name or address of the engine.
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port of the engine.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Password sent with `AUTH` on every connection the client opens.
    #[serde(default)]
    pub password: Option<String>,
    /// `tracing` filter expression, e.g. `info,geoindex_client=debug`.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Output format for log lines.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns an [`ortho_config::OrthoError`] when a flag, variable or file
    /// value cannot be parsed.
    pub fn load() -> OrthoResult<Self> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Loads configuration from `args`, layering defaults, the configuration
    /// file, `GEOINDEX_*` variables and the flags in `args`, later layers
    /// winning.
    ///
    /// The first item is the program name, as with [`std::env::args_os`].
    ///
    /// # Errors
    ///
    /// Returns an [`ortho_config::OrthoError`] when a flag, variable or file
    /// value cannot be parsed.
    pub fn load_from_iter<I, T>(args: I) -> OrthoResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Host name or address of the engine.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port of the engine.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` pair suitable for socket resolution.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Password used to authenticate new connections, if any.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Configured log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("log_filter", &self.log_filter)
            .field("log_format", &self.log_format)
            .finish()
    }
}
