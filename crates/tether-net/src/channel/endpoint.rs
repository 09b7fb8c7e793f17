//! Remote endpoint and the sources it is read from.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;

/// Default name of the endpoint configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "config.txt";

/// Host and port identifying the remote server.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint from its parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port number.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The address string passed to the resolver.
    pub fn address(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = ConfigError;

    /// Parse `host:port`, or `[v6-address]:port` for IPv6 hosts.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let malformed = || ConfigError::Malformed(line.to_string());

        let (host, port) = line.rsplit_once(':').ok_or_else(malformed)?;
        let host = match host.strip_prefix('[') {
            Some(inner) => inner.strip_suffix(']').ok_or_else(malformed)?,
            None if host.contains(':') => return Err(malformed()),
            None => host,
        };
        if host.is_empty() {
            return Err(malformed());
        }

        let port = port
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| ConfigError::InvalidPort(line.to_string()))?;

        Ok(Self::new(host, port))
    }
}

/// Something the channel can read its endpoint from.
///
/// The source is consulted once per connect attempt, so a changed value is
/// picked up on the next reconnect and never mid-connection.
pub trait EndpointSource: Send + Sync {
    /// Produce the endpoint to connect to.
    fn endpoint(&self) -> Result<Endpoint, ConfigError>;

    /// Short description used in log output.
    fn describe(&self) -> String {
        "endpoint source".to_string()
    }
}

impl EndpointSource for Endpoint {
    fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        format!("fixed endpoint {self}")
    }
}

impl<F> EndpointSource for F
where
    F: Fn() -> Result<Endpoint, ConfigError> + Send + Sync,
{
    fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        self()
    }
}

/// A configuration file whose first non-blank line is `host:port`.
#[derive(Clone, Debug)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    /// Read the endpoint from the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The configuration path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_FILE)
    }
}

impl EndpointSource for ConfigFile {
    fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        let contents =
            fs::read_to_string(&self.path).map_err(|e| ConfigError::io(&self.path, e))?;
        let line = contents
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| ConfigError::Empty {
                path: self.path.clone(),
            })?;
        line.parse()
    }

    fn describe(&self) -> String {
        format!("config file {}", self.path.display())
    }
}
