//! Error types for the networking module.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// A specialized Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Errors raised while reading the endpoint configuration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// The configuration file has no endpoint line.
    #[error("Configuration '{path}' contains no endpoint")]
    Empty { path: PathBuf },

    /// The endpoint line is not of the form `host:port`.
    #[error("Malformed endpoint '{0}', expected host:port")]
    Malformed(String),

    /// The port is not a number in `1..=65535`.
    #[error("Invalid port in endpoint '{0}'")]
    InvalidPort(String),
}

impl ConfigError {
    /// Create an I/O error for the given configuration path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

/// Coarse failure class of a [`ChannelError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Opening the connection failed.
    Connect,
    /// Writing an outbound batch failed.
    Write,
    /// Reading or decoding an inbound message failed.
    Read,
    /// An outbound batch could not be encoded.
    Encode,
    /// Releasing a connection resource failed.
    Teardown,
}

/// Errors produced by the connection channel.
///
/// I/O sources are shared behind an `Arc` so the same error can be logged,
/// emitted on the channel's `error` signal, and returned to the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    /// The endpoint configuration could not be read.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The endpoint could not be resolved or connected.
    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: Arc<io::Error>,
    },

    /// Connecting did not complete within the connect timeout.
    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),

    /// Writing or flushing an outbound frame failed.
    #[error("Write failed: {0}")]
    Write(#[source] Arc<io::Error>),

    /// Reading from the socket failed or the peer closed the connection.
    #[error("Read failed: {0}")]
    Read(#[source] Arc<io::Error>),

    /// An inbound frame could not be decoded.
    #[error("Malformed inbound frame: {0}")]
    Decode(String),

    /// An outbound item could not be serialized.
    #[error("Failed to encode outbound batch: {0}")]
    Encode(String),

    /// A frame exceeded the configured maximum frame length.
    #[error("Frame of {length} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { length: usize, limit: usize },

    /// Releasing a socket resource failed.
    #[error("Teardown of {resource} failed: {source}")]
    Teardown {
        resource: &'static str,
        #[source]
        source: Arc<io::Error>,
    },
}

impl ChannelError {
    pub(crate) fn connect(address: impl Into<String>, source: io::Error) -> Self {
        Self::Connect {
            address: address.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn write(source: io::Error) -> Self {
        Self::Write(Arc::new(source))
    }

    pub(crate) fn read(source: io::Error) -> Self {
        Self::Read(Arc::new(source))
    }

    pub(crate) fn teardown(resource: &'static str, source: io::Error) -> Self {
        Self::Teardown {
            resource,
            source: Arc::new(source),
        }
    }

    /// The failure class this error belongs to.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Config(_) | Self::Connect { .. } | Self::ConnectTimeout(_) => {
                FailureKind::Connect
            }
            Self::Write(_) => FailureKind::Write,
            Self::Read(_) | Self::Decode(_) => FailureKind::Read,
            Self::Encode(_) | Self::FrameTooLarge { .. } => FailureKind::Encode,
            Self::Teardown { .. } => FailureKind::Teardown,
        }
    }

    /// Whether the failure ends the current connection.
    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind(), FailureKind::Encode | FailureKind::Teardown)
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds() {
        let refused = ChannelError::connect(
            "127.0.0.1:9",
            io::Error::from(io::ErrorKind::ConnectionRefused),
        );
        assert_eq!(refused.kind(), FailureKind::Connect);
        assert!(refused.is_fatal());

        let config: ChannelError = ConfigError::Malformed("nope".into()).into();
        assert_eq!(config.kind(), FailureKind::Connect);

        let write = ChannelError::write(io::Error::from(io::ErrorKind::BrokenPipe));
        assert_eq!(write.kind(), FailureKind::Write);

        let decode = ChannelError::Decode("bad json".into());
        assert_eq!(decode.kind(), FailureKind::Read);

        let too_large = ChannelError::FrameTooLarge {
            length: 10,
            limit: 5,
        };
        assert_eq!(too_large.kind(), FailureKind::Encode);
        assert!(!too_large.is_fatal());

        let teardown =
            ChannelError::teardown("socket", io::Error::from(io::ErrorKind::NotConnected));
        assert!(!teardown.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = ChannelError::FrameTooLarge {
            length: 2048,
            limit: 1024,
        };
        assert_eq!(
            err.to_string(),
            "Frame of 2048 bytes exceeds the 1024 byte limit"
        );

        let err = ConfigError::InvalidPort("host:99999".into());
        assert_eq!(err.to_string(), "Invalid port in endpoint 'host:99999'");
    }
}
