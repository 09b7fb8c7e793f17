//! Configuration for a connection channel.

use std::time::Duration;

use crate::codec::DEFAULT_MAX_FRAME_LENGTH;

/// Socket and framing options applied each time a channel connects.
///
/// A zero timeout, whether set through the builder or a field, is treated
/// as no timeout.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// Read timeout of the receive task's blocking read. Each expiry is an
    /// idle tick on which the task checks whether its connection is still
    /// current. `None` blocks until data arrives or the socket closes.
    pub read_timeout: Option<Duration>,
    /// Write timeout. `None` means no timeout.
    pub write_timeout: Option<Duration>,
    /// Connection timeout. `None` uses the operating system's timeout.
    pub connect_timeout: Option<Duration>,
    /// Enable TCP_NODELAY (disable Nagle's algorithm).
    pub no_delay: bool,
    /// Read buffer size in bytes.
    pub read_buffer_size: usize,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Largest accepted frame, in bytes, in either direction.
    pub max_frame_length: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            read_timeout: Some(Duration::from_secs(10)),
            write_timeout: None,
            connect_timeout: Some(Duration::from_secs(30)),
            no_delay: false,
            read_buffer_size: 8192,
            write_buffer_size: 8192,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

impl ChannelConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the read timeout. A zero duration means no timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout).filter(|t| !t.is_zero());
        self
    }

    /// Block reads until data arrives or the socket closes.
    pub fn no_read_timeout(mut self) -> Self {
        self.read_timeout = None;
        self
    }

    /// Set the write timeout. A zero duration means no timeout.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout).filter(|t| !t.is_zero());
        self
    }

    /// Set the connection timeout. A zero duration means no timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout).filter(|t| !t.is_zero());
        self
    }

    /// Disable connection timeout.
    pub fn no_connect_timeout(mut self) -> Self {
        self.connect_timeout = None;
        self
    }

    /// Enable or disable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = enabled;
        self
    }

    /// Set the read buffer size.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the write buffer size.
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Set the maximum frame length.
    pub fn max_frame_length(mut self, length: usize) -> Self {
        self.max_frame_length = length;
        self
    }
}
