//! Connection state of a channel.

/// Current state of a [`Channel`](super::Channel).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelState {
    /// No socket is open. The next send connects.
    #[default]
    Disconnected,
    /// A socket is open and a receive task is running.
    Connected,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}
