//! Client connection channel with signal-based message delivery.
//!
//! - **Channel**: Owns the socket, writes outbound batches, and runs the
//!   receive task that publishes inbound messages
//! - **Endpoint / EndpointSource**: Where to connect, reread on every connect
//! - **Batch / Message**: Outbound and inbound payloads
//!
//! # Example
//!
//! ```no_run
//! use tether_net::{Channel, ChannelConfig, ConfigFile};
//! use std::time::Duration;
//!
//! let config = ChannelConfig::new()
//!     .no_delay(true)
//!     .read_timeout(Duration::from_secs(10));
//!
//! let channel = Channel::with_config(ConfigFile::default(), config);
//!
//! channel.connected().connect(|endpoint| println!("Connected to {endpoint}"));
//! channel.disconnected().connect(|()| println!("Connection closed"));
//! channel.error().connect(|err| eprintln!("Channel error: {err}"));
//!
//! channel.subscribe(|message| {
//!     if let Some(text) = message.as_str() {
//!         println!("Received: {text}");
//!     }
//! });
//!
//! // Connects on first use.
//! channel.send(["ping"]);
//! ```

#[allow(clippy::module_inception)]
mod channel;
mod config;
mod endpoint;
mod message;
mod state;

pub use channel::{Channel, SubscriptionId};
pub use config::ChannelConfig;
pub use endpoint::{ConfigFile, DEFAULT_CONFIG_FILE, Endpoint, EndpointSource};
pub use message::{Batch, Message};
pub use state::ChannelState;
