//! Networking module for tether.
//!
//! This crate provides the client side of a client-server application:
//!
//! - **Channel**: A lazily connecting TCP channel that writes message
//!   batches and publishes every inbound message to subscribers
//! - **Codec**: Length-prefixed, versioned JSON framing
//! - **Endpoint configuration**: `host:port` read from a configuration file
//!   (or any other source) each time the channel connects
//!
//! # Sending and Receiving
//!
//! ```no_run
//! use tether_net::{Channel, ConfigFile};
//!
//! let channel = Channel::new(ConfigFile::new("config.txt"));
//!
//! channel.subscribe(|message| {
//!     println!("Received {}", message.payload());
//! });
//!
//! // Connects, then writes ["login", "erik", 42] as one frame.
//! channel.send([
//!     serde_json::json!("login"),
//!     serde_json::json!("erik"),
//!     serde_json::json!(42),
//! ]);
//! ```
//!
//! # Failure Handling
//!
//! `send` never returns an error: failures are logged with `tracing`,
//! emitted on the channel's `error` signal, and close the connection. The
//! next send reconnects. Use `try_send` when the caller wants the error too.

pub mod channel;
pub mod codec;
mod error;

pub use error::{ChannelError, ConfigError, FailureKind, Result};

// Re-export commonly used types at the crate root
pub use channel::{
    Batch, Channel, ChannelConfig, ChannelState, ConfigFile, DEFAULT_CONFIG_FILE, Endpoint,
    EndpointSource, Message, SubscriptionId,
};
pub use tether_core::{ConnectionGuard, Signal};
