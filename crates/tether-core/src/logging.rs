//! Tracing targets used throughout tether.
//!
//! tether uses the `tracing` crate for instrumentation and never installs a
//! subscriber itself. To see logs, install one in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("tether_net=debug")
//!     .init();
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "tether_core::signal";
    /// Connection channel target.
    pub const CHANNEL: &str = "tether_net::channel";
    /// Wire codec target.
    pub const CODEC: &str = "tether_net::codec";
}
