//! Core systems for tether.
//!
//! This crate provides the pieces shared by every tether component:
//!
//! - **Signal/Slot System**: Thread-safe observer lists
//! - **Logging**: `tracing` target names for filtering
//!
//! # Signal/Slot Example
//!
//! ```
//! use tether_core::Signal;
//!
//! let value_changed = Signal::<i32>::new();
//!
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! value_changed.emit(42);
//!
//! value_changed.disconnect(conn_id);
//! ```

pub mod logging;
pub mod signal;

pub use signal::{ConnectionGuard, ConnectionId, Signal};
