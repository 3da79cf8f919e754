//! Core systems for Nimbus.
//!
//! This crate provides the signal/slot primitive used for all event
//! delivery in Nimbus, plus shared logging targets:
//!
//! - [`Signal`] - Type-safe multi-subscriber notifications
//! - [`ConnectionId`] - Handle for disconnecting a subscriber
//! - [`ScopedConnection`] - RAII connection that disconnects on drop
//! - [`logging`] - `tracing` target constants for log filtering
//!
//! # Example
//!
//! ```
//! use nimbus_core::Signal;
//!
//! let changed = Signal::<String>::new();
//! changed.connect(|text| println!("changed to {text}"));
//! changed.emit("hello".to_string());
//! ```

pub mod logging;
mod signal;

pub use signal::{ConnectionId, ScopedConnection, Signal};
