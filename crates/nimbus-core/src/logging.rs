//! Logging facilities for Nimbus.
//!
//! Nimbus instruments its subsystems with the `tracing` crate. To see logs,
//! install a subscriber in the host application:
//!
//! ```ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! The constants in [`targets`] can be used with `tracing` filter
//! directives to enable or silence individual subsystems, e.g.
//! `RUST_LOG=nimbus_net::udp=trace`.

/// Target names for log filtering.
pub mod targets {
    /// Core primitives target.
    pub const CORE: &str = "nimbus_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "nimbus_core::signal";
    /// Networking target.
    pub const NET: &str = "nimbus_net";
    /// UDP handle target.
    pub const UDP: &str = "nimbus_net::udp";
}
