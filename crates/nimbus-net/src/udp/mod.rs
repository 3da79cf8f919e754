//! UDP handle with signal-based event delivery.
//!
//! This module provides a single logical UDP socket handle driven by the
//! ambient tokio runtime:
//!
//! - **UdpHandle**: bind, multicast/broadcast configuration, pipelined
//!   send/receive
//! - **WriteRequest**: one in-flight send with an optional completion
//!   callback, resolved in strict submission order
//!
//! # Example
//!
//! ```ignore
//! use bytes::Bytes;
//! use nimbus_net::udp::UdpHandle;
//!
//! let handle = UdpHandle::new()?;
//! handle.bind("0.0.0.0:0".parse().unwrap()).await?;
//!
//! handle.datagram_received().connect(|datagram| {
//!     println!("{} bytes from {}", datagram.len(), datagram.source);
//! });
//! handle.recv_start()?;
//!
//! let peer = "127.0.0.1:9000".parse().unwrap();
//! let request = handle.send_to(Bytes::from_static(b"hello"), 0, 5, peer)?;
//! request.on_complete(|status, _request| {
//!     assert!(status.is_sent());
//! });
//! ```
//!
//! # Multicast Example
//!
//! ```ignore
//! use std::net::Ipv4Addr;
//! use nimbus_net::udp::{MulticastConfig, UdpConfig, UdpHandle};
//!
//! let group: Ipv4Addr = "239.255.0.1".parse().unwrap();
//! let config = UdpConfig::new()
//!     .multicast_config(MulticastConfig::new().loopback(true).ttl(1));
//!
//! let handle = UdpHandle::with_config(config)?;
//! handle.bind("0.0.0.0:5000".parse().unwrap()).await?;
//! handle.add_membership_v4(group, None)?;
//! // ... later:
//! handle.drop_membership_v4(group, None)?;
//! ```

mod config;
mod handle;
mod queue;
mod state;

pub use config::{Datagram, MulticastConfig, UdpConfig};
pub use handle::{Membership, UdpHandle, set_handle_creation_allowed};
pub use queue::{SendStatus, WriteRequest};
pub use state::HandleState;
