//! Networking module for Nimbus.
//!
//! This crate provides an asynchronous UDP socket handle built on tokio,
//! with signal-based event delivery via `nimbus-core`:
//!
//! ```ignore
//! use bytes::Bytes;
//! use nimbus_net::udp::UdpHandle;
//!
//! let handle = UdpHandle::new()?;
//! handle.bind("0.0.0.0:0".parse().unwrap()).await?;
//! let local = handle.local_addr()?;
//!
//! handle.datagram_received().connect(|datagram| {
//!     println!("{} bytes from {}", datagram.len(), datagram.source);
//! });
//! handle.recv_start()?;
//! ```
//!
//! Native socket failures carrying a recognizable OS error code surface as
//! translated [`NetError`] variants with an [`Errno`] payload; the most
//! recent symbolic code is also mirrored into a process-wide diagnostic
//! slot readable via [`last_errno`]. Failures without a recognizable code
//! pass through unchanged as [`NetError::Native`].

mod error;
pub mod udp;

pub use error::{Errno, NetError, Result, last_errno};

// Re-export commonly used types at the crate root
pub use udp::{
    Datagram, HandleState, Membership, MulticastConfig, SendStatus, UdpConfig, UdpHandle,
    WriteRequest,
};
