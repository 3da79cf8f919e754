//! Configuration types for UDP handles.

use std::net::{Ipv4Addr, SocketAddr};

use bytes::Bytes;

/// Configuration for a UDP handle.
#[derive(Clone, Debug)]
pub struct UdpConfig {
    /// Enable broadcast mode on bind.
    pub broadcast: bool,
    /// Receive buffer size in bytes.
    pub recv_buffer_size: usize,
    /// Multicast options applied on bind.
    pub multicast: MulticastConfig,
    /// Optional write-queue depth at which the handle emits its
    /// `send_queue_high` signal. Advisory only: the queue itself is
    /// unbounded and never drops or blocks.
    pub send_queue_watermark: Option<usize>,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            broadcast: false,
            recv_buffer_size: 65535,
            multicast: MulticastConfig::default(),
            send_queue_watermark: None,
        }
    }
}

impl UdpConfig {
    /// Create a configuration with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable broadcast mode.
    pub fn broadcast(mut self, enabled: bool) -> Self {
        self.broadcast = enabled;
        self
    }

    /// Set the receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Set multicast options.
    pub fn multicast_config(mut self, config: MulticastConfig) -> Self {
        self.multicast = config;
        self
    }

    /// Arm the advisory write-queue watermark signal.
    pub fn send_queue_watermark(mut self, depth: usize) -> Self {
        self.send_queue_watermark = Some(depth);
        self
    }
}

/// Multicast options applied when the handle binds.
#[derive(Clone, Debug, Default)]
pub struct MulticastConfig {
    /// Groups to join on bind. Each entry is (group, interface).
    /// A `None` interface means INADDR_ANY.
    pub groups: Vec<(Ipv4Addr, Option<Ipv4Addr>)>,
    /// Whether to loop sent multicast datagrams back to the local socket.
    pub loopback: bool,
    /// TTL for multicast packets; 0 leaves the OS default in place.
    pub ttl: u32,
}

impl MulticastConfig {
    /// Create a new empty multicast configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a multicast group to join on bind.
    pub fn join_group(mut self, group: Ipv4Addr) -> Self {
        self.groups.push((group, None));
        self
    }

    /// Add a multicast group with a specific interface.
    pub fn join_group_on(mut self, group: Ipv4Addr, interface: Ipv4Addr) -> Self {
        self.groups.push((group, Some(interface)));
        self
    }

    /// Enable or disable multicast loopback.
    pub fn loopback(mut self, enabled: bool) -> Self {
        self.loopback = enabled;
        self
    }

    /// Set the multicast TTL.
    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }
}

/// A received datagram with its source address.
///
/// Produced once per arrived datagram while reception is armed and handed
/// to `datagram_received` subscribers; the handle does not retain it.
#[derive(Clone, Debug)]
pub struct Datagram {
    /// The datagram payload, exactly as received.
    pub data: Bytes,
    /// The sender's address.
    pub source: SocketAddr,
}

impl Datagram {
    /// Create a new datagram.
    pub fn new(data: Bytes, source: SocketAddr) -> Self {
        Self { data, source }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty (a zero-length datagram).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
