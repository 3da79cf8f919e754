//! UDP handle with signal-based event delivery.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use nimbus_core::Signal;
use nimbus_core::logging::targets;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use super::config::{Datagram, UdpConfig};
use super::queue::{SendStatus, WriteQueue, WriteRequest};
use super::state::HandleState;
use crate::error::{NetError, Result};

/// Discriminator for the single membership primitive: multicast groups are
/// joined and left through the same underlying call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Membership {
    /// Join the group.
    Join,
    /// Leave the group.
    Leave,
}

static HANDLE_CREATION_ALLOWED: AtomicBool = AtomicBool::new(true);

/// Process-wide authorization gate for handle creation.
///
/// Consulted exactly once per [`UdpHandle`] construction; when disabled,
/// construction fails with [`NetError::HandleCreationDenied`]. Existing
/// handles are unaffected.
pub fn set_handle_creation_allowed(allowed: bool) {
    HANDLE_CREATION_ALLOWED.store(allowed, Ordering::SeqCst);
}

/// Command sent to the handle's driver task.
enum Command {
    Send(Arc<WriteRequest>),
    RecvStart,
    RecvStop,
    Close,
}

/// State shared between the public handle and its driver task.
struct Shared {
    state: Mutex<HandleState>,
    socket: Mutex<Option<Arc<UdpSocket>>>,
    command_tx: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    queue: WriteQueue,
    /// Serializes queue push + command dispatch so submission order and
    /// completion order cannot diverge across caller threads.
    submit_lock: Mutex<()>,
    closing: AtomicBool,
    referenced: AtomicBool,

    datagram_received: Signal<Datagram>,
    datagram_sent: Signal<usize>,
    error: Signal<NetError>,
    closed: Signal<()>,
    send_queue_high: Signal<usize>,
}

/// An asynchronous UDP socket handle.
///
/// The handle owns at most one native socket. `bind` allocates the socket
/// and spawns a driver task on the ambient tokio runtime; the driver owns
/// all socket I/O and is the single dispatch context for every signal
/// emission and completion callback, so subscribers observe events
/// sequentially.
///
/// Sends are pipelined: [`send_to`](Self::send_to) enqueues a
/// [`WriteRequest`] and returns immediately; the completion callback fires
/// later, in strict submission order. Reception is armed and disarmed with
/// [`recv_start`](Self::recv_start) / [`recv_stop`](Self::recv_stop).
///
/// # Signals
///
/// - [`datagram_received`](Self::datagram_received): one emission per
///   arrived datagram while reception is armed
/// - [`datagram_sent`](Self::datagram_sent): emitted after each successful
///   send, with the bytes written
/// - [`error`](Self::error): asynchronous failures (send, receive, bind-time
///   option application)
/// - [`closed`](Self::closed): emitted once when the handle finishes closing
/// - [`send_queue_high`](Self::send_queue_high): advisory watermark, see
///   [`UdpConfig::send_queue_watermark`]
///
/// # Example
///
/// ```ignore
/// let handle = UdpHandle::new()?;
/// handle.bind("0.0.0.0:0".parse().unwrap()).await?;
///
/// handle.datagram_received().connect(|datagram| {
///     println!("{} bytes from {}", datagram.len(), datagram.source);
/// });
/// handle.recv_start()?;
///
/// let request = handle.send_to(Bytes::from_static(b"hello"), 0, 5, peer)?;
/// request.on_complete(|status, _request| {
///     println!("send finished: {}", status.is_sent());
/// });
/// ```
pub struct UdpHandle {
    config: UdpConfig,
    shared: Arc<Shared>,
}

impl UdpHandle {
    /// Create a new handle with default configuration.
    ///
    /// Fails with [`NetError::HandleCreationDenied`] when the process-wide
    /// creation gate is disabled. No native resources are allocated until
    /// [`bind`](Self::bind).
    pub fn new() -> Result<Self> {
        Self::with_config(UdpConfig::default())
    }

    /// Create a new handle with the given configuration.
    pub fn with_config(config: UdpConfig) -> Result<Self> {
        if !HANDLE_CREATION_ALLOWED.load(Ordering::SeqCst) {
            return Err(NetError::HandleCreationDenied);
        }
        Ok(Self {
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(HandleState::Unbound),
                socket: Mutex::new(None),
                command_tx: Mutex::new(None),
                queue: WriteQueue::new(),
                submit_lock: Mutex::new(()),
                closing: AtomicBool::new(false),
                referenced: AtomicBool::new(true),
                datagram_received: Signal::new(),
                datagram_sent: Signal::new(),
                error: Signal::new(),
                closed: Signal::new(),
                send_queue_high: Signal::new(),
            }),
        })
    }

    /// Current handle state.
    pub fn state(&self) -> HandleState {
        *self.shared.state.lock()
    }

    /// Whether the handle is bound and its driver task is running.
    pub fn is_bound(&self) -> bool {
        self.state() == HandleState::Bound
    }

    /// Whether the handle has been closed.
    pub fn is_closed(&self) -> bool {
        self.state() == HandleState::Closed
    }

    /// Signal emitted once per received datagram while reception is armed.
    pub fn datagram_received(&self) -> &Signal<Datagram> {
        &self.shared.datagram_received
    }

    /// Signal emitted after each successful send with the bytes written.
    pub fn datagram_sent(&self) -> &Signal<usize> {
        &self.shared.datagram_sent
    }

    /// Signal emitted on asynchronous failures.
    pub fn error(&self) -> &Signal<NetError> {
        &self.shared.error
    }

    /// Signal emitted once when the handle finishes closing.
    pub fn closed(&self) -> &Signal<()> {
        &self.shared.closed
    }

    /// Advisory signal emitted when the write queue reaches the configured
    /// watermark depth.
    pub fn send_queue_high(&self) -> &Signal<usize> {
        &self.shared.send_queue_high
    }

    /// Number of submitted sends whose completions have not yet been
    /// dispatched.
    pub fn pending_sends(&self) -> usize {
        self.shared.queue.len()
    }

    /// Bind the socket to `addr` and start the driver task.
    ///
    /// The address family selects the four- or six-family code path in the
    /// native layer; both bind the same logical handle. Binding twice
    /// fails with [`NetError::AlreadyBound`]; binding a closed handle
    /// fails with [`NetError::Closed`]. Configured socket options are
    /// applied after the bind succeeds — option failures emit the `error`
    /// signal without failing the bind.
    pub async fn bind(&self, addr: SocketAddr) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            match *state {
                HandleState::Unbound => {}
                HandleState::Closing | HandleState::Closed => return Err(NetError::Closed),
                _ => return Err(NetError::AlreadyBound),
            }
            *state = HandleState::Binding;
        }

        let socket = match UdpSocket::bind(addr).await {
            Ok(socket) => Arc::new(socket),
            Err(e) => {
                *self.shared.state.lock() = HandleState::Unbound;
                return Err(NetError::bind(e));
            }
        };

        // A close may have raced the native bind.
        if self.shared.closing.load(Ordering::SeqCst) {
            *self.shared.state.lock() = HandleState::Closed;
            return Err(NetError::Closed);
        }

        self.apply_options(&socket);

        let local = socket.local_addr().map_err(NetError::bind)?;
        tracing::debug!(target: targets::UDP, %local, "socket bound");

        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.socket.lock() = Some(socket.clone());
        *self.shared.command_tx.lock() = Some(tx);
        *self.shared.state.lock() = HandleState::Bound;

        tokio::spawn(drive(
            self.shared.clone(),
            socket,
            rx,
            self.config.recv_buffer_size,
        ));
        Ok(())
    }

    /// Apply configured socket options; failures are reported through the
    /// `error` signal and leave the socket bound.
    fn apply_options(&self, socket: &UdpSocket) {
        if self.config.broadcast
            && let Err(e) = socket.set_broadcast(true)
        {
            self.shared.error.emit(NetError::config(e));
        }

        if self.config.multicast.ttl > 0
            && let Err(e) = socket.set_multicast_ttl_v4(self.config.multicast.ttl)
        {
            self.shared.error.emit(NetError::config(e));
        }

        if let Err(e) = socket.set_multicast_loop_v4(self.config.multicast.loopback) {
            self.shared.error.emit(NetError::config(e));
        }

        for (group, interface) in &self.config.multicast.groups {
            let iface = interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
            if let Err(e) = socket.join_multicast_v4(*group, iface) {
                self.shared.error.emit(NetError::config(e));
            }
        }
    }

    /// Stage a datagram for sending and return its write request.
    ///
    /// The `offset`/`length` range of `buffer` is sent to `target`; the
    /// range must lie within the buffer. The request is appended to the
    /// write queue before the send is dispatched, so its completion —
    /// even an immediate one — always resolves against the right entry.
    /// Attach the completion callback on the returned request.
    pub fn send_to(
        &self,
        buffer: Bytes,
        offset: usize,
        length: usize,
        target: SocketAddr,
    ) -> Result<Arc<WriteRequest>> {
        let available = buffer.len();
        let in_range = offset
            .checked_add(length)
            .is_some_and(|end| end <= available);
        if !in_range {
            return Err(NetError::InvalidRange {
                offset,
                length,
                available,
            });
        }

        let tx = self.command_sender()?;
        let request = WriteRequest::new(buffer, offset, length, target);

        let depth = {
            let _submit = self.shared.submit_lock.lock();
            let depth = self.shared.queue.push(request.clone());
            if tx.send(Command::Send(request.clone())).is_err() {
                // Driver already gone; roll back the enqueue.
                self.shared.queue.pop_back();
                return Err(NetError::Closed);
            }
            depth
        };

        if let Some(watermark) = self.config.send_queue_watermark
            && depth == watermark
        {
            self.shared.send_queue_high.emit(depth);
        }

        Ok(request)
    }

    /// Arm datagram reception.
    ///
    /// Every datagram arriving from now on yields exactly one
    /// `datagram_received` emission, until [`recv_stop`](Self::recv_stop)
    /// or [`close`](Self::close). Arming an already-armed handle is
    /// harmless.
    pub fn recv_start(&self) -> Result<()> {
        let tx = self.command_sender()?;
        let _ = tx.send(Command::RecvStart);
        Ok(())
    }

    /// Disarm datagram reception.
    ///
    /// Affects future deliveries only; not an error to call when
    /// reception is already stopped or the handle was never bound.
    pub fn recv_stop(&self) -> Result<()> {
        if self.shared.closing.load(Ordering::SeqCst) || self.is_closed() {
            return Err(NetError::Closed);
        }
        if let Some(tx) = self.shared.command_tx.lock().as_ref() {
            let _ = tx.send(Command::RecvStop);
        }
        Ok(())
    }

    /// Local endpoint the socket is bound to, queried from the OS.
    ///
    /// Fails with [`NetError::NotBound`] before bind and
    /// [`NetError::Closed`] afterward.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.bound_socket()?.local_addr().map_err(NetError::config)
    }

    /// Set the unicast TTL.
    pub fn set_ttl(&self, ttl: u32) -> Result<()> {
        self.bound_socket()?.set_ttl(ttl).map_err(NetError::config)
    }

    /// Set the multicast TTL.
    pub fn set_multicast_ttl(&self, ttl: u32) -> Result<()> {
        self.bound_socket()?
            .set_multicast_ttl_v4(ttl)
            .map_err(NetError::config)
    }

    /// Enable or disable looping sent multicast datagrams back to the
    /// local socket.
    pub fn set_multicast_loopback(&self, enabled: bool) -> Result<()> {
        self.bound_socket()?
            .set_multicast_loop_v4(enabled)
            .map_err(NetError::config)
    }

    /// Enable or disable broadcast mode.
    pub fn set_broadcast(&self, enabled: bool) -> Result<()> {
        self.bound_socket()?
            .set_broadcast(enabled)
            .map_err(NetError::config)
    }

    /// Join or leave an IPv4 multicast group on the given interface
    /// (`None` = INADDR_ANY).
    pub fn set_membership_v4(
        &self,
        group: Ipv4Addr,
        interface: Option<Ipv4Addr>,
        membership: Membership,
    ) -> Result<()> {
        let socket = self.bound_socket()?;
        let iface = interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
        match membership {
            Membership::Join => socket.join_multicast_v4(group, iface),
            Membership::Leave => socket.leave_multicast_v4(group, iface),
        }
        .map_err(NetError::config)
    }

    /// Join an IPv4 multicast group.
    pub fn add_membership_v4(&self, group: Ipv4Addr, interface: Option<Ipv4Addr>) -> Result<()> {
        self.set_membership_v4(group, interface, Membership::Join)
    }

    /// Leave an IPv4 multicast group.
    pub fn drop_membership_v4(&self, group: Ipv4Addr, interface: Option<Ipv4Addr>) -> Result<()> {
        self.set_membership_v4(group, interface, Membership::Leave)
    }

    /// Join or leave an IPv6 multicast group on the given interface index
    /// (0 = any).
    pub fn set_membership_v6(
        &self,
        group: Ipv6Addr,
        interface: u32,
        membership: Membership,
    ) -> Result<()> {
        let socket = self.bound_socket()?;
        match membership {
            Membership::Join => socket.join_multicast_v6(&group, interface),
            Membership::Leave => socket.leave_multicast_v6(&group, interface),
        }
        .map_err(NetError::config)
    }

    /// Join an IPv6 multicast group.
    pub fn add_membership_v6(&self, group: Ipv6Addr, interface: u32) -> Result<()> {
        self.set_membership_v6(group, interface, Membership::Join)
    }

    /// Leave an IPv6 multicast group.
    pub fn drop_membership_v6(&self, group: Ipv6Addr, interface: u32) -> Result<()> {
        self.set_membership_v6(group, interface, Membership::Leave)
    }

    /// Mark the handle as keeping the owning loop alive. Advisory
    /// bookkeeping only; performs no I/O.
    pub fn r#ref(&self) {
        self.shared.referenced.store(true, Ordering::SeqCst);
    }

    /// Mark the handle as not keeping the owning loop alive on its own.
    pub fn unref(&self) {
        self.shared.referenced.store(false, Ordering::SeqCst);
    }

    /// Whether the handle currently keeps the owning loop alive.
    pub fn is_referenced(&self) -> bool {
        self.shared.referenced.load(Ordering::SeqCst)
    }

    /// Close the handle.
    ///
    /// Terminal and idempotent: the first call releases the socket and
    /// emits `closed`; later calls are silent no-ops. Write requests still
    /// queued at close are dropped without their callbacks ever firing,
    /// and every subsequent operation fails with [`NetError::Closed`].
    pub fn close(&self) {
        if self.shared.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        let tx = self.shared.command_tx.lock().take();
        match tx {
            Some(tx) => {
                *self.shared.state.lock() = HandleState::Closing;
                let _ = tx.send(Command::Close);
            }
            None => {
                // Never bound: nothing to tear down asynchronously.
                *self.shared.socket.lock() = None;
                *self.shared.state.lock() = HandleState::Closed;
                self.shared.closed.emit(());
            }
        }
    }

    fn command_sender(&self) -> Result<mpsc::UnboundedSender<Command>> {
        if self.shared.closing.load(Ordering::SeqCst) {
            return Err(NetError::Closed);
        }
        match *self.shared.state.lock() {
            HandleState::Closing | HandleState::Closed => return Err(NetError::Closed),
            _ => {}
        }
        self.shared
            .command_tx
            .lock()
            .as_ref()
            .cloned()
            .ok_or(NetError::NotBound)
    }

    fn bound_socket(&self) -> Result<Arc<UdpSocket>> {
        if self.shared.closing.load(Ordering::SeqCst) {
            return Err(NetError::Closed);
        }
        match *self.shared.state.lock() {
            HandleState::Closing | HandleState::Closed => return Err(NetError::Closed),
            _ => {}
        }
        self.shared.socket.lock().clone().ok_or(NetError::NotBound)
    }
}

impl std::fmt::Debug for UdpHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpHandle")
            .field("state", &self.state())
            .field("pending_sends", &self.pending_sends())
            .field("referenced", &self.is_referenced())
            .finish()
    }
}

/// Driver task: owns the socket, processes commands in submission order,
/// and delivers received datagrams while reception is armed. All signal
/// emissions and completion callbacks run here, sequentially.
async fn drive(
    shared: Arc<Shared>,
    socket: Arc<UdpSocket>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    recv_buffer_size: usize,
) {
    let mut buf = vec![0u8; recv_buffer_size];
    let mut recv_armed = false;

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Send(request)) => {
                    if shared.closing.load(Ordering::SeqCst) {
                        // Close raced ahead of this submission; the
                        // request stays undelivered by contract.
                        continue;
                    }
                    dispatch_send(&shared, &socket, request).await;
                }
                Some(Command::RecvStart) => recv_armed = true,
                Some(Command::RecvStop) => recv_armed = false,
                Some(Command::Close) | None => break,
            },
            result = socket.recv_from(&mut buf), if recv_armed => match result {
                Ok((n, source)) => {
                    tracing::trace!(target: targets::UDP, bytes = n, %source, "datagram received");
                    let datagram = Datagram::new(Bytes::copy_from_slice(&buf[..n]), source);
                    shared.datagram_received.emit(datagram);
                }
                Err(e) => {
                    shared.error.emit(NetError::recv(e));
                }
            },
        }
    }

    *shared.command_tx.lock() = None;
    shared.queue.clear();
    *shared.socket.lock() = None;
    *shared.state.lock() = HandleState::Closed;
    tracing::debug!(target: targets::UDP, "socket closed");
    shared.closed.emit(());
}

/// Issue one native send and resolve its completion against the write
/// queue head.
async fn dispatch_send(shared: &Shared, socket: &UdpSocket, request: Arc<WriteRequest>) {
    let status = match socket.send_to(request.payload(), request.target()).await {
        Ok(n) => SendStatus::Sent(n),
        Err(e) => {
            // Translation records the symbolic code in the process-wide
            // last-error slot.
            let err = NetError::send(e);
            shared.error.emit(err.clone());
            SendStatus::Failed(err)
        }
    };

    // FIFO matching rule: a completion always resolves the current head.
    match shared.queue.pop() {
        Some(head) => {
            if !Arc::ptr_eq(&head, &request) {
                tracing::warn!(
                    target: targets::UDP,
                    "completion did not match the dispatched request; resolving queue head"
                );
            }
            if let SendStatus::Sent(n) = status {
                shared.datagram_sent.emit(n);
            }
            head.complete(status);
        }
        None => {
            // Benign race: a completion observed with an empty queue is
            // dropped silently.
            tracing::trace!(target: targets::UDP, "completion with empty write queue, dropping");
        }
    }
}
