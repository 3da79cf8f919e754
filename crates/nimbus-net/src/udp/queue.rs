//! In-flight write requests and the FIFO send queue.
//!
//! Every submitted send enqueues a [`WriteRequest`] at the queue tail
//! before the datagram is handed to the socket; each completion resolves
//! exactly one request from the head. Completions therefore map to
//! requests in strict submission order, which is the contract the driver
//! task upholds by processing send commands one at a time.

use std::collections::VecDeque;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::NetError;

/// Outcome of one submitted send, delivered to the request's completion
/// callback.
#[derive(Debug)]
pub enum SendStatus {
    /// The datagram was handed to the OS; contains the bytes written.
    Sent(usize),
    /// The send failed with the contained error.
    Failed(NetError),
}

impl SendStatus {
    /// Whether the send succeeded.
    pub fn is_sent(&self) -> bool {
        matches!(self, SendStatus::Sent(_))
    }
}

type CompletionFn = Box<dyn FnOnce(SendStatus, &WriteRequest) + Send>;

/// One in-flight send: the staged buffer range, its destination, and an
/// optional completion callback.
///
/// The request shares ownership of the buffer with the caller until the
/// callback fires; the payload bytes are never copied or mutated.
pub struct WriteRequest {
    buffer: Bytes,
    offset: usize,
    length: usize,
    target: SocketAddr,
    completion: Mutex<Option<CompletionFn>>,
}

impl WriteRequest {
    pub(crate) fn new(buffer: Bytes, offset: usize, length: usize, target: SocketAddr) -> Arc<Self> {
        Arc::new(Self {
            buffer,
            offset,
            length,
            target,
            completion: Mutex::new(None),
        })
    }

    /// The original buffer the caller staged.
    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    /// Start offset of the payload within the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Payload length in bytes.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Destination address.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Attach the completion callback, replacing any previous one.
    ///
    /// The callback fires at most once, on the handle's dispatch context,
    /// when the completion for this request arrives. Attaching after the
    /// completion has already been consumed has no effect.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(SendStatus, &WriteRequest) + Send + 'static,
    {
        *self.completion.lock() = Some(Box::new(callback));
    }

    /// The byte range actually sent.
    pub(crate) fn payload(&self) -> &[u8] {
        &self.buffer[self.offset..self.offset + self.length]
    }

    /// Consume and invoke the completion callback, if one is attached.
    pub(crate) fn complete(self: &Arc<Self>, status: SendStatus) {
        let callback = self.completion.lock().take();
        if let Some(callback) = callback {
            callback(status, self);
        }
    }
}

impl fmt::Debug for WriteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteRequest")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("target", &self.target)
            .field("has_callback", &self.completion.lock().is_some())
            .finish()
    }
}

/// Strictly-FIFO queue of in-flight write requests.
///
/// Mutated from two places only: submission pushes at the tail, the
/// driver's completion dispatch pops from the head. The internal mutex
/// makes the push-then-dispatch sequence atomic for callers on any
/// thread.
#[derive(Default)]
pub(crate) struct WriteQueue {
    entries: Mutex<VecDeque<Arc<WriteRequest>>>,
}

impl WriteQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a request at the tail; returns the new queue depth.
    pub(crate) fn push(&self, request: Arc<WriteRequest>) -> usize {
        let mut entries = self.entries.lock();
        entries.push_back(request);
        entries.len()
    }

    /// Remove and return the request at the head.
    pub(crate) fn pop(&self) -> Option<Arc<WriteRequest>> {
        self.entries.lock().pop_front()
    }

    /// Roll back the most recent push. Only used when dispatch fails
    /// right after the enqueue, under the same submission lock.
    pub(crate) fn pop_back(&self) -> Option<Arc<WriteRequest>> {
        self.entries.lock().pop_back()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Drop all queued requests without firing their callbacks. Used on
    /// close: outstanding completions are deliberately left undelivered.
    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(tag: u8) -> Arc<WriteRequest> {
        WriteRequest::new(
            Bytes::copy_from_slice(&[tag]),
            0,
            1,
            "127.0.0.1:1".parse().unwrap(),
        )
    }

    #[test]
    fn test_fifo_order() {
        let queue = WriteQueue::new();
        for tag in 0..4u8 {
            queue.push(request(tag));
        }
        assert_eq!(queue.len(), 4);
        for tag in 0..4u8 {
            let head = queue.pop().expect("queue should not be empty");
            assert_eq!(head.buffer()[0], tag);
        }
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_push_reports_depth() {
        let queue = WriteQueue::new();
        assert_eq!(queue.push(request(0)), 1);
        assert_eq!(queue.push(request(1)), 2);
        queue.pop();
        assert_eq!(queue.push(request(2)), 2);
    }

    #[test]
    fn test_completion_fires_once() {
        let req = request(0);
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_clone = fired.clone();
        req.on_complete(move |status, request| {
            assert!(status.is_sent());
            assert_eq!(request.length(), 1);
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        req.complete(SendStatus::Sent(1));
        // Second completion finds the callback already consumed.
        req.complete(SendStatus::Sent(1));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_request_without_callback_completes_silently() {
        let req = request(0);
        req.complete(SendStatus::Sent(1));
    }

    #[test]
    fn test_clear_drops_without_firing() {
        let queue = WriteQueue::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for tag in 0..3u8 {
            let req = request(tag);
            let fired_clone = fired.clone();
            req.on_complete(move |_, _| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            });
            queue.push(req);
        }

        queue.clear();
        assert_eq!(queue.len(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_payload_respects_range() {
        let req = WriteRequest::new(
            Bytes::from_static(b"abcdef"),
            2,
            3,
            "127.0.0.1:1".parse().unwrap(),
        );
        assert_eq!(req.payload(), b"cde");
    }
}
