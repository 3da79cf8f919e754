//! Error types for the networking module.
//!
//! Native socket failures that carry a recognizable OS error code are
//! translated into an [`Errno`] value (numeric code, symbolic name,
//! message) and wrapped in the matching [`NetError`] variant. Failures
//! without a recognizable code are never reshaped: they pass through
//! unchanged behind [`NetError::Native`].
//!
//! Every successful translation also records the symbolic code in a
//! process-wide last-error slot, readable via [`last_errno`]. The slot is
//! overwritten on every translated failure (last write wins) and exists
//! purely for diagnostics; nothing in this crate reads it for control
//! flow.

use std::fmt;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

/// A translated native error: numeric errno, symbolic code, message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Errno {
    /// The numeric OS error code.
    pub errno: i32,
    /// The symbolic errno name, e.g. `"EADDRINUSE"`.
    pub code: &'static str,
    /// Human-readable description from the OS.
    pub message: String,
}

impl Errno {
    /// Translate a native I/O error into an `Errno`.
    ///
    /// Returns `None` when the error carries no OS error code, or a code
    /// outside the recognized table; such errors must propagate to the
    /// caller unchanged. On success the symbolic code is recorded in the
    /// process-wide last-error slot.
    pub fn translate(err: &io::Error) -> Option<Errno> {
        let errno = err.raw_os_error()?;
        let code = errno_name(errno)?;
        set_last_errno(code);
        Some(Errno {
            errno,
            code,
            message: err.to_string(),
        })
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.errno, self.message)
    }
}

/// Symbolic names for the OS error codes surfaced by UDP socket calls.
fn errno_name(errno: i32) -> Option<&'static str> {
    let name = match errno {
        libc::EACCES => "EACCES",
        libc::EADDRINUSE => "EADDRINUSE",
        libc::EADDRNOTAVAIL => "EADDRNOTAVAIL",
        libc::EAFNOSUPPORT => "EAFNOSUPPORT",
        libc::EAGAIN => "EAGAIN",
        libc::EBADF => "EBADF",
        libc::ECONNREFUSED => "ECONNREFUSED",
        libc::ECONNRESET => "ECONNRESET",
        libc::EHOSTUNREACH => "EHOSTUNREACH",
        libc::EINTR => "EINTR",
        libc::EINVAL => "EINVAL",
        libc::EISCONN => "EISCONN",
        libc::EMSGSIZE => "EMSGSIZE",
        libc::ENETDOWN => "ENETDOWN",
        libc::ENETUNREACH => "ENETUNREACH",
        libc::ENOBUFS => "ENOBUFS",
        libc::ENOTCONN => "ENOTCONN",
        libc::ENOTSOCK => "ENOTSOCK",
        libc::EPERM => "EPERM",
        libc::EPIPE => "EPIPE",
        libc::ETIMEDOUT => "ETIMEDOUT",
        _ => return None,
    };
    Some(name)
}

static LAST_ERRNO: Mutex<Option<&'static str>> = Mutex::new(None);

/// The symbolic code of the most recent translated native failure.
///
/// Overwritten on every translated failure anywhere in the process;
/// diagnostic only.
pub fn last_errno() -> Option<&'static str> {
    *LAST_ERRNO.lock()
}

fn set_last_errno(code: &'static str) {
    *LAST_ERRNO.lock() = Some(code);
}

/// Network-specific errors.
#[derive(Error, Debug, Clone)]
pub enum NetError {
    /// Binding the socket failed.
    #[error("bind failed: {0}")]
    Bind(Errno),
    /// A datagram send failed.
    #[error("send failed: {0}")]
    Send(Errno),
    /// A datagram receive failed.
    #[error("receive failed: {0}")]
    Recv(Errno),
    /// A socket configuration call failed.
    #[error("socket configuration failed: {0}")]
    Config(Errno),
    /// The handle has been closed; no further operations are valid.
    #[error("handle is closed")]
    Closed,
    /// The operation requires a bound socket.
    #[error("socket is not bound")]
    NotBound,
    /// The socket is already bound; bind is a once-only operation.
    #[error("socket is already bound")]
    AlreadyBound,
    /// The requested byte range does not fit in the supplied buffer.
    #[error("range {offset}+{length} exceeds buffer of {available} bytes")]
    InvalidRange {
        /// Start offset into the buffer.
        offset: usize,
        /// Number of bytes requested.
        length: usize,
        /// Total bytes available in the buffer.
        available: usize,
    },
    /// Handle creation was denied by the process-wide policy gate.
    #[error("handle creation denied")]
    HandleCreationDenied,
    /// A native failure with no recognizable error code, passed through
    /// unchanged.
    #[error("native error: {0}")]
    Native(Arc<io::Error>),
}

impl NetError {
    pub(crate) fn bind(err: io::Error) -> Self {
        match Errno::translate(&err) {
            Some(e) => Self::Bind(e),
            None => Self::Native(Arc::new(err)),
        }
    }

    pub(crate) fn send(err: io::Error) -> Self {
        match Errno::translate(&err) {
            Some(e) => Self::Send(e),
            None => Self::Native(Arc::new(err)),
        }
    }

    pub(crate) fn recv(err: io::Error) -> Self {
        match Errno::translate(&err) {
            Some(e) => Self::Recv(e),
            None => Self::Native(Arc::new(err)),
        }
    }

    pub(crate) fn config(err: io::Error) -> Self {
        match Errno::translate(&err) {
            Some(e) => Self::Config(e),
            None => Self::Native(Arc::new(err)),
        }
    }
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetError>;

#[cfg(test)]
mod tests {
    use super::*;

    // Serializes tests that write the process-wide last-error slot.
    static SLOT_GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn test_translate_known_errno() {
        let _guard = SLOT_GUARD.lock();
        let err = io::Error::from_raw_os_error(libc::EADDRINUSE);
        let errno = Errno::translate(&err).expect("EADDRINUSE should translate");
        assert_eq!(errno.errno, libc::EADDRINUSE);
        assert_eq!(errno.code, "EADDRINUSE");
        assert!(!errno.message.is_empty());
    }

    #[test]
    fn test_translate_unknown_code_fails() {
        // Not a plausible errno on any supported platform.
        let err = io::Error::from_raw_os_error(999_999);
        assert!(Errno::translate(&err).is_none());
    }

    #[test]
    fn test_translate_without_os_code_fails() {
        let err = io::Error::other("synthetic failure");
        assert!(Errno::translate(&err).is_none());
    }

    #[test]
    fn test_untranslatable_becomes_native_passthrough() {
        let err = NetError::config(io::Error::other("synthetic failure"));
        match err {
            NetError::Native(inner) => {
                assert_eq!(inner.to_string(), "synthetic failure");
            }
            other => panic!("expected Native passthrough, got {other:?}"),
        }
    }

    #[test]
    fn test_wrapped_variants_keep_errno() {
        let _guard = SLOT_GUARD.lock();
        let err = NetError::send(io::Error::from_raw_os_error(libc::EMSGSIZE));
        match err {
            NetError::Send(errno) => assert_eq!(errno.code, "EMSGSIZE"),
            other => panic!("expected Send, got {other:?}"),
        }
    }

    #[test]
    fn test_last_errno_overwrite() {
        let _guard = SLOT_GUARD.lock();
        let _ = Errno::translate(&io::Error::from_raw_os_error(libc::EACCES));
        assert_eq!(last_errno(), Some("EACCES"));
        let _ = Errno::translate(&io::Error::from_raw_os_error(libc::EPERM));
        assert_eq!(last_errno(), Some("EPERM"));
        // Failed translations leave the slot untouched.
        let _ = Errno::translate(&io::Error::other("no code"));
        assert_eq!(last_errno(), Some("EPERM"));
    }
}
