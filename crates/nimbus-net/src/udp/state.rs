//! State enumeration for UDP handles.

/// State of a UDP handle.
///
/// `Closed` is terminal: once a handle reaches it, no further operation
/// succeeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HandleState {
    /// Handle exists but owns no bound socket yet.
    #[default]
    Unbound,
    /// Bind is in progress.
    Binding,
    /// Socket is bound and the driver task is running.
    Bound,
    /// Close has been requested; the driver task is shutting down.
    Closing,
    /// Socket is closed.
    Closed,
}

impl std::fmt::Display for HandleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandleState::Unbound => write!(f, "Unbound"),
            HandleState::Binding => write!(f, "Binding"),
            HandleState::Bound => write!(f, "Bound"),
            HandleState::Closing => write!(f, "Closing"),
            HandleState::Closed => write!(f, "Closed"),
        }
    }
}
