use crate::net::VirtualConnection;

/// How an asynchronous request was taken.
///
/// `Immediate` means the request already completed on the calling thread and
/// its callback will **not** run; the caller continues with the same logic it
/// would have run from the callback. `Pending` means the callback runs
/// exactly once, later, on a worker thread.
#[must_use = "an immediate outcome is the only completion signal for that request"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOutcome {
    /// Completed inline.
    Immediate(VirtualConnection),
    /// Completion is delivered to the callback.
    Pending,
}

impl IoOutcome {
    /// Whether the request completed inline.
    #[inline]
    pub fn is_immediate(&self) -> bool {
        matches!(self, IoOutcome::Immediate(_))
    }

    /// The handle of an inline completion.
    #[inline]
    pub fn virtual_connection(&self) -> Option<VirtualConnection> {
        match self {
            IoOutcome::Immediate(vc) => Some(*vc),
            IoOutcome::Pending => None,
        }
    }
}
