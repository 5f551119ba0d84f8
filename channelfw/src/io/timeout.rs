use std::{io, time::Duration};

/// Legacy value: apply the channel's configured default.
pub const USE_CHANNEL_TIMEOUT: i32 = 0;
/// Legacy value: wait indefinitely.
pub const NO_TIMEOUT: i32 = -1;
/// Legacy value: time out the previous request on the context right away.
pub const IMMED_TIMEOUT: i32 = -2;
/// Legacy value: like [`IMMED_TIMEOUT`], and try to block further I/O.
pub const ABORT_TIMEOUT: i32 = -3;

/// How long an I/O request may stay pending.
///
/// Two variants do not describe a wait at all: [`CancelPrevious`] and
/// [`AbortAndAttemptBlock`] turn the call into a cancellation of whatever
/// request is outstanding on the same context. Both are best effort; a
/// request may still win the race and complete normally.
///
/// [`CancelPrevious`]: Timeout::CancelPrevious
/// [`AbortAndAttemptBlock`]: Timeout::AbortAndAttemptBlock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Use the channel's configured timeout for this direction.
    #[default]
    UseDefault,
    /// Wait indefinitely.
    Infinite,
    /// Perform no I/O; time out the previous request on this context.
    CancelPrevious,
    /// As `CancelPrevious`, and refuse I/O started on this context later.
    AbortAndAttemptBlock,
    /// Wait at most this long.
    After(Duration),
}

impl Timeout {
    /// Translate the legacy integer vocabulary. Positive values are
    /// milliseconds.
    pub fn from_millis(value: i32) -> io::Result<Self> {
        match value {
            USE_CHANNEL_TIMEOUT => Ok(Timeout::UseDefault),
            NO_TIMEOUT => Ok(Timeout::Infinite),
            IMMED_TIMEOUT => Ok(Timeout::CancelPrevious),
            ABORT_TIMEOUT => Ok(Timeout::AbortAndAttemptBlock),
            v if v > 0 => Ok(Timeout::After(Duration::from_millis(v as u64))),
            v => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported timeout value {v}"),
            )),
        }
    }

    /// The legacy integer for this timeout. Durations are truncated to whole
    /// milliseconds, clamped to at least 1 and at most `i32::MAX`.
    pub fn as_millis(&self) -> i32 {
        match self {
            Timeout::UseDefault => USE_CHANNEL_TIMEOUT,
            Timeout::Infinite => NO_TIMEOUT,
            Timeout::CancelPrevious => IMMED_TIMEOUT,
            Timeout::AbortAndAttemptBlock => ABORT_TIMEOUT,
            Timeout::After(d) => d.as_millis().clamp(1, i32::MAX as u128) as i32,
        }
    }

    /// Whether this value cancels instead of waiting.
    #[inline]
    pub fn is_cancel(&self) -> bool {
        matches!(self, Timeout::CancelPrevious | Timeout::AbortAndAttemptBlock)
    }

    /// Resolve to a concrete wait. `None` means no deadline.
    ///
    /// Must not be called on a cancel value.
    pub(crate) fn resolve(&self, default: Option<Duration>) -> Option<Duration> {
        match self {
            Timeout::UseDefault => default,
            Timeout::Infinite => None,
            Timeout::After(d) => Some(*d),
            Timeout::CancelPrevious | Timeout::AbortAndAttemptBlock => {
                debug_assert!(false, "cancel timeout has no duration");
                None
            }
        }
    }
}

impl TryFrom<i32> for Timeout {
    type Error = io::Error;

    fn try_from(value: i32) -> io::Result<Self> {
        Timeout::from_millis(value)
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::After(d)
    }
}

pub(crate) fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "request timed out")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn legacy_values() {
        assert_eq!(Timeout::from_millis(0).unwrap(), Timeout::UseDefault);
        assert_eq!(Timeout::from_millis(-1).unwrap(), Timeout::Infinite);
        assert_eq!(Timeout::from_millis(-2).unwrap(), Timeout::CancelPrevious);
        assert_eq!(Timeout::from_millis(-3).unwrap(), Timeout::AbortAndAttemptBlock);
        assert_eq!(
            Timeout::from_millis(1500).unwrap(),
            Timeout::After(Duration::from_millis(1500))
        );
        assert_eq!(
            Timeout::from_millis(-4).unwrap_err().kind(),
            std::io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn back_to_legacy() {
        for v in [0, -1, -2, -3, 250] {
            assert_eq!(Timeout::from_millis(v).unwrap().as_millis(), v);
        }
        assert_eq!(Timeout::After(Duration::from_micros(10)).as_millis(), 1);
        assert_eq!(Timeout::After(Duration::from_secs(u64::MAX)).as_millis(), i32::MAX);
    }

    #[test]
    fn resolve() {
        let default = Some(Duration::from_secs(5));
        assert_eq!(Timeout::UseDefault.resolve(default), default);
        assert_eq!(Timeout::Infinite.resolve(default), None);
        assert_eq!(
            Timeout::After(Duration::from_secs(1)).resolve(default),
            Some(Duration::from_secs(1))
        );
        assert!(Timeout::AbortAndAttemptBlock.is_cancel());
        assert!(!Timeout::Infinite.is_cancel());
    }
}
