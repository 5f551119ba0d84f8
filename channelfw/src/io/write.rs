use std::{fmt, io, ops::Deref, sync::Arc};

use super::{IoOutcome, RequestContext, Timeout};
use crate::{
    buf::{leading_buffers, length_of},
    driver::{Completion, Direction},
    net::{ConnectionCore, VirtualConnection},
};

/// Legacy amount asking for every remaining byte to be written.
pub const WRITE_ALL_DATA: i64 = -1;

/// How much a write must move before it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteAmount {
    /// Everything remaining in the leading buffers.
    #[default]
    All,
    /// At least this many bytes; more may go out.
    AtLeast(usize),
}

impl WriteAmount {
    /// Translate the legacy vocabulary: [`WRITE_ALL_DATA`] or a byte count.
    pub fn from_legacy(amount: i64) -> io::Result<Self> {
        match amount {
            WRITE_ALL_DATA => Ok(WriteAmount::All),
            n if n >= 0 => usize::try_from(n)
                .map(WriteAmount::AtLeast)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e)),
            n => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported write amount {n}"),
            )),
        }
    }
}

/// Receives the completion of a queued write. Runs on a worker thread.
pub trait WriteCompletedCallback: Send + Sync + 'static {
    /// The write reached its amount.
    fn complete(&self, vc: VirtualConnection, ctx: &WriteRequestContext);

    /// The write failed.
    fn error(&self, vc: VirtualConnection, ctx: &WriteRequestContext, error: io::Error);
}

struct FnWriteCallback<C, E> {
    complete: C,
    error: E,
}

impl<C, E> WriteCompletedCallback for FnWriteCallback<C, E>
where
    C: Fn(VirtualConnection, &WriteRequestContext) + Send + Sync + 'static,
    E: Fn(VirtualConnection, &WriteRequestContext, io::Error) + Send + Sync + 'static,
{
    fn complete(&self, vc: VirtualConnection, ctx: &WriteRequestContext) {
        (self.complete)(vc, ctx)
    }

    fn error(&self, vc: VirtualConnection, ctx: &WriteRequestContext, error: io::Error) {
        (self.error)(vc, ctx, error)
    }
}

/// Build a write callback from a success and a failure closure.
pub fn write_callback<C, E>(complete: C, error: E) -> Arc<dyn WriteCompletedCallback>
where
    C: Fn(VirtualConnection, &WriteRequestContext) + Send + Sync + 'static,
    E: Fn(VirtualConnection, &WriteRequestContext, io::Error) + Send + Sync + 'static,
{
    Arc::new(FnWriteCallback { complete, error })
}

/// The write side of a connection.
///
/// Data goes out of the context's buffers from each buffer's position;
/// positions move past what was written.
pub struct WriteRequestContext {
    base: RequestContext,
}

impl WriteRequestContext {
    pub(crate) fn new(core: Arc<ConnectionCore>) -> Self {
        Self {
            base: RequestContext::new(core, Direction::Write),
        }
    }

    /// Write `amount`, blocking the calling thread. Returns the bytes
    /// written. A cancel [`Timeout`] times out the outstanding write instead
    /// and returns `Ok(0)`.
    pub fn write(&self, amount: WriteAmount, timeout: Timeout) -> io::Result<u64> {
        if timeout.is_cancel() {
            self.cancel(timeout, None);
            return Ok(0);
        }
        let guard = self.core.begin(Direction::Write)?;
        let target = self.prepare(amount)?;
        let timeout = timeout.resolve(self.core.shared.config.write_timeout);
        self.run_sync(guard, target, timeout)
    }

    /// Write `amount` without blocking.
    ///
    /// Same completion rules as
    /// [`read_async`](super::ReadRequestContext::read_async): `Immediate`
    /// never calls back, `Pending` calls back exactly once on a worker
    /// thread.
    pub fn write_async(
        &self,
        amount: WriteAmount,
        callback: Arc<dyn WriteCompletedCallback>,
        force_queue: bool,
        timeout: Timeout,
    ) -> IoOutcome {
        let completion = Completion::Write(callback);
        if timeout.is_cancel() {
            self.cancel(timeout, Some(completion));
            return IoOutcome::Pending;
        }
        let guard = match self.core.begin(Direction::Write) {
            Ok(guard) => guard,
            Err(e) => return self.reject(completion, e),
        };
        let target = match self.prepare(amount) {
            Ok(target) => target,
            Err(e) => {
                drop(guard);
                return self.reject(completion, e);
            }
        };
        let timeout = timeout.resolve(self.core.shared.config.write_timeout);
        self.run_async(guard, target, completion, force_queue, timeout)
    }

    fn cancel(&self, timeout: Timeout, redirect: Option<Completion>) {
        self.core.cancel(
            Direction::Write,
            matches!(timeout, Timeout::AbortAndAttemptBlock),
            redirect,
        );
    }

    /// Resolve `amount` to a byte target against the buffers.
    fn prepare(&self, amount: WriteAmount) -> io::Result<usize> {
        self.with_buffers(|buffers| {
            if leading_buffers(buffers).next().is_none() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "no buffers for write request",
                ));
            }
            let available = length_of(buffers);
            match amount {
                WriteAmount::All => Ok(available),
                WriteAmount::AtLeast(n) if n > available => Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("buffers hold {available} bytes but {n} must be written"),
                )),
                WriteAmount::AtLeast(n) => Ok(n),
            }
        })
    }
}

impl Deref for WriteRequestContext {
    type Target = RequestContext;

    fn deref(&self) -> &RequestContext {
        &self.base
    }
}

impl fmt::Debug for WriteRequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteRequestContext")
            .field("base", &self.base)
            .finish()
    }
}
