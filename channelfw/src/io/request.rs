use std::{
    fmt, io,
    sync::Arc,
    time::{Duration, Instant},
};

use super::IoOutcome;
use crate::{
    buf::{length_of, BufferArray, ByteBuffer},
    driver::{shut_down, Completion, Direction, Op, Progress},
    net::{ConnectionContext, ConnectionCore, PendingGuard, VirtualConnection},
};

/// State shared by the read and write side of a connection: the buffers a
/// request works on and the way back to the connection.
///
/// [`ReadRequestContext`](super::ReadRequestContext) and
/// [`WriteRequestContext`](super::WriteRequestContext) deref to this.
pub struct RequestContext {
    pub(crate) core: Arc<ConnectionCore>,
    direction: Direction,
}

impl RequestContext {
    pub(crate) fn new(core: Arc<ConnectionCore>, direction: Direction) -> Self {
        Self { core, direction }
    }

    /// The connection this context belongs to.
    pub fn connection(&self) -> ConnectionContext {
        ConnectionContext::new(self.core.clone())
    }

    /// Handle of the owning connection.
    #[inline]
    pub fn virtual_connection(&self) -> VirtualConnection {
        self.core.virtual_connection()
    }

    /// Replace the buffers. Must not be called while a request is
    /// outstanding on this side.
    pub fn set_buffers(&self, buffers: BufferArray) {
        lock!(self.core.direction(self.direction).state).buffers = buffers;
    }

    /// Replace the buffers with a single one.
    pub fn set_buffer(&self, buffer: ByteBuffer) {
        self.set_buffers(vec![Some(buffer)]);
    }

    /// Take the buffers out, leaving none behind.
    pub fn take_buffers(&self) -> BufferArray {
        std::mem::take(&mut lock!(self.core.direction(self.direction).state).buffers)
    }

    /// Run `f` over the buffers in place.
    pub fn with_buffers<R>(&self, f: impl FnOnce(&mut BufferArray) -> R) -> R {
        f(&mut lock!(self.core.direction(self.direction).state).buffers)
    }

    /// Bytes left in the leading buffers.
    pub fn buffers_remaining(&self) -> usize {
        self.with_buffers(|buffers| length_of(buffers))
    }

    /// Whether a request is outstanding on this side.
    pub fn is_pending(&self) -> bool {
        self.core.direction(self.direction).is_pending()
    }

    fn attempt(&self, done: &mut usize, target: usize) -> Progress {
        match self.direction {
            Direction::Read => self.core.try_read(done, target),
            Direction::Write => self.core.try_write(done, target),
        }
    }

    fn park(
        &self,
        guard: PendingGuard<'_>,
        target: usize,
        done: usize,
        timeout: Option<Duration>,
        completion: Completion,
    ) {
        let deadline = timeout.and_then(|d| Instant::now().checked_add(d));
        let op = Op::new(
            self.core.clone(),
            self.direction,
            target,
            done,
            deadline,
            completion,
        );
        guard.disarm();
        self.core.shared.driver.submit(op);
    }

    /// Try inline, then block until the driver finishes the request.
    pub(crate) fn run_sync(
        &self,
        guard: PendingGuard<'_>,
        target: usize,
        timeout: Option<Duration>,
    ) -> io::Result<u64> {
        let mut done = 0;
        match self.attempt(&mut done, target) {
            Progress::Complete => Ok(done as u64),
            Progress::Failed(e) => Err(e),
            Progress::WouldBlock => {
                let (tx, rx) = flume::bounded(1);
                self.park(guard, target, done, timeout, Completion::Blocking(tx));
                rx.recv().map_err(|_| shut_down())?
            }
        }
    }

    /// Try inline, otherwise park the request with its completion.
    pub(crate) fn run_async(
        &self,
        guard: PendingGuard<'_>,
        target: usize,
        completion: Completion,
        force_queue: bool,
        timeout: Option<Duration>,
    ) -> IoOutcome {
        let mut done = 0;
        match self.attempt(&mut done, target) {
            Progress::Complete if !force_queue => IoOutcome::Immediate(self.virtual_connection()),
            Progress::Complete => {
                drop(guard);
                completion.deliver(self.core.clone(), Ok(done as u64));
                IoOutcome::Pending
            }
            Progress::Failed(e) => {
                drop(guard);
                completion.deliver(self.core.clone(), Err(e));
                IoOutcome::Pending
            }
            Progress::WouldBlock => {
                self.park(guard, target, done, timeout, completion);
                IoOutcome::Pending
            }
        }
    }

    /// Report an error that stopped the request before it started.
    pub(crate) fn reject(&self, completion: Completion, error: io::Error) -> IoOutcome {
        completion.deliver(self.core.clone(), Err(error));
        IoOutcome::Pending
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("vc", &self.virtual_connection())
            .field("direction", &self.direction)
            .field("pending", &self.is_pending())
            .finish()
    }
}
