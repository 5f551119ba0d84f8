use std::{
    fmt, io,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use tracing::trace;

use super::{IoOutcome, RequestContext, Timeout};
use crate::{
    buf::{leading_buffers, length_of, ByteBuffer},
    driver::{Completion, Direction},
    net::{ConnectionCore, VirtualConnection},
};

/// Receives the completion of a queued read.
///
/// Runs on a worker thread, never on the thread that issued the read.
/// `result` carries the number of bytes read by the request.
pub trait ReadCompletedCallback: Send + Sync + 'static {
    /// The read finished, successfully or not.
    fn completed(&self, vc: VirtualConnection, ctx: &ReadRequestContext, result: io::Result<u64>);
}

impl<F> ReadCompletedCallback for F
where
    F: Fn(VirtualConnection, &ReadRequestContext, io::Result<u64>) + Send + Sync + 'static,
{
    #[inline]
    fn completed(&self, vc: VirtualConnection, ctx: &ReadRequestContext, result: io::Result<u64>) {
        self(vc, ctx, result)
    }
}

/// Wrap a closure as a shareable read callback.
pub fn read_callback<F>(f: F) -> Arc<dyn ReadCompletedCallback>
where
    F: Fn(VirtualConnection, &ReadRequestContext, io::Result<u64>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A buffer the channel allocated for a read because none was supplied.
///
/// Taking it out of the context makes the caller its owner.
#[must_use]
pub struct JitBuffer(ByteBuffer);

impl JitBuffer {
    /// Unwrap the buffer.
    #[inline]
    pub fn into_inner(self) -> ByteBuffer {
        self.0
    }

    /// Give the storage back.
    #[inline]
    pub fn release(self) {
        self.0.release()
    }
}

impl Deref for JitBuffer {
    type Target = ByteBuffer;

    fn deref(&self) -> &ByteBuffer {
        &self.0
    }
}

impl DerefMut for JitBuffer {
    fn deref_mut(&mut self) -> &mut ByteBuffer {
        &mut self.0
    }
}

impl fmt::Debug for JitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JitBuffer").field(&self.0).finish()
    }
}

/// The read side of a connection.
///
/// Data lands in the context's buffers starting at each buffer's position;
/// positions move past what was read. When no buffers are set and a
/// just-in-time size is configured, one buffer of that size is allocated for
/// the request.
pub struct ReadRequestContext {
    base: RequestContext,
}

impl ReadRequestContext {
    pub(crate) fn new(core: Arc<ConnectionCore>) -> Self {
        Self {
            base: RequestContext::new(core, Direction::Read),
        }
    }

    /// Read at least `min_bytes`, blocking the calling thread.
    ///
    /// `min_bytes == 0` makes one non-blocking attempt and returns what it
    /// got. A cancel [`Timeout`] performs no read: it times out the request
    /// outstanding on this side and returns `Ok(0)` right away.
    pub fn read(&self, min_bytes: usize, timeout: Timeout) -> io::Result<u64> {
        if timeout.is_cancel() {
            self.cancel(timeout, None);
            return Ok(0);
        }
        let guard = self.core.begin(Direction::Read)?;
        let target = self.prepare(min_bytes, false)?;
        let timeout = timeout.resolve(self.core.shared.config.read_timeout);
        self.run_sync(guard, target, timeout)
    }

    /// Read at least `min_bytes` without blocking.
    ///
    /// Returns [`IoOutcome::Immediate`] when the data was already there and
    /// `force_queue` is false; `callback` is then not invoked. Otherwise
    /// returns [`IoOutcome::Pending`] and `callback` runs exactly once on a
    /// worker thread, errors included.
    ///
    /// `min_bytes == 0` is refused when buffers are set. Without buffers it
    /// reads whatever first arrives into a just-in-time buffer.
    ///
    /// A cancel [`Timeout`] performs no read and returns `Pending`. The
    /// request being cancelled then reports to `callback`, not to the
    /// callback it was issued with.
    pub fn read_async(
        &self,
        min_bytes: usize,
        callback: Arc<dyn ReadCompletedCallback>,
        force_queue: bool,
        timeout: Timeout,
    ) -> IoOutcome {
        let completion = Completion::Read(callback);
        if timeout.is_cancel() {
            self.cancel(timeout, Some(completion));
            return IoOutcome::Pending;
        }
        let guard = match self.core.begin(Direction::Read) {
            Ok(guard) => guard,
            Err(e) => return self.reject(completion, e),
        };
        let target = match self.prepare(min_bytes, true) {
            Ok(target) => target,
            Err(e) => {
                drop(guard);
                return self.reject(completion, e);
            }
        };
        let timeout = timeout.resolve(self.core.shared.config.read_timeout);
        self.run_async(guard, target, completion, force_queue, timeout)
    }

    /// Size of the buffer allocated when a read finds no buffers. `0`
    /// disables allocation.
    pub fn set_jit_allocate_size(&self, size: usize) {
        self.with_state(|state| state.jit_size = size);
    }

    /// See [`set_jit_allocate_size`](ReadRequestContext::set_jit_allocate_size).
    pub fn jit_allocate_size(&self) -> usize {
        self.with_state(|state| state.jit_size)
    }

    /// Whether the most recent read allocated its buffer.
    pub fn jit_allocate_action(&self) -> bool {
        self.with_state(|state| state.jit_allocated)
    }

    /// Take the buffer the most recent read allocated. The caller owns it
    /// from here on.
    pub fn take_jit_buffer(&self) -> Option<JitBuffer> {
        self.with_state(|state| {
            if !state.jit_allocated {
                return None;
            }
            state.jit_allocated = false;
            let buffer = state.buffers.first_mut().and_then(Option::take);
            state.buffers.clear();
            buffer.map(JitBuffer)
        })
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut crate::net::RequestState) -> R) -> R {
        f(&mut lock!(self.core.direction(Direction::Read).state))
    }

    fn cancel(&self, timeout: Timeout, redirect: Option<Completion>) {
        self.core.cancel(
            Direction::Read,
            matches!(timeout, Timeout::AbortAndAttemptBlock),
            redirect,
        );
    }

    /// Check the buffers against `min_bytes`, allocating one if needed, and
    /// return the byte target of the request.
    ///
    /// An asynchronous read into caller buffers needs a minimum of at least
    /// one byte. Into a just-in-time buffer a zero minimum waits for the
    /// first byte.
    fn prepare(&self, min_bytes: usize, asynchronous: bool) -> io::Result<usize> {
        self.with_state(|state| {
            state.jit_allocated = false;
            if leading_buffers(&state.buffers).next().is_some() {
                if asynchronous && min_bytes == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "asynchronous read needs a minimum of at least one byte",
                    ));
                }
            } else {
                if state.jit_size == 0 || state.jit_size < min_bytes {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "no buffers for read request",
                    ));
                }
                trace!(vc = %self.virtual_connection(), size = state.jit_size, "jit allocate");
                state.buffers = vec![Some(ByteBuffer::allocate(state.jit_size))];
                state.jit_allocated = true;
            }
            let available = length_of(&state.buffers);
            if available < min_bytes {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("buffers hold {available} bytes but {min_bytes} were requested"),
                ));
            }
            if asynchronous && state.jit_allocated {
                Ok(min_bytes.max(1))
            } else {
                Ok(min_bytes)
            }
        })
    }
}

impl Deref for ReadRequestContext {
    type Target = RequestContext;

    fn deref(&self) -> &RequestContext {
        &self.base
    }
}

impl fmt::Debug for ReadRequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadRequestContext")
            .field("base", &self.base)
            .field("jit_allocate_size", &self.jit_allocate_size())
            .finish()
    }
}
