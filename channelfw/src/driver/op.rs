use std::{fmt, io, sync::Arc, time::Instant};

use tracing::{debug, trace};

use super::ready::Direction;
use crate::{
    io::{ReadCompletedCallback, ReadRequestContext, WriteCompletedCallback, WriteRequestContext},
    net::ConnectionCore,
};

/// Result of one non-blocking attempt at a request.
pub(crate) enum Progress {
    /// The request reached its target.
    Complete,
    /// The socket has nothing more for now; park the request.
    WouldBlock,
    Failed(io::Error),
}

/// Where the result of a request goes.
pub(crate) enum Completion {
    Read(Arc<dyn ReadCompletedCallback>),
    Write(Arc<dyn WriteCompletedCallback>),
    /// A thread blocked in a synchronous call waits on the other end.
    Blocking(flume::Sender<io::Result<u64>>),
}

impl Completion {
    /// Hand `result` over. Callbacks always run on the worker pool.
    pub(crate) fn deliver(self, conn: Arc<ConnectionCore>, result: io::Result<u64>) {
        match self {
            Completion::Blocking(tx) => {
                // The waiter may have gone away; nobody is left to tell.
                let _ = tx.send(result);
            }
            Completion::Read(callback) => {
                let pool = conn.shared.pool.clone();
                pool.schedule_task(Box::new(move || {
                    let ctx = ReadRequestContext::new(conn);
                    callback.completed(ctx.virtual_connection(), &ctx, result);
                }));
            }
            Completion::Write(callback) => {
                let pool = conn.shared.pool.clone();
                pool.schedule_task(Box::new(move || {
                    let ctx = WriteRequestContext::new(conn);
                    let vc = ctx.virtual_connection();
                    match result {
                        Ok(_) => callback.complete(vc, &ctx),
                        Err(e) => callback.error(vc, &ctx, e),
                    }
                }));
            }
        }
    }
}

/// A request parked in the driver.
pub(crate) struct Op {
    conn: Arc<ConnectionCore>,
    direction: Direction,
    target: usize,
    done: usize,
    deadline: Option<Instant>,
    // Taken when the request finishes. An op dropped with it still in place
    // was lost by a stopping driver.
    completion: Option<Completion>,
}

impl Op {
    /// Report to `completion` from now on. A thread blocked in a synchronous
    /// call keeps waiting on its own channel.
    pub(crate) fn redirect(&mut self, completion: Completion) {
        if matches!(
            self.completion,
            Some(Completion::Read(_) | Completion::Write(_))
        ) {
            self.completion = Some(completion);
        }
    }

    pub(crate) fn new(
        conn: Arc<ConnectionCore>,
        direction: Direction,
        target: usize,
        done: usize,
        deadline: Option<Instant>,
        completion: Completion,
    ) -> Self {
        Self {
            conn,
            direction,
            target,
            done,
            deadline,
            completion: Some(completion),
        }
    }

    #[inline]
    pub(crate) fn token(&self) -> mio::Token {
        self.conn.token()
    }

    #[inline]
    pub(crate) fn direction(&self) -> Direction {
        self.direction
    }

    #[inline]
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Try once more; gives the op back when it has to keep waiting.
    pub(crate) fn drive(mut self) -> Option<Self> {
        let progress = match self.direction {
            Direction::Read => self.conn.try_read(&mut self.done, self.target),
            Direction::Write => self.conn.try_write(&mut self.done, self.target),
        };
        match progress {
            Progress::Complete => {
                let done = self.done as u64;
                self.complete(Ok(done));
                None
            }
            Progress::Failed(e) => {
                self.complete(Err(e));
                None
            }
            Progress::WouldBlock => Some(self),
        }
    }

    /// Finish the request. The direction is released before the completion
    /// is handed over, so a callback may start the next request.
    pub(crate) fn complete(mut self, result: io::Result<u64>) {
        self.finish(result);
    }

    fn finish(&mut self, result: io::Result<u64>) {
        let Some(completion) = self.completion.take() else {
            return;
        };
        let vc = self.conn.virtual_connection();
        let direction = self.direction;
        match &result {
            Ok(bytes) => trace!(%vc, %direction, bytes, "request completed"),
            Err(e) => debug!(%vc, %direction, error = %e, "request failed"),
        }
        self.conn.direction(direction).finish();
        completion.deliver(self.conn.clone(), result);
    }
}

impl Drop for Op {
    fn drop(&mut self) {
        self.finish(Err(super::shut_down()));
    }
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Op")
            .field("vc", &self.conn.virtual_connection())
            .field("direction", &self.direction)
            .field("target", &self.target)
            .field("done", &self.done)
            .field("deadline", &self.deadline)
            .finish()
    }
}
