//! Readiness driver.
//!
//! One thread owns a [`mio::Poll`] and every request that could not finish
//! inline. Other threads talk to it through a [`Handle`]: commands go over a
//! flume channel and a [`mio::Waker`] interrupts the poll so they are seen
//! right away.

use std::{
    io,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use self::{ready::Ready, scheduled_io::ScheduledIo};

pub(crate) mod op;
pub(crate) mod ready;
mod scheduled_io;

pub(crate) use op::{Completion, Op, Progress};
pub(crate) use ready::Direction;

const TOKEN_WAKEUP: mio::Token = mio::Token(usize::MAX);

/// Messages understood by the driver thread.
pub(crate) enum Command {
    /// Attempt a request now and park it if it cannot finish.
    Submit(Op),
    /// Retry the outstanding request once, otherwise time it out. A
    /// callback given with the cancel receives the outcome instead.
    Cancel {
        token: mio::Token,
        direction: Direction,
        redirect: Option<Completion>,
    },
    /// Fail every outstanding request of the connection.
    Close { token: mio::Token },
    /// The connection is gone; forget its slot.
    Release { token: mio::Token },
    /// Fail everything and leave the loop.
    Shutdown,
}

pub(crate) fn shut_down() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "channel is shut down")
}

struct HandleInner {
    sender: flume::Sender<Command>,
    // Lets a sender clean up after a driver that stopped under it.
    receiver: flume::Receiver<Command>,
    stopped: Arc<AtomicBool>,
    waker: mio::Waker,
    registry: mio::Registry,
    next_token: AtomicUsize,
}

/// Cloneable access to the driver from any thread.
#[derive(Clone)]
pub(crate) struct Handle {
    inner: Arc<HandleInner>,
}

impl Handle {
    /// Register a connection for read and write readiness.
    pub(crate) fn register(&self, source: &mut mio::net::TcpStream) -> io::Result<mio::Token> {
        let token = mio::Token(self.inner.next_token.fetch_add(1, Ordering::Relaxed));
        self.inner.registry.register(
            source,
            token,
            mio::Interest::READABLE | mio::Interest::WRITABLE,
        )?;
        Ok(token)
    }

    pub(crate) fn deregister(&self, source: &mut mio::net::TcpStream) -> io::Result<()> {
        self.inner.registry.deregister(source)
    }

    /// Send a command and wake the driver.
    ///
    /// Once the driver has stopped the command is dropped instead; a request
    /// inside fails with `NotConnected` as it drops.
    pub(crate) fn send(&self, command: Command) -> io::Result<()> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(shut_down());
        }
        self.inner.sender.send(command).map_err(|_| shut_down())?;
        if self.inner.stopped.load(Ordering::SeqCst) {
            // The driver may have drained the queue before our command
            // landed in it.
            while let Ok(command) = self.inner.receiver.try_recv() {
                drop(command);
            }
            return Err(shut_down());
        }
        // Queued either way; the driver picks it up on its next turn.
        if let Err(e) = self.inner.waker.wake() {
            warn!(error = %e, "failed to wake driver");
        }
        Ok(())
    }

    /// Hand a request over. If the driver is gone the request fails at once.
    pub(crate) fn submit(&self, op: Op) {
        if let Err(e) = self.send(Command::Submit(op)) {
            debug!(error = %e, "request not submitted");
        }
    }
}

/// The driver loop state. Lives on its own thread once started.
pub(crate) struct Driver {
    poll: mio::Poll,
    events: Option<mio::Events>,
    receiver: flume::Receiver<Command>,
    stopped: Arc<AtomicBool>,
    io_dispatch: FxHashMap<mio::Token, ScheduledIo>,
}

impl Driver {
    pub(crate) fn new(event_capacity: usize) -> io::Result<(Self, Handle)> {
        let poll = mio::Poll::new()?;
        let waker = mio::Waker::new(poll.registry(), TOKEN_WAKEUP)?;
        let registry = poll.registry().try_clone()?;
        let (sender, receiver) = flume::unbounded();
        let stopped = Arc::new(AtomicBool::new(false));

        let handle = Handle {
            inner: Arc::new(HandleInner {
                sender,
                receiver: receiver.clone(),
                stopped: stopped.clone(),
                waker,
                registry,
                next_token: AtomicUsize::new(0),
            }),
        };
        let driver = Self {
            poll,
            events: Some(mio::Events::with_capacity(event_capacity)),
            receiver,
            stopped,
            io_dispatch: FxHashMap::default(),
        };
        Ok((driver, handle))
    }

    /// Run until [`Command::Shutdown`] or a poll failure. Parked requests are
    /// failed either way.
    pub(crate) fn run(mut self) -> io::Result<()> {
        let result = self.run_loop();
        self.stopped.store(true, Ordering::SeqCst);
        self.fail_all();
        result
    }

    fn run_loop(&mut self) -> io::Result<()> {
        loop {
            let timeout = self
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()));
            self.park(timeout)?;
            if !self.drain_commands() {
                debug!("driver shutting down");
                return Ok(());
            }
            self.expire(Instant::now());
        }
    }

    fn park(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let mut events = match self.events.take() {
            Some(events) => events,
            None => mio::Events::with_capacity(1024),
        };
        let result = match self.poll.poll(&mut events, timeout) {
            Ok(_) => Ok(()),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => Ok(()),
            Err(e) => Err(e),
        };
        if result.is_ok() {
            for event in events.iter() {
                let token = event.token();
                if token != TOKEN_WAKEUP {
                    self.dispatch(token, Ready::from_mio(event));
                }
            }
        }
        self.events = Some(events);
        result
    }

    fn dispatch(&mut self, token: mio::Token, ready: Ready) {
        trace!(token = token.0, ?ready, "dispatch");
        if let Some(sio) = self.io_dispatch.get_mut(&token) {
            sio.wake(ready);
        }
    }

    /// Returns false once the driver must stop.
    fn drain_commands(&mut self) -> bool {
        loop {
            match self.receiver.try_recv() {
                Ok(Command::Submit(op)) => {
                    trace!(?op, "submit");
                    self.io_dispatch.entry(op.token()).or_default().submit(op);
                }
                Ok(Command::Cancel {
                    token,
                    direction,
                    redirect,
                }) => {
                    let cancelled = self
                        .io_dispatch
                        .get_mut(&token)
                        .is_some_and(|sio| sio.cancel(direction, redirect));
                    trace!(token = token.0, %direction, cancelled, "cancel");
                }
                Ok(Command::Close { token }) => {
                    if let Some(sio) = self.io_dispatch.get_mut(&token) {
                        sio.fail_all(io::ErrorKind::ConnectionAborted, "connection closed");
                    }
                }
                Ok(Command::Release { token }) => {
                    if let Some(sio) = self.io_dispatch.remove(&token) {
                        debug_assert!(sio.is_idle());
                    }
                }
                Ok(Command::Shutdown) => return false,
                Err(_) => return true,
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.io_dispatch
            .values()
            .filter_map(ScheduledIo::next_deadline)
            .min()
    }

    fn expire(&mut self, now: Instant) {
        for sio in self.io_dispatch.values_mut() {
            sio.expire(now);
        }
    }

    fn fail_all(&mut self) {
        for sio in self.io_dispatch.values_mut() {
            sio.fail_all(io::ErrorKind::NotConnected, "channel is shut down");
        }
        // Requests still queued never reached a slot; dropping fails them.
        while let Ok(command) = self.receiver.try_recv() {
            drop(command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_fails_only_when_not_queued() {
        let (driver, handle) = Driver::new(64).unwrap();

        handle.send(Command::Shutdown).unwrap();
        assert!(matches!(driver.receiver.try_recv(), Ok(Command::Shutdown)));

        driver.stopped.store(true, Ordering::SeqCst);
        let err = handle.send(Command::Shutdown).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(driver.receiver.is_empty());
    }
}
