use std::{
    fmt,
    io::{self, IoSlice, IoSliceMut, Read, Write},
    net::{Shutdown, SocketAddr},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, OnceLock,
    },
};

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use super::{SecureSessionContext, VirtualConnection};
use crate::{
    buf::{advance_leading, leading_buffers, leading_buffers_mut, BufferArray},
    channel::ChannelShared,
    driver::{Command, Completion, Direction, Progress},
    io::{ReadRequestContext, WriteRequestContext},
};

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "connection closed")
}

/// Per-direction request state.
#[derive(Default)]
pub(crate) struct RequestState {
    pub(crate) buffers: BufferArray,
    pub(crate) jit_size: usize,
    pub(crate) jit_allocated: bool,
}

#[derive(Default)]
pub(crate) struct DirectionCore {
    pub(crate) state: Mutex<RequestState>,
    pending: AtomicBool,
    aborted: AtomicBool,
}

impl DirectionCore {
    /// Mark the outstanding request of this direction as done.
    #[inline]
    pub(crate) fn finish(&self) {
        self.pending.store(false, Ordering::Release);
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

/// Holds a direction busy until dropped or handed to the driver.
#[must_use]
pub(crate) struct PendingGuard<'a> {
    direction: &'a DirectionCore,
    armed: bool,
}

impl PendingGuard<'_> {
    /// The request now lives in the driver, which releases the direction.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.direction.finish();
        }
    }
}

/// Shared state of one established connection.
pub(crate) struct ConnectionCore {
    vc: VirtualConnection,
    token: mio::Token,
    stream: mio::net::TcpStream,
    local: SocketAddr,
    remote: SocketAddr,
    read: DirectionCore,
    write: DirectionCore,
    pub(crate) shared: Arc<ChannelShared>,
    properties: Mutex<FxHashMap<String, bool>>,
    secure: OnceLock<Arc<dyn SecureSessionContext>>,
    closed: AtomicBool,
}

impl ConnectionCore {
    /// Take over a connected non-blocking stream.
    pub(crate) fn establish(
        shared: Arc<ChannelShared>,
        mut stream: mio::net::TcpStream,
    ) -> io::Result<Arc<Self>> {
        let local = stream.local_addr()?;
        let remote = stream.peer_addr()?;
        stream.set_nodelay(shared.config.tcp_nodelay)?;
        let token = shared.driver.register(&mut stream)?;
        let vc = VirtualConnection::new();
        debug!(%vc, %local, %remote, token = token.0, "connection established");

        let read = DirectionCore::default();
        lock!(read.state).jit_size = shared.config.jit_allocate_size;

        Ok(Arc::new(Self {
            vc,
            token,
            stream,
            local,
            remote,
            read,
            write: DirectionCore::default(),
            shared,
            properties: Mutex::new(FxHashMap::default()),
            secure: OnceLock::new(),
            closed: AtomicBool::new(false),
        }))
    }

    #[inline]
    pub(crate) fn virtual_connection(&self) -> VirtualConnection {
        self.vc
    }

    #[inline]
    pub(crate) fn token(&self) -> mio::Token {
        self.token
    }

    #[inline]
    pub(crate) fn direction(&self, direction: Direction) -> &DirectionCore {
        match direction {
            Direction::Read => &self.read,
            Direction::Write => &self.write,
        }
    }

    /// Claim a direction for a new request.
    pub(crate) fn begin(&self, direction: Direction) -> io::Result<PendingGuard<'_>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection is closed",
            ));
        }
        let core = self.direction(direction);
        if core.aborted.load(Ordering::Acquire) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                format!("{direction} side was aborted"),
            ));
        }
        if core
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("a {direction} request is already outstanding"),
            ));
        }
        Ok(PendingGuard {
            direction: core,
            armed: true,
        })
    }

    /// Time out the outstanding request of `direction`. With `abort`, later
    /// requests on that direction are refused. `redirect` takes over the
    /// outcome of the cancelled request.
    pub(crate) fn cancel(
        &self,
        direction: Direction,
        abort: bool,
        redirect: Option<Completion>,
    ) {
        if abort {
            self.direction(direction).aborted.store(true, Ordering::Release);
        }
        debug!(vc = %self.vc, %direction, abort, "cancel requested");
        let command = Command::Cancel {
            token: self.token,
            direction,
            redirect,
        };
        if let Err(e) = self.shared.driver.send(command) {
            debug!(vc = %self.vc, error = %e, "cancel not delivered");
        }
    }

    /// Read into the leading buffers until `min` bytes arrived in total.
    ///
    /// `min == 0` makes a single attempt and completes with whatever it got.
    pub(crate) fn try_read(&self, done: &mut usize, min: usize) -> Progress {
        if self.closed.load(Ordering::Acquire) {
            return Progress::Failed(closed());
        }
        let mut state = lock!(self.read.state);
        let buffers = &mut state.buffers;
        loop {
            let result = {
                let mut slices: Vec<IoSliceMut<'_>> = leading_buffers_mut(buffers)
                    .filter(|buf| buf.has_remaining())
                    .map(|buf| IoSliceMut::new(buf.as_mut_slice()))
                    .collect();
                if slices.is_empty() {
                    return if *done >= min {
                        Progress::Complete
                    } else {
                        Progress::Failed(io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "buffers filled before the minimum arrived",
                        ))
                    };
                }
                (&self.stream).read_vectored(&mut slices)
            };
            match result {
                Ok(0) => {
                    return Progress::Failed(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "peer closed the connection",
                    ))
                }
                Ok(n) => {
                    advance_leading(buffers, n);
                    *done += n;
                    trace!(vc = %self.vc, bytes = n, total = *done, "read");
                    if *done >= min {
                        return Progress::Complete;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return if *done >= min {
                        Progress::Complete
                    } else {
                        Progress::WouldBlock
                    };
                }
                Err(e) => return Progress::Failed(e),
            }
        }
    }

    /// Write from the leading buffers until `target` bytes went out in total.
    pub(crate) fn try_write(&self, done: &mut usize, target: usize) -> Progress {
        if self.closed.load(Ordering::Acquire) {
            return Progress::Failed(closed());
        }
        let mut state = lock!(self.write.state);
        let buffers = &mut state.buffers;
        while *done < target {
            let result = {
                let slices: Vec<IoSlice<'_>> = leading_buffers(buffers)
                    .filter(|buf| buf.has_remaining())
                    .map(|buf| IoSlice::new(buf.as_slice()))
                    .collect();
                if slices.is_empty() {
                    return Progress::Failed(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "buffers drained before the target was written",
                    ));
                }
                (&self.stream).write_vectored(&slices)
            };
            match result {
                Ok(0) => return Progress::Failed(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    advance_leading(buffers, n);
                    *done += n;
                    trace!(vc = %self.vc, bytes = n, total = *done, "write");
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Progress::WouldBlock
                }
                Err(e) => return Progress::Failed(e),
            }
        }
        Progress::Complete
    }

    pub(crate) fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(vc = %self.vc, "closing connection");
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
            Err(e) => return Err(e),
        }
        // The driver may already be gone, then nothing is pending anyway.
        let _ = self.shared.driver.send(Command::Close { token: self.token });
        Ok(())
    }
}

impl Drop for ConnectionCore {
    fn drop(&mut self) {
        trace!(vc = %self.vc, "releasing connection");
        let _ = self.shared.driver.deregister(&mut self.stream);
        let _ = self
            .shared
            .driver
            .send(Command::Release { token: self.token });
    }
}

/// One established connection.
///
/// Owns a read side and a write side that work independently: each accepts
/// one request at a time, and the two may be busy concurrently. Cloning is
/// cheap and every clone refers to the same connection. The socket is closed
/// when [`close`](ConnectionContext::close) is called or the last clone and
/// the last request context are dropped.
#[derive(Clone)]
pub struct ConnectionContext {
    core: Arc<ConnectionCore>,
}

impl ConnectionContext {
    /// Property key marking a connection that tunnels through a forward
    /// proxy.
    pub const FORWARD_PROXY_TUNNEL: &'static str = "forward_proxy_tunnel";

    pub(crate) fn new(core: Arc<ConnectionCore>) -> Self {
        Self { core }
    }

    /// The read side.
    pub fn read_interface(&self) -> ReadRequestContext {
        ReadRequestContext::new(self.core.clone())
    }

    /// The write side.
    pub fn write_interface(&self) -> WriteRequestContext {
        WriteRequestContext::new(self.core.clone())
    }

    /// Handle passed to completions of this connection.
    pub fn virtual_connection(&self) -> VirtualConnection {
        self.core.vc
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.core.local
    }

    /// Address of the peer.
    pub fn remote_addr(&self) -> SocketAddr {
        self.core.remote
    }

    /// Session of the security layer, if the connection is protected.
    pub fn secure_session(&self) -> Option<Arc<dyn SecureSessionContext>> {
        self.core.secure.get().cloned()
    }

    /// Attach the security layer's session. Only the first call wins; later
    /// calls get their session back.
    pub fn set_secure_session(
        &self,
        session: Arc<dyn SecureSessionContext>,
    ) -> Result<(), Arc<dyn SecureSessionContext>> {
        self.core.secure.set(session)
    }

    /// Value of a connection-scoped flag. Unset flags read as `false`.
    pub fn property(&self, key: &str) -> bool {
        lock!(self.core.properties)
            .get(key)
            .copied()
            .unwrap_or(false)
    }

    /// Set a connection-scoped flag.
    pub fn set_property(&self, key: impl Into<String>, value: bool) {
        lock!(self.core.properties).insert(key.into(), value);
    }

    /// Whether the connection runs as a forward-proxy tunnel.
    pub fn is_forward_proxy_tunnel(&self) -> bool {
        self.property(Self::FORWARD_PROXY_TUNNEL)
    }

    /// Mark the connection as a forward-proxy tunnel.
    pub fn set_forward_proxy_tunnel(&self, tunnel: bool) {
        self.set_property(Self::FORWARD_PROXY_TUNNEL, tunnel);
    }

    /// Shut the socket down. Outstanding requests fail with
    /// `ConnectionAborted`, new ones with `NotConnected`. Closing twice is a
    /// no-op.
    pub fn close(&self) -> io::Result<()> {
        self.core.close()
    }

    /// Whether [`close`](ConnectionContext::close) was called.
    pub fn is_closed(&self) -> bool {
        self.core.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("vc", &self.core.vc)
            .field("local", &self.core.local)
            .field("remote", &self.core.remote)
            .field("closed", &self.is_closed())
            .finish()
    }
}
