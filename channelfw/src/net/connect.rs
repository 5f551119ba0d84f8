use std::{
    fmt, io,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use super::ConnectionContext;
use crate::io::Timeout;

/// Parameters of an outbound connection.
///
/// The timeout only bounds the connect attempt itself. The cancel values
/// of [`Timeout`] have nothing to cancel here and are refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequestContext {
    local: Option<SocketAddr>,
    remote: SocketAddr,
    timeout: Timeout,
}

impl ConnectRequestContext {
    /// Connect to `remote` from an OS chosen local address, using the
    /// channel's connect timeout.
    pub fn new(remote: SocketAddr) -> Self {
        Self {
            local: None,
            remote,
            timeout: Timeout::UseDefault,
        }
    }

    /// Bind to `local` before connecting.
    #[must_use]
    pub fn with_local_address(mut self, local: SocketAddr) -> Self {
        self.local = Some(local);
        self
    }

    /// Bound the connect attempt.
    pub fn with_timeout(mut self, timeout: Timeout) -> io::Result<Self> {
        if timeout.is_cancel() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{timeout:?} is not a connect timeout"),
            ));
        }
        self.timeout = timeout;
        Ok(self)
    }

    /// Bound the connect attempt with a legacy millisecond value.
    pub fn with_timeout_millis(self, millis: i32) -> io::Result<Self> {
        self.with_timeout(Timeout::from_millis(millis)?)
    }

    /// Local address to bind, if any.
    pub fn local_address(&self) -> Option<SocketAddr> {
        self.local
    }

    /// Address to connect to.
    pub fn remote_address(&self) -> SocketAddr {
        self.remote
    }

    /// Connect timeout.
    pub fn timeout(&self) -> Timeout {
        self.timeout
    }

    /// Open the socket and connect it, blocking up to the timeout.
    pub(crate) fn open(&self, default: Option<Duration>) -> io::Result<mio::net::TcpStream> {
        let socket = Socket::new(
            Domain::for_address(self.remote),
            Type::STREAM,
            Some(Protocol::TCP),
        )?;
        if let Some(local) = self.local {
            socket.set_reuse_address(true)?;
            socket.bind(&SockAddr::from(local))?;
        }
        let remote = SockAddr::from(self.remote);
        match self.timeout.resolve(default) {
            Some(timeout) => socket.connect_timeout(&remote, timeout)?,
            None => socket.connect(&remote)?,
        }
        socket.set_nonblocking(true)?;
        let stream: std::net::TcpStream = socket.into();
        Ok(mio::net::TcpStream::from_std(stream))
    }
}

/// Receives the outcome of
/// [`Channel::connect_async`](crate::Channel::connect_async). Runs on a
/// worker thread.
pub trait ConnectCompletedCallback: Send + Sync + 'static {
    /// The connection is up.
    fn complete(&self, conn: ConnectionContext);

    /// The connection could not be established.
    fn error(&self, request: &ConnectRequestContext, error: io::Error);
}

struct FnConnectCallback<C, E> {
    complete: C,
    error: E,
}

impl<C, E> ConnectCompletedCallback for FnConnectCallback<C, E>
where
    C: Fn(ConnectionContext) + Send + Sync + 'static,
    E: Fn(&ConnectRequestContext, io::Error) + Send + Sync + 'static,
{
    fn complete(&self, conn: ConnectionContext) {
        (self.complete)(conn)
    }

    fn error(&self, request: &ConnectRequestContext, error: io::Error) {
        (self.error)(request, error)
    }
}

/// Build a connect callback from a success and a failure closure.
pub fn connect_callback<C, E>(complete: C, error: E) -> Arc<dyn ConnectCompletedCallback>
where
    C: Fn(ConnectionContext) + Send + Sync + 'static,
    E: Fn(&ConnectRequestContext, io::Error) + Send + Sync + 'static,
{
    Arc::new(FnConnectCallback { complete, error })
}

impl fmt::Display for ConnectRequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.local {
            Some(local) => write!(f, "{local} -> {}", self.remote),
            None => write!(f, "-> {}", self.remote),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{io, time::Duration};

    use super::ConnectRequestContext;
    use crate::io::Timeout;

    #[test]
    fn cancel_values_refused() {
        let request = ConnectRequestContext::new("127.0.0.1:80".parse().unwrap());
        for timeout in [Timeout::CancelPrevious, Timeout::AbortAndAttemptBlock] {
            let err = request.clone().with_timeout(timeout).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        }
        assert_eq!(
            request.clone().with_timeout_millis(-2).unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
        let request = request.with_timeout_millis(-1).unwrap();
        assert_eq!(request.timeout(), Timeout::Infinite);
        let request = request.with_timeout(Duration::from_secs(3).into()).unwrap();
        assert_eq!(request.timeout().as_millis(), 3000);
    }
}
