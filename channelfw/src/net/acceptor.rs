use std::{
    fmt, io,
    net::{SocketAddr, ToSocketAddrs},
    sync::Arc,
};

use tracing::debug;

use super::{ConnectionContext, ConnectionCore};
use crate::channel::ChannelShared;

/// Inbound side of a channel: accepts connections on a bound address.
pub struct Acceptor {
    listener: std::net::TcpListener,
    shared: Arc<ChannelShared>,
}

impl Acceptor {
    pub(crate) fn bind(shared: Arc<ChannelShared>, addr: impl ToSocketAddrs) -> io::Result<Self> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty address"))?;

        let config = &shared.config;
        let socket = socket2::Socket::new(
            socket2::Domain::for_address(addr),
            socket2::Type::STREAM,
            Some(socket2::Protocol::TCP),
        )?;
        socket.set_reuse_address(config.reuse_address)?;
        socket.bind(&addr.into())?;
        socket.listen(config.listen_backlog)?;

        let listener: std::net::TcpListener = socket.into();
        debug!(
            local = %listener.local_addr()?,
            backlog = config.listen_backlog,
            "listening"
        );
        Ok(Self { listener, shared })
    }

    /// Block until a peer connects.
    pub fn accept(&self) -> io::Result<ConnectionContext> {
        let (stream, remote) = self.listener.accept()?;
        debug!(%remote, "accepted");
        stream.set_nonblocking(true)?;
        let core = ConnectionCore::establish(
            self.shared.clone(),
            mio::net::TcpStream::from_std(stream),
        )?;
        Ok(ConnectionContext::new(core))
    }

    /// Address the acceptor listens on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl fmt::Debug for Acceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acceptor")
            .field("local", &self.listener.local_addr().ok())
            .finish()
    }
}
