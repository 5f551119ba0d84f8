use std::{
    fmt, io,
    net::ToSocketAddrs,
    sync::Arc,
    thread::{self, JoinHandle},
};

use tracing::{debug, error};

use crate::{
    builder::{ChannelBuilder, ChannelConfig},
    driver::{Command, Driver, Handle},
    net::{
        Acceptor, ConnectCompletedCallback, ConnectRequestContext, ConnectionContext,
        ConnectionCore,
    },
    worker::WorkerPool,
};

/// Everything a connection needs from its channel.
pub(crate) struct ChannelShared {
    pub(crate) config: ChannelConfig,
    pub(crate) driver: Handle,
    pub(crate) pool: Arc<dyn WorkerPool>,
}

/// A transport channel: one driver thread, a worker pool and the settings
/// shared by every connection it establishes.
///
/// Dropping the channel stops the driver. Requests still outstanding then
/// fail with `NotConnected`.
pub struct Channel {
    shared: Arc<ChannelShared>,
    driver_thread: Option<JoinHandle<()>>,
}

impl Channel {
    /// Start building a channel.
    #[must_use]
    pub fn builder() -> ChannelBuilder {
        ChannelBuilder::new()
    }

    pub(crate) fn start(
        config: ChannelConfig,
        pool: Arc<dyn WorkerPool>,
        event_capacity: usize,
        thread_name: String,
    ) -> io::Result<Self> {
        let (driver, handle) = Driver::new(event_capacity)?;
        let driver_thread = thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                if let Err(e) = driver.run() {
                    error!(error = %e, "driver stopped");
                }
            })?;
        debug!(?config, "channel started");
        Ok(Self {
            shared: Arc::new(ChannelShared {
                config,
                driver: handle,
                pool,
            }),
            driver_thread: Some(driver_thread),
        })
    }

    /// Settings of this channel.
    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }

    /// Establish an outbound connection, blocking up to the request's
    /// timeout.
    pub fn connect(&self, request: &ConnectRequestContext) -> io::Result<ConnectionContext> {
        debug!(%request, "connecting");
        let stream = request.open(self.shared.config.connect_timeout)?;
        let core = ConnectionCore::establish(self.shared.clone(), stream)?;
        Ok(ConnectionContext::new(core))
    }

    /// Establish an outbound connection on a worker thread and report to
    /// `callback`.
    pub fn connect_async(
        &self,
        request: ConnectRequestContext,
        callback: Arc<dyn ConnectCompletedCallback>,
    ) {
        let shared = self.shared.clone();
        self.shared.pool.schedule_task(Box::new(move || {
            debug!(%request, "connecting");
            let result = request
                .open(shared.config.connect_timeout)
                .and_then(|stream| ConnectionCore::establish(shared, stream));
            match result {
                Ok(core) => callback.complete(ConnectionContext::new(core)),
                Err(e) => callback.error(&request, e),
            }
        }));
    }

    /// Adopt a connected stream, e.g. one accepted elsewhere.
    pub fn register(&self, stream: std::net::TcpStream) -> io::Result<ConnectionContext> {
        stream.set_nonblocking(true)?;
        let core =
            ConnectionCore::establish(self.shared.clone(), mio::net::TcpStream::from_std(stream))?;
        Ok(ConnectionContext::new(core))
    }

    /// Listen on `addr` with the channel's address reuse and backlog
    /// settings. Accepted connections belong to this channel.
    pub fn bind(&self, addr: impl ToSocketAddrs) -> io::Result<Acceptor> {
        Acceptor::bind(self.shared.clone(), addr)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if self.shared.driver.send(Command::Shutdown).is_err() {
            debug!("driver already stopped");
        }
        if let Some(thread) = self.driver_thread.take() {
            if thread.join().is_err() {
                error!("driver thread panicked");
            }
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("config", &self.shared.config)
            .finish()
    }
}
