use std::{fmt, io, sync::Arc, time::Duration};

use crate::{
    worker::{DefaultWorkerPool, WorkerPool},
    Channel,
};

/// Settings a channel applies to the connections it owns.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ChannelConfig {
    /// Applied to reads issued with [`Timeout::UseDefault`](crate::Timeout::UseDefault).
    /// `None` waits indefinitely.
    pub read_timeout: Option<Duration>,
    /// Applied to writes issued with `Timeout::UseDefault`.
    pub write_timeout: Option<Duration>,
    /// Applied to connects issued with `Timeout::UseDefault`.
    pub connect_timeout: Option<Duration>,
    /// Initial just-in-time buffer size of every read side.
    pub jit_allocate_size: usize,
    /// Whether new connections disable Nagle's algorithm.
    pub tcp_nodelay: bool,
    /// Whether acceptors set `SO_REUSEADDR` before binding.
    pub reuse_address: bool,
    /// Pending connection queue length of acceptors.
    pub listen_backlog: i32,
}

// ===== basic builder structure definition =====

/// Channel builder
pub struct ChannelBuilder {
    config: ChannelConfig,
    // worker threads of the default pool
    worker_threads: usize,
    // user supplied pool, replaces the default one
    pool: Option<Arc<dyn WorkerPool>>,
    // readiness events taken per poll
    event_capacity: usize,
    thread_name: String,
}

impl Default for ChannelBuilder {
    /// Create a default channel builder
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelBuilder {
    const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
    const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(60);
    const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    const DEFAULT_JIT_SIZE: usize = 8 * 1024;
    const DEFAULT_EVENTS: usize = 1024;
    const MIN_EVENTS: usize = 64;
    const DEFAULT_WORKERS: usize = 4;
    const DEFAULT_BACKLOG: i32 = 1024;

    /// Create a default channel builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ChannelConfig {
                read_timeout: Some(Self::DEFAULT_READ_TIMEOUT),
                write_timeout: Some(Self::DEFAULT_WRITE_TIMEOUT),
                connect_timeout: Some(Self::DEFAULT_CONNECT_TIMEOUT),
                jit_allocate_size: Self::DEFAULT_JIT_SIZE,
                tcp_nodelay: true,
                reuse_address: true,
                listen_backlog: Self::DEFAULT_BACKLOG,
            },
            worker_threads: Self::DEFAULT_WORKERS,
            pool: None,
            event_capacity: Self::DEFAULT_EVENTS,
            thread_name: "channelfw".to_string(),
        }
    }

    /// Threads of the default worker pool. Ignored when a pool is attached.
    #[must_use]
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// Run completions on `pool` instead of a pool of our own.
    #[must_use]
    pub fn attach_worker_pool(mut self, pool: Arc<dyn WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Default read timeout, `None` for no timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.config.read_timeout = timeout.into();
        self
    }

    /// Default write timeout, `None` for no timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.config.write_timeout = timeout.into();
        self
    }

    /// Default connect timeout, `None` for no timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.config.connect_timeout = timeout.into();
        self
    }

    /// Just-in-time buffer size given to new connections; 0 disables it.
    #[must_use]
    pub fn jit_allocate_size(mut self, size: usize) -> Self {
        self.config.jit_allocate_size = size;
        self
    }

    /// Set TCP_NODELAY on new connections.
    #[must_use]
    pub fn tcp_nodelay(mut self, nodelay: bool) -> Self {
        self.config.tcp_nodelay = nodelay;
        self
    }

    /// Set SO_REUSEADDR on the sockets acceptors listen on.
    #[must_use]
    pub fn reuse_address(mut self, reuse: bool) -> Self {
        self.config.reuse_address = reuse;
        self
    }

    /// Backlog passed to `listen`, at least 1.
    #[must_use]
    pub fn listen_backlog(mut self, backlog: i32) -> Self {
        self.config.listen_backlog = backlog.max(1);
        self
    }

    /// Readiness events handled per poll, min 64 and default 1024.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(Self::MIN_EVENTS);
        self
    }

    /// Name of the driver thread; worker threads get a `-worker` suffix.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Start the driver thread and the worker pool.
    pub fn build(self) -> io::Result<Channel> {
        let pool = match self.pool {
            Some(pool) => pool,
            None => Arc::new(DefaultWorkerPool::with_name(
                self.worker_threads,
                format!("{}-worker", self.thread_name),
            )),
        };
        Channel::start(self.config, pool, self.event_capacity, self.thread_name)
    }
}

impl fmt::Debug for ChannelBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelBuilder")
            .field("config", &self.config)
            .field("worker_threads", &self.worker_threads)
            .field("attached_pool", &self.pool.is_some())
            .field("event_capacity", &self.event_capacity)
            .field("thread_name", &self.thread_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::ChannelBuilder;

    #[test]
    fn defaults_and_overrides() {
        let builder = ChannelBuilder::new();
        assert_eq!(builder.config.read_timeout, Some(Duration::from_secs(60)));
        assert_eq!(builder.config.connect_timeout, Some(Duration::from_secs(30)));
        assert_eq!(builder.config.jit_allocate_size, 8192);
        assert!(builder.config.reuse_address);
        assert_eq!(builder.config.listen_backlog, 1024);

        let builder = builder
            .read_timeout(None)
            .write_timeout(Duration::from_millis(5))
            .event_capacity(1)
            .worker_threads(0)
            .reuse_address(false)
            .listen_backlog(-5);
        assert_eq!(builder.config.read_timeout, None);
        assert_eq!(builder.config.write_timeout, Some(Duration::from_millis(5)));
        assert_eq!(builder.event_capacity, 64);
        assert_eq!(builder.worker_threads, 1);
        assert!(!builder.config.reuse_address);
        assert_eq!(builder.config.listen_backlog, 1);
    }
}
