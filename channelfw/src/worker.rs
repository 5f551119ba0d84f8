//! Worker pool running queued completions.

use std::sync::Mutex;

use threadpool::{Builder as ThreadPoolBuilder, ThreadPool as ThreadPoolImpl};

/// A completion ready to run.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Users may implement a WorkerPool and attach it to a channel.
/// We also provide an implementation based on threadpool crate, you can use
/// [`DefaultWorkerPool`].
pub trait WorkerPool: Send + Sync {
    /// The channel calls `schedule_task` for every queued completion.
    /// The impl must execute it now or later, but never on the calling
    /// thread.
    fn schedule_task(&self, task: Task);
}

/// WorkerPool implementation based on threadpool crate.
pub struct DefaultWorkerPool {
    pool: Mutex<ThreadPoolImpl>,
}

impl DefaultWorkerPool {
    /// Create a new DefaultWorkerPool.
    pub fn new(num_threads: usize) -> Self {
        Self::with_name(num_threads, "channelfw-worker")
    }

    /// Create a pool whose threads carry `name`.
    pub fn with_name(num_threads: usize, name: impl Into<String>) -> Self {
        let pool = ThreadPoolBuilder::default()
            .num_threads(num_threads.max(1))
            .thread_name(name.into())
            .build();
        Self {
            pool: Mutex::new(pool),
        }
    }

    /// Number of tasks waiting for a thread.
    pub fn queued_count(&self) -> usize {
        lock!(self.pool).queued_count()
    }
}

impl WorkerPool for DefaultWorkerPool {
    #[inline]
    fn schedule_task(&self, task: Task) {
        lock!(self.pool).execute(task);
    }
}

impl std::fmt::Debug for DefaultWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pool = lock!(self.pool);
        f.debug_struct("DefaultWorkerPool")
            .field("max_count", &pool.max_count())
            .field("active_count", &pool.active_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
    };

    use super::{DefaultWorkerPool, Task, WorkerPool};

    struct NaiveWorkerPool;

    impl WorkerPool for NaiveWorkerPool {
        fn schedule_task(&self, task: Task) {
            thread::spawn(task);
        }
    }

    fn run_on(pool: &dyn WorkerPool) {
        let caller = thread::current().id();
        let (tx, rx) = flume::unbounded();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let tx = tx.clone();
            let hits = hits.clone();
            pool.schedule_task(Box::new(move || {
                hits.fetch_add(1, Ordering::Relaxed);
                tx.send(thread::current().id()).unwrap();
            }));
        }
        for _ in 0..8 {
            assert_ne!(rx.recv().unwrap(), caller);
        }
        assert_eq!(hits.load(Ordering::Relaxed), 8);
    }

    #[test]
    fn default_pool() {
        run_on(&DefaultWorkerPool::new(2));
    }

    #[test]
    fn naive_pool() {
        run_on(&NaiveWorkerPool);
    }
}
