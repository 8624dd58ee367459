//! Bounded worker pool: N threads pulling FIFO tasks off a shared queue.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::thread::Thread;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of worker threads draining a single task queue.
///
/// [`Pool::submit`]'s FIFO order is the order tasks enter the queue, not the
/// order they finish — workers race to dequeue and may complete out of
/// order.
pub struct Pool {
    workers: Vec<Thread<()>>,
    sender: Option<Sender<Task>>,
    pending: Arc<AtomicUsize>,
    stopped: Arc<AtomicBool>,
}

impl Pool {
    /// Spawn a pool with `worker_count` threads.
    pub fn new(worker_count: usize) -> Result<Self> {
        if worker_count == 0 {
            return Err(Error::InvalidArg("pool needs at least one worker".into()));
        }
        let (sender, receiver): (Sender<Task>, Receiver<Task>) = channel::unbounded();
        let pending = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let receiver = receiver.clone();
            let pending = Arc::clone(&pending);
            workers.push(Thread::spawn(move |_cancel| {
                while let Ok(task) = receiver.recv() {
                    task();
                    pending.fetch_sub(1, Ordering::SeqCst);
                }
            })?);
        }

        log::debug!(target: "pool", "created with {worker_count} workers");
        Ok(Self {
            workers,
            sender: Some(sender),
            pending,
            stopped,
        })
    }

    /// Spawn a pool sized from [`Config::pool_default_workers`].
    pub fn new_default(config: &Config) -> Result<Self> {
        Self::new(config.pool_default_workers)
    }

    /// Enqueue a task. Rejected with [`Error::Cancelled`] once the pool has
    /// started shutting down.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(Error::Cancelled);
        }
        let sender = self
            .sender
            .as_ref()
            .ok_or(Error::Cancelled)?;
        self.pending.fetch_add(1, Ordering::SeqCst);
        sender.send(Box::new(task)).map_err(|_| Error::Cancelled)?;
        Ok(())
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Best-effort poll for queue drain. Not a happens-before boundary: a
    /// task observed complete here may still be finishing side effects a
    /// caller relies on unless the task itself synchronizes that.
    pub fn wait(&self) {
        while self.pending.load(Ordering::SeqCst) != 0 {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    /// Stop accepting new tasks, let workers drain whatever is queued, then
    /// join every worker.
    pub fn destroy(&mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        self.sender.take();
        log::debug!(target: "pool", "destroying");
        for worker in self.workers.iter_mut() {
            worker.join()?;
        }
        Ok(())
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if self.sender.is_some() {
            let _ = self.shutdown();
        }
    }
}
