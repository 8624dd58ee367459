//! OS-thread wrapper with an explicit lifecycle and cooperative cancellation.
//!
//! States: `uninit -> started -> finished -> joined | detached -> disposed`.
//! Unlike a bare `std::thread::JoinHandle`, this type tracks whether it has
//! already been joined or detached so that a second `join`/`detach` reports
//! a typed error instead of panicking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::os_thread::Priority;

enum Handle<T> {
    Joinable(std::thread::JoinHandle<T>),
    Detached,
    Gone,
}

/// A cooperative-cancellation flag shared with a thread's entry closure.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Request cancellation. Purely advisory: the entry must poll
    /// [`CancelToken::is_cancelled`] itself; nothing forcibly interrupts it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A thread with tracked lifecycle state and a typed return value.
pub struct Thread<T> {
    handle: Handle<T>,
    finished: Arc<AtomicBool>,
    cancel: CancelToken,
    started_at: Instant,
    finished_at: Arc<Mutex<Option<Instant>>>,
    priority: Priority,
    affinity: Option<usize>,
}

impl<T: Send + 'static> Thread<T> {
    /// Spawn a new thread running `entry`. `entry` receives a
    /// [`CancelToken`] it may poll to cooperate with [`Thread::cancel`].
    pub fn spawn<F>(entry: F) -> Result<Self>
    where
        F: FnOnce(CancelToken) -> T + Send + 'static,
    {
        let finished = Arc::new(AtomicBool::new(false));
        let finished_worker = Arc::clone(&finished);
        let finished_at = Arc::new(Mutex::new(None));
        let finished_at_worker = Arc::clone(&finished_at);
        let cancel = CancelToken::new();
        let cancel_worker = cancel.clone();

        let builder = std::thread::Builder::new();
        let join_handle = builder
            .spawn(move || {
                let result = entry(cancel_worker);
                *finished_at_worker.lock().unwrap() = Some(Instant::now());
                finished_worker.store(true, Ordering::SeqCst);
                result
            })
            .map_err(|e| Error::Internal(format!("spawn failed: {e}")))?;

        log::debug!(target: "thread", "started");
        Ok(Self {
            handle: Handle::Joinable(join_handle),
            finished,
            cancel,
            started_at: Instant::now(),
            finished_at,
            priority: Priority::Normal,
            affinity: None,
        })
    }

    /// Whether the entry has returned (regardless of join/detach state).
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// `started && !finished`.
    pub fn is_running(&self) -> bool {
        matches!(self.handle, Handle::Joinable(_)) && !self.is_finished()
    }

    /// Block until the thread finishes and return its result.
    ///
    /// A second call, or a call after [`Thread::detach`], returns
    /// [`Error::Detached`].
    pub fn join(&mut self) -> Result<T> {
        match std::mem::replace(&mut self.handle, Handle::Gone) {
            Handle::Joinable(h) => h.join().map_err(|_| {
                log::error!(target: "thread", "join: entry panicked");
                Error::Internal("thread panicked".into())
            }),
            Handle::Detached => {
                self.handle = Handle::Detached;
                Err(Error::Detached)
            }
            Handle::Gone => Err(Error::Detached),
        }
    }

    /// Release ownership of the underlying OS thread; it continues running
    /// in the background. A subsequent `join` returns [`Error::Detached`].
    pub fn detach(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.handle, Handle::Gone) {
            Handle::Joinable(_) => {
                self.handle = Handle::Detached;
                Ok(())
            }
            Handle::Detached => {
                self.handle = Handle::Detached;
                Err(Error::Detached)
            }
            Handle::Gone => Err(Error::Detached),
        }
    }

    /// Request cooperative cancellation; has no effect unless the entry
    /// polls [`CancelToken::is_cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wall-clock instant the thread was spawned.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Wall-clock instant the entry returned, if it has.
    pub fn finished_at(&self) -> Option<Instant> {
        *self.finished_at.lock().unwrap()
    }

    /// Duration the thread has run for. Once finished, this is a fixed
    /// value (end timestamp minus start timestamp) rather than growing with
    /// the time since completion.
    pub fn elapsed(&self) -> Duration {
        match self.finished_at() {
            Some(end) => end.duration_since(self.started_at),
            None => self.started_at.elapsed(),
        }
    }

    /// Advisory scheduling hint; never consulted internally.
    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Advisory CPU-affinity hint (a core index); never consulted
    /// internally. Platforms with no affinity concept are fully conformant
    /// simply by ignoring it, matching the source's "can be added here"
    /// treatment of platform-specific priority/affinity.
    pub fn set_affinity(&mut self, core: Option<usize>) {
        self.affinity = core;
    }

    pub fn affinity(&self) -> Option<usize> {
        self.affinity
    }
}

impl<T> Drop for Thread<T> {
    fn drop(&mut self) {
        // A joinable handle that is dropped without join/detach would leak
        // the OS thread silently; wait for it to finish instead, matching
        // the "dispose waits for finish" rule.
        if let Handle::Joinable(h) = std::mem::replace(&mut self.handle, Handle::Gone) {
            let _ = h.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_returns_the_entry_value() {
        let mut t = Thread::spawn(|_| 42).unwrap();
        assert_eq!(t.join().unwrap(), 42);
    }

    #[test]
    fn second_join_reports_detached() {
        let mut t = Thread::spawn(|_| ()).unwrap();
        t.join().unwrap();
        assert_eq!(t.join().unwrap_err(), Error::Detached);
    }

    #[test]
    fn join_after_detach_reports_detached() {
        let mut t = Thread::spawn(|_| ()).unwrap();
        t.detach().unwrap();
        assert_eq!(t.join().unwrap_err(), Error::Detached);
    }

    #[test]
    fn second_detach_reports_detached() {
        let mut t = Thread::spawn(|_| ()).unwrap();
        t.detach().unwrap();
        assert_eq!(t.detach().unwrap_err(), Error::Detached);
    }

    #[test]
    fn cancellation_is_cooperative() {
        let t = Thread::spawn(|token| {
            while !token.is_cancelled() {
                std::thread::yield_now();
            }
            "stopped"
        })
        .unwrap();
        t.cancel();
        let mut t = t;
        assert_eq!(t.join().unwrap(), "stopped");
    }

    #[test]
    fn affinity_defaults_to_none_and_is_advisory() {
        let mut t = Thread::spawn(|_| ()).unwrap();
        assert_eq!(t.affinity(), None);
        t.set_affinity(Some(2));
        assert_eq!(t.affinity(), Some(2));
        t.join().unwrap();
    }

    #[test]
    fn elapsed_freezes_once_the_thread_has_finished() {
        let mut t = Thread::spawn(|_| {
            std::thread::sleep(std::time::Duration::from_millis(20));
        })
        .unwrap();
        t.join().unwrap();
        assert!(t.finished_at().is_some());
        let first = t.elapsed();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let second = t.elapsed();
        assert_eq!(first, second);
    }

    #[test]
    fn dropping_a_joinable_thread_waits_for_completion() {
        let flag = Arc::new(AtomicBool::new(false));
        let f2 = Arc::clone(&flag);
        let t = Thread::spawn(move |_| {
            std::thread::sleep(std::time::Duration::from_millis(20));
            f2.store(true, Ordering::SeqCst);
        })
        .unwrap();
        drop(t);
        assert!(flag.load(Ordering::SeqCst));
    }
}
