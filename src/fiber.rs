//! Stackful cooperative fibers.
//!
//! A fiber's "stack" is the real call stack of a dedicated, parked OS
//! thread; `resume`/`yield_to` exchange control through a `Mutex`+`Condvar`
//! handshake instead of swapping CPU registers directly. This reproduces
//! suspend-only-at-resume-points semantics portably, at the cost of one
//! parked OS thread per live fiber — a deliberate trade-off against writing
//! unverified per-architecture assembly context switches.

use std::cell::RefCell;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::error::{Error, Result};

#[derive(PartialEq, Eq)]
enum Exchange {
    Idle,
    ResumeWith,
    SuspendWith,
    Exiting,
}

struct Shared {
    state: Mutex<Exchange>,
    cond: Condvar,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(Exchange::Idle),
            cond: Condvar::new(),
        }
    }
}

thread_local! {
    static CURRENT: RefCell<Vec<FiberId>> = const { RefCell::new(Vec::new()) };
}

/// Opaque identifier for a fiber, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiberId(usize);

static NEXT_ID: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(1);

fn next_id() -> FiberId {
    FiberId(NEXT_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
}

/// Handed to a fiber's entry closure so it can yield control back to
/// whoever last resumed it.
pub struct Suspend {
    shared: Arc<Shared>,
}

impl Suspend {
    /// Yield control back to the resumer and block until resumed again.
    pub fn suspend(&self) {
        let mut guard = self.shared.state.lock().unwrap();
        *guard = Exchange::SuspendWith;
        self.shared.cond.notify_all();
        while !matches!(*guard, Exchange::ResumeWith | Exchange::Exiting) {
            guard = self.shared.cond.wait(guard).unwrap();
        }
        if matches!(*guard, Exchange::Exiting) {
            // Torn down without being resumed again; unwind the worker
            // thread instead of running further user code.
            drop(guard);
            std::panic::resume_unwind(Box::new(FiberTornDown));
        }
    }
}

struct FiberTornDown;

/// A cooperative fiber. Created via [`Fiber::create`]; switched to via
/// [`Fiber::resume`] (equivalently [`Fiber::yield_to`] from the other
/// side — the operations are identical, named for caller intent).
pub struct Fiber {
    id: FiberId,
    shared: Arc<Shared>,
    finished: Arc<std::sync::atomic::AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Fiber {
    /// Record the current OS thread's execution context as the "main"
    /// fiber. Must be called once per OS thread before any `create`/
    /// `resume` on that thread.
    pub fn init_self() -> FiberId {
        let id = next_id();
        CURRENT.with(|c| c.borrow_mut().push(id));
        id
    }

    /// Create a new fiber. `entry` runs on a dedicated parked thread once
    /// the fiber is first resumed, and may call [`Suspend::suspend`] to
    /// yield back to its resumer. Its return marks the fiber finished.
    /// `stack_size` sizes that thread's stack.
    pub fn create<F>(entry: F, stack_size: usize) -> Result<Self>
    where
        F: FnOnce(&Suspend) + Send + 'static,
    {
        let id = next_id();
        let shared = Arc::new(Shared::new());
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let shared_worker = Arc::clone(&shared);
        let finished_worker = Arc::clone(&finished);

        let worker = std::thread::Builder::new()
            .stack_size(stack_size)
            .spawn(move || {
                {
                    let mut guard = shared_worker.state.lock().unwrap();
                    while !matches!(*guard, Exchange::ResumeWith) {
                        guard = shared_worker.cond.wait(guard).unwrap();
                    }
                }

                CURRENT.with(|c| c.borrow_mut().push(id));
                let suspend = Suspend {
                    shared: Arc::clone(&shared_worker),
                };
                let ran = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    entry(&suspend);
                }));
                CURRENT.with(|c| {
                    c.borrow_mut().pop();
                });

                if ran.is_err() {
                    // Either a genuine panic, or the teardown unwind from
                    // Suspend::suspend; either way the worker exits without
                    // signalling SuspendWith again.
                }

                finished_worker.store(true, std::sync::atomic::Ordering::SeqCst);
                let mut guard = shared_worker.state.lock().unwrap();
                *guard = Exchange::Exiting;
                shared_worker.cond.notify_all();
            })
            .map_err(|e| Error::Internal(format!("fiber spawn failed: {e}")))?;

        log::debug!(target: "fiber", "create id={}", id.0);
        Ok(Self {
            id,
            shared,
            finished,
            worker: Some(worker),
        })
    }

    pub fn id(&self) -> FiberId {
        self.id
    }

    /// Whether this fiber's entry has returned.
    pub fn finished(&self) -> bool {
        self.finished.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Transfer control to this fiber until it suspends or returns.
    ///
    /// Rejects resuming a finished fiber with [`Error::InvalidState`].
    pub fn resume(&mut self) -> Result<()> {
        if self.finished() {
            return Err(Error::InvalidState);
        }
        CURRENT.with(|c| c.borrow_mut().push(self.id));
        {
            let mut guard = self.shared.state.lock().unwrap();
            *guard = Exchange::ResumeWith;
            self.shared.cond.notify_all();
            while !matches!(*guard, Exchange::SuspendWith | Exchange::Exiting) {
                guard = self.shared.cond.wait(guard).unwrap();
            }
        }
        CURRENT.with(|c| {
            c.borrow_mut().pop();
        });
        Ok(())
    }

    /// Identical to [`Fiber::resume`]; named separately so call sites can
    /// express "yield control to" intent at a suspension point.
    pub fn yield_to(&mut self) -> Result<()> {
        self.resume()
    }

    /// The fiber active on the calling OS thread, if any.
    pub fn current() -> Option<FiberId> {
        CURRENT.with(|c| c.borrow().last().copied())
    }
}

impl Drop for Fiber {
    fn drop(&mut self) {
        // Disposing a still-running (suspended, not finished) fiber tears
        // down its worker thread via the Exiting signal rather than
        // leaking it; a fiber that never ran has no worker to signal.
        if let Some(worker) = self.worker.take() {
            if !self.finished() {
                let mut guard = self.shared.state.lock().unwrap();
                *guard = Exchange::Exiting;
                self.shared.cond.notify_all();
            }
            let _ = worker.join();
        }
        log::debug!(target: "fiber", "dispose id={}", self.id.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn ping_pong_interleaves_in_order() {
        Fiber::init_self();
        let log = Arc::new(StdMutex::new(Vec::<&'static str>::new()));
        let log_entry = Arc::clone(&log);

        let mut fiber = Fiber::create(
            move |suspend| {
                log_entry.lock().unwrap().push("1");
                suspend.suspend();
                log_entry.lock().unwrap().push("3");
            },
            64 * 1024,
        )
        .unwrap();

        fiber.resume().unwrap();
        log.lock().unwrap().push("2");
        fiber.resume().unwrap();

        assert!(fiber.finished());
        assert_eq!(*log.lock().unwrap(), vec!["1", "2", "3"]);
    }

    #[test]
    fn current_reflects_active_fiber() {
        Fiber::init_self();
        let observed = Arc::new(StdMutex::new(None));
        let observed_entry = Arc::clone(&observed);

        let mut fiber = Fiber::create(
            move |_| {
                *observed_entry.lock().unwrap() = Fiber::current();
            },
            64 * 1024,
        )
        .unwrap();
        let id = fiber.id();
        fiber.resume().unwrap();

        assert_eq!(*observed.lock().unwrap(), Some(id));
    }

    #[test]
    fn resuming_a_finished_fiber_is_rejected() {
        Fiber::init_self();
        let mut fiber = Fiber::create(|_| {}, 64 * 1024).unwrap();
        fiber.resume().unwrap();
        assert!(fiber.finished());
        assert_eq!(fiber.resume().unwrap_err(), Error::InvalidState);
    }

    #[test]
    fn dropping_a_suspended_fiber_tears_down_its_worker() {
        Fiber::init_self();
        let mut fiber = Fiber::create(
            |suspend| {
                suspend.suspend();
            },
            64 * 1024,
        )
        .unwrap();
        fiber.resume().unwrap();
        assert!(!fiber.finished());
        drop(fiber);
    }
}
