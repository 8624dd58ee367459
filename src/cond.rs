//! Condition variable, always paired with a caller-supplied [`Mutex`].
//!
//! `wait` atomically releases the mutex and suspends, then reacquires it
//! before returning — the guard type threads through the call exactly the
//! way it does for [`std::sync::Condvar`], which is the idiomatic way to
//! express that contract without unsafe pointer juggling. Spurious wakeups
//! are possible; callers must re-check their predicate in a loop.

use std::sync::Condvar as StdCondvar;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::mutex::MutexGuard;

/// A condition variable.
pub struct Cond {
    inner: StdCondvar,
    waiters: std::sync::atomic::AtomicI64,
}

impl Default for Cond {
    fn default() -> Self {
        Self::new()
    }
}

impl Cond {
    /// Construct and initialize a new condition variable.
    pub fn new() -> Self {
        log::debug!(target: "cond", "init");
        Self {
            inner: StdCondvar::new(),
            waiters: std::sync::atomic::AtomicI64::new(0),
        }
    }

    /// Advisory count of threads currently blocked in [`Cond::wait`] or
    /// [`Cond::timed_wait`]. Informational only; never used for correctness.
    pub fn waiter_count(&self) -> i64 {
        self.waiters.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Atomically release `guard`'s mutex and block until signalled.
    /// Reacquires the mutex before returning. May wake spuriously.
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> Result<MutexGuard<'a, T>> {
        self.waiters
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let result = self.inner.wait(guard.inner);
        self.waiters
            .fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
        match result {
            Ok(std_guard) => Ok(MutexGuard::from_std(std_guard)),
            Err(e) => {
                log::error!(target: "cond", "wait: poisoned");
                Err(Error::Internal(format!("lock poisoned: {e}")))
            }
        }
    }

    /// As [`Cond::wait`], but gives up after `ms` elapses. The deadline is
    /// computed from the wall clock at entry.
    ///
    /// Unlike `wait`, the mutex is always reacquired before this returns —
    /// on timeout as much as on success — so the guard is handed back
    /// alongside the outcome rather than only on the `Ok` path. A bare
    /// `Result<MutexGuard<'_, T>>` can't express "timed out but still
    /// holding the lock", which is why the return type is a pair instead.
    pub fn timed_wait<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        ms: u64,
    ) -> (MutexGuard<'a, T>, Result<()>) {
        self.waiters
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let result = self
            .inner
            .wait_timeout(guard.inner, Duration::from_millis(ms));
        self.waiters
            .fetch_sub(1, std::sync::atomic::Ordering::Relaxed);
        match result {
            Ok((std_guard, timeout_result)) => {
                let guard = MutexGuard::from_std(std_guard);
                if timeout_result.timed_out() {
                    (guard, Err(Error::Timeout))
                } else {
                    (guard, Ok(()))
                }
            }
            Err(poisoned) => {
                log::error!(target: "cond", "timed_wait: poisoned");
                let (std_guard, _) = poisoned.into_inner();
                let guard = MutexGuard::from_std(std_guard);
                (guard, Err(Error::Internal("lock poisoned".into())))
            }
        }
    }

    /// Wake at least one waiter, if any.
    pub fn signal(&self) {
        self.inner.notify_one();
    }

    /// Wake every current waiter.
    pub fn broadcast(&self) {
        self.inner.notify_all();
    }
}

impl Drop for Cond {
    fn drop(&mut self) {
        log::debug!(target: "cond", "dispose");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutex::Mutex;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn signal_wakes_a_waiting_thread() {
        let mutex = Arc::new(Mutex::new(false));
        let cond = Arc::new(Cond::new());

        let m2 = Arc::clone(&mutex);
        let c2 = Arc::clone(&cond);
        let handle = thread::spawn(move || {
            let mut guard = m2.lock().unwrap();
            while !*guard {
                guard = c2.wait(guard).unwrap();
            }
        });

        thread::sleep(Duration::from_millis(20));
        {
            let mut guard = mutex.lock().unwrap();
            *guard = true;
        }
        cond.signal();
        handle.join().unwrap();
    }

    #[test]
    fn timed_wait_times_out_but_still_holds_the_mutex() {
        let mutex = Mutex::new(());
        let cond = Cond::new();
        let guard = mutex.lock().unwrap();
        let start = Instant::now();
        let (guard, result) = cond.timed_wait(guard, 50);
        assert_eq!(result.unwrap_err(), Error::Timeout);
        assert!(start.elapsed() >= Duration::from_millis(45));

        // The guard we got back still holds the lock: a concurrent
        // try_lock must observe it as busy until we drop it.
        assert_eq!(mutex.try_lock().unwrap_err(), Error::Busy);
        drop(guard);
        assert!(mutex.try_lock().is_ok());
    }

    #[test]
    fn broadcast_wakes_every_waiter() {
        let mutex = Arc::new(Mutex::new(0u32));
        let cond = Arc::new(Cond::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let m = Arc::clone(&mutex);
            let c = Arc::clone(&cond);
            handles.push(thread::spawn(move || {
                let mut guard = m.lock().unwrap();
                while *guard == 0 {
                    guard = c.wait(guard).unwrap();
                }
            }));
        }
        thread::sleep(Duration::from_millis(20));
        *mutex.lock().unwrap() = 1;
        cond.broadcast();
        for h in handles {
            h.join().unwrap();
        }
    }
}
