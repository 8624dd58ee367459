//! Mutual exclusion lock.
//!
//! Wraps [`std::sync::Mutex`]. `lock`/`try_lock` return an RAII guard whose
//! `Drop` performs the unlock — there is no separate `unlock` call to
//! forget, and no way to unlock a mutex you don't hold.

use std::sync::{self, MutexGuard as StdGuard, TryLockError};

use crate::error::{Error, Result};

/// A mutual-exclusion lock guarding a `T`.
pub struct Mutex<T> {
    inner: sync::Mutex<T>,
}

/// RAII guard returned by [`Mutex::lock`] / [`Mutex::try_lock`].
#[derive(Debug)]
pub struct MutexGuard<'a, T> {
    pub(crate) inner: StdGuard<'a, T>,
}

impl<'a, T> MutexGuard<'a, T> {
    pub(crate) fn from_std(inner: StdGuard<'a, T>) -> Self {
        Self { inner }
    }
}

impl<T> std::ops::Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> std::ops::DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T> Mutex<T> {
    /// Construct and initialize a new mutex guarding `value`.
    pub fn new(value: T) -> Self {
        log::debug!(target: "mutex", "init");
        Self {
            inner: sync::Mutex::new(value),
        }
    }

    /// Acquire the lock, blocking the calling thread until it is available.
    ///
    /// Returns [`Error::Internal`] if a previous holder panicked while
    /// holding the lock (the standard library's poisoning); this crate does
    /// not hide panics from callers.
    pub fn lock(&self) -> Result<MutexGuard<'_, T>> {
        match self.inner.lock() {
            Ok(g) => Ok(MutexGuard { inner: g }),
            Err(e) => {
                log::error!(target: "mutex", "lock: poisoned");
                Err(Error::from(e))
            }
        }
    }

    /// Attempt to acquire the lock without blocking.
    ///
    /// Returns [`Error::Busy`] immediately if another holder has it locked.
    pub fn try_lock(&self) -> Result<MutexGuard<'_, T>> {
        match self.inner.try_lock() {
            Ok(g) => Ok(MutexGuard { inner: g }),
            Err(TryLockError::WouldBlock) => {
                log::warn!(target: "mutex", "try_lock: busy");
                Err(Error::Busy)
            }
            Err(TryLockError::Poisoned(e)) => {
                log::error!(target: "mutex", "try_lock: poisoned");
                Err(Error::from(e))
            }
        }
    }
}

impl<T> Drop for Mutex<T> {
    fn drop(&mut self) {
        log::debug!(target: "mutex", "dispose");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn lock_unlock_roundtrip() {
        let m = Mutex::new(0);
        {
            let mut g = m.lock().unwrap();
            *g += 1;
        }
        assert_eq!(*m.lock().unwrap(), 1);
    }

    #[test]
    fn try_lock_reports_busy_while_held() {
        let m = Mutex::new(());
        let g = m.lock().unwrap();
        assert_eq!(m.try_lock().unwrap_err(), Error::Busy);
        drop(g);
        assert!(m.try_lock().is_ok());
    }

    #[test]
    fn contended_increments_are_exact() {
        let m = Arc::new(Mutex::new(0u64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let m = Arc::clone(&m);
            handles.push(thread::spawn(move || {
                for _ in 0..10_000 {
                    *m.lock().unwrap() += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*m.lock().unwrap(), 80_000);
    }
}
