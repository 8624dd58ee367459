//! Cyclic rendezvous barrier for a fixed number of parties.

use crate::cond::Cond;
use crate::error::{Error, Result};
use crate::mutex::Mutex;

struct State {
    count: usize,
    generation: u64,
    destroyed: bool,
}

/// A barrier that releases all waiters once `threshold` parties have
/// arrived, then (if `cyclic`) immediately starts a new generation.
pub struct Barrier {
    threshold: usize,
    cyclic: bool,
    state: Mutex<State>,
    cond: Cond,
}

impl Barrier {
    /// Construct a barrier for `threshold` parties. `threshold` must be at
    /// least 1.
    pub fn new(threshold: usize, cyclic: bool) -> Result<Self> {
        if threshold == 0 {
            return Err(Error::InvalidArg("barrier threshold must be >= 1".into()));
        }
        log::debug!(target: "barrier", "init threshold={threshold} cyclic={cyclic}");
        Ok(Self {
            threshold,
            cyclic,
            state: Mutex::new(State {
                count: 0,
                generation: 0,
                destroyed: false,
            }),
            cond: Cond::new(),
        })
    }

    /// Arrive at the barrier and block until `threshold` parties have
    /// arrived. Returns `Ok(())` for every caller once released.
    pub fn wait(&self) -> Result<()> {
        self.wait_inner(None)
    }

    /// As [`Barrier::wait`], but gives up and returns [`Error::Timeout`] if
    /// `ms` elapses before release.
    pub fn timed_wait(&self, ms: u64) -> Result<()> {
        self.wait_inner(Some(ms))
    }

    fn wait_inner(&self, timeout_ms: Option<u64>) -> Result<()> {
        let mut guard = self.state.lock()?;
        if guard.destroyed {
            return Err(Error::InvalidArg("barrier destroyed".into()));
        }

        let gen = guard.generation;
        guard.count += 1;

        if guard.count == self.threshold {
            guard.generation += 1;
            guard.count = 0;
            drop(guard);
            self.cond.broadcast();
            log::debug!(target: "barrier", "released generation={gen}");
            return Ok(());
        }

        loop {
            if guard.destroyed {
                return Err(Error::InvalidArg("barrier destroyed".into()));
            }
            if guard.generation != gen {
                return Ok(());
            }
            guard = match timeout_ms {
                None => self.cond.wait(guard)?,
                Some(ms) => {
                    let (guard, result) = self.cond.timed_wait(guard, ms);
                    result?;
                    guard
                }
            };
        }
    }

    /// Forcibly advance the generation, releasing every current waiter with
    /// `Ok(())` regardless of whether `threshold` was reached.
    pub fn reset(&self) -> Result<()> {
        let mut guard = self.state.lock()?;
        guard.generation += 1;
        guard.count = 0;
        drop(guard);
        self.cond.broadcast();
        Ok(())
    }

    /// Permanently disable the barrier, releasing every sleeper with
    /// [`Error::InvalidArg`].
    pub fn destroy(&self) -> Result<()> {
        let mut guard = self.state.lock()?;
        guard.destroyed = true;
        drop(guard);
        self.cond.broadcast();
        log::debug!(target: "barrier", "destroyed");
        Ok(())
    }

    /// Current generation count, for diagnostics and tests.
    pub fn generation(&self) -> Result<u64> {
        Ok(self.state.lock()?.generation)
    }

    /// Whether this barrier automatically starts a new generation after
    /// each release. Advisory: both modes run the same release algorithm;
    /// this only documents caller intent.
    pub fn is_cyclic(&self) -> bool {
        self.cyclic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn three_parties_five_generations() {
        let barrier = Arc::new(Barrier::new(3, true).unwrap());
        let releases = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let b = Arc::clone(&barrier);
            let r = Arc::clone(&releases);
            handles.push(thread::spawn(move || {
                for _ in 0..5 {
                    b.wait().unwrap();
                    r.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(releases.load(Ordering::SeqCst), 15);
        assert_eq!(barrier.generation().unwrap(), 5);
    }

    #[test]
    fn single_party_threshold_one_releases_immediately() {
        let barrier = Barrier::new(1, true).unwrap();
        barrier.wait().unwrap();
        barrier.wait().unwrap();
        assert_eq!(barrier.generation().unwrap(), 2);
    }

    #[test]
    fn timed_wait_times_out_when_short_of_threshold() {
        let barrier = Barrier::new(2, true).unwrap();
        let err = barrier.timed_wait(50).unwrap_err();
        assert_eq!(err, Error::Timeout);
    }

    #[test]
    fn destroy_releases_sleepers_with_invalid_arg() {
        let barrier = Arc::new(Barrier::new(2, true).unwrap());
        let b2 = Arc::clone(&barrier);
        let handle = thread::spawn(move || b2.wait());

        thread::sleep(Duration::from_millis(20));
        barrier.destroy().unwrap();

        let result = handle.join().unwrap();
        assert_eq!(result.unwrap_err(), Error::InvalidArg("barrier destroyed".into()));
        assert_eq!(barrier.wait().unwrap_err(), Error::InvalidArg("barrier destroyed".into()));
    }

    #[test]
    fn zero_threshold_is_rejected() {
        assert!(Barrier::new(0, true).is_err());
    }
}
