//! Abstract OS-thread adapter.
//!
//! Every higher component (`thread`, `pool`) reaches the operating system
//! only through this narrow surface instead of branching on platform
//! directly. There is a single implementation backed by `std::thread`; the
//! trait exists so the branch point is named once rather than scattered.

use std::time::Duration;

/// Coarse, advisory thread priority bucket.
///
/// Never consulted by scheduling logic in this crate; platforms that ignore
/// priority hints entirely (most of them, for ordinary threads) are fully
/// conformant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    Lowest,
    BelowNormal,
    #[default]
    Normal,
    AboveNormal,
    Highest,
}

/// Yield the remainder of the current timeslice to other runnable threads.
pub fn os_yield() {
    std::thread::yield_now();
}

/// Block the calling thread for approximately `ms` milliseconds.
pub fn os_sleep_ms(ms: u64) {
    std::thread::sleep(Duration::from_millis(ms));
}

/// A stable identifier for the calling OS thread.
pub fn os_current_id() -> u64 {
    // std::thread::ThreadId has no stable numeric representation; hash it
    // into one so callers get a cheap, comparable, copyable value.
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}
