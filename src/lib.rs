//! Cross-platform concurrency primitives: OS threads with a tracked
//! lifecycle, a mutex and condition variable, a cyclic barrier, stackful
//! cooperative fibers, a deterministic speculative scheduler (`ghost`), and
//! a bounded worker pool.
//!
//! Every fallible operation returns [`error::Result`]; nothing in this
//! crate panics on contract violations it can detect, and nothing retries
//! internally — see [`error::Error`] for the full code list.

pub mod barrier;
pub mod cond;
pub mod config;
pub mod error;
pub mod fiber;
pub mod ghost;
pub mod mutex;
pub mod os_thread;
pub mod pool;
pub mod thread;

pub use barrier::Barrier;
pub use cond::Cond;
pub use config::Config;
pub use error::{Error, Result};
pub use fiber::{Fiber, FiberId, Suspend};
pub use ghost::{GhostCandidate, GhostId, GhostSystem};
pub use mutex::{Mutex, MutexGuard};
pub use pool::Pool;
pub use thread::{CancelToken, Thread};
