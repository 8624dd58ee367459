//! Shared error type for every primitive in this crate.
//!
//! Every fallible operation returns [`Result<T>`], whose error side carries
//! one of a small, stable set of codes. The codes mirror the POSIX-flavored
//! error space the underlying primitives are modeled on (see each module's
//! doc comments), not `std::io::Error`'s open-ended kind set.

use thiserror::Error;

/// Stable error codes shared across mutex, condvar, barrier, thread, fiber,
/// ghost and pool operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("operation not permitted")]
    NotPermitted,

    #[error("out of memory")]
    NoMem,

    #[error("resource busy")]
    Busy,

    #[error("invalid argument: {0}")]
    InvalidArg(String),

    #[error("deadlock detected")]
    Deadlock,

    #[error("resource temporarily unavailable")]
    Again,

    #[error("operation not supported by this platform")]
    NotSupported,

    #[error("operation timed out")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("thread was never started")]
    NotStarted,

    #[error("thread already finished")]
    Finished,

    #[error("thread has already been joined")]
    Joined,

    #[error("thread has been detached")]
    Detached,

    #[error("operation was cancelled")]
    Cancelled,

    #[error("object is in the wrong state for this operation")]
    InvalidState,
}

impl Error {
    /// The stable integer code for this error, matching the public contract.
    pub fn code(&self) -> i32 {
        match self {
            Error::NotPermitted => 1,
            Error::NoMem => 12,
            Error::Busy => 16,
            Error::InvalidArg(_) => 22,
            Error::Deadlock => 35,
            Error::Again => 11,
            Error::NotSupported => 95,
            Error::Timeout => 110,
            Error::Internal(_) => 199,
            Error::NotStarted => 201,
            Error::Finished => 202,
            Error::Joined => 203,
            Error::Detached => 204,
            Error::Cancelled => 205,
            Error::InvalidState => 206,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::Internal(format!("lock poisoned: {e}"))
    }
}
