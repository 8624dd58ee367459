use anyhow::{Context, Result};

/// Library-wide tunables, read once at process start.
///
/// Nothing here affects an already-constructed primitive; each field is
/// only consulted as a *default* by the constructor that needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Worker count used by [`crate::pool::Pool::new_default`].
    pub pool_default_workers: usize,
    /// Stack size handed to [`crate::fiber::Fiber::create`] when the caller
    /// doesn't request one explicitly.
    pub fiber_default_stack_size: usize,
    /// Capacity of a [`crate::ghost::GhostSystem`]'s ledger.
    pub ghost_ledger_capacity: usize,
    /// Capacity of a [`crate::ghost::GhostSystem`]'s scheduler queue.
    pub ghost_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_default_workers: 4,
            fiber_default_stack_size: 64 * 1024,
            ghost_ledger_capacity: 8192,
            ghost_queue_capacity: 512,
        }
    }
}

impl Config {
    /// Build a `Config` from environment variables, falling back to
    /// [`Config::default`] for anything unset.
    ///
    /// Recognized variables: `POOL_DEFAULT_WORKERS`, `FIBER_DEFAULT_STACK_SIZE`,
    /// `GHOST_LEDGER_CAPACITY`, `GHOST_QUEUE_CAPACITY`.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("POOL_DEFAULT_WORKERS") {
            cfg.pool_default_workers = parse_positive_usize(&v).context("POOL_DEFAULT_WORKERS")?;
        }
        if let Ok(v) = std::env::var("FIBER_DEFAULT_STACK_SIZE") {
            cfg.fiber_default_stack_size =
                parse_positive_usize(&v).context("FIBER_DEFAULT_STACK_SIZE")?;
        }
        if let Ok(v) = std::env::var("GHOST_LEDGER_CAPACITY") {
            cfg.ghost_ledger_capacity =
                parse_positive_usize(&v).context("GHOST_LEDGER_CAPACITY")?;
        }
        if let Ok(v) = std::env::var("GHOST_QUEUE_CAPACITY") {
            cfg.ghost_queue_capacity = parse_positive_usize(&v).context("GHOST_QUEUE_CAPACITY")?;
        }

        Ok(cfg)
    }
}

fn parse_positive_usize(s: &str) -> Result<usize> {
    let v: usize = s.trim().parse().context("expected a non-negative integer")?;
    if v == 0 {
        anyhow::bail!("value must be greater than zero, got 0");
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_matches_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.pool_default_workers, 4);
        assert_eq!(cfg.fiber_default_stack_size, 64 * 1024);
        assert_eq!(cfg.ghost_ledger_capacity, 8192);
        assert_eq!(cfg.ghost_queue_capacity, 512);
    }

    #[test]
    #[serial]
    fn from_env_with_nothing_set_matches_default() {
        for var in [
            "POOL_DEFAULT_WORKERS",
            "FIBER_DEFAULT_STACK_SIZE",
            "GHOST_LEDGER_CAPACITY",
            "GHOST_QUEUE_CAPACITY",
        ] {
            std::env::remove_var(var);
        }
        assert_eq!(Config::from_env().unwrap(), Config::default());
    }

    #[test]
    #[serial]
    fn from_env_rejects_zero() {
        std::env::set_var("POOL_DEFAULT_WORKERS", "0");
        assert!(Config::from_env().is_err());
        std::env::remove_var("POOL_DEFAULT_WORKERS");
    }

    #[test]
    #[serial]
    fn from_env_reads_overrides() {
        std::env::set_var("POOL_DEFAULT_WORKERS", "8");
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.pool_default_workers, 8);
        std::env::remove_var("POOL_DEFAULT_WORKERS");
    }
}
