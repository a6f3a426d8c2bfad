//! Pool options and lifecycle callbacks

use crate::errors::ConfigError;
use crate::pool::Pool;
use crate::record::ResourceId;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Idle timeout used when none (or zero) is configured
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Period of the background idle reaper
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(1);

/// Sizing and timing options for a pool, before normalization.
///
/// Bounds are signed so that out-of-range values can be given and defaulted:
/// a negative `min` becomes 0, a negative `max` becomes `min + 1` and a zero
/// idle timeout becomes 30 seconds. See [`PoolOptions::normalize`].
///
/// # Examples
///
/// ```
/// use generic_pool::PoolOptions;
/// use std::time::Duration;
///
/// let limits = PoolOptions::new()
///     .with_min(1)
///     .with_max(5)
///     .with_idle_timeout(Duration::from_secs(60))
///     .normalize()
///     .unwrap();
///
/// assert_eq!(limits.min, 1);
/// assert_eq!(limits.max, 5);
/// assert_eq!(limits.idle_timeout, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolOptions {
    /// Number of resources the reaper never evicts below
    pub min: i64,

    /// Upper bound on live resources
    pub max: i64,

    /// How long a resource may go unused before the reaper acts on it
    pub idle_timeout: Duration,

    /// Period of the background reaper
    pub reap_interval: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            min: 0,
            max: 1,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }
}

impl PoolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min(mut self, min: i64) -> Self {
        self.min = min;
        self
    }

    pub fn with_max(mut self, max: i64) -> Self {
        self.max = max;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the reaper period. Zero falls back to one second.
    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Apply defaults and check `max >= min`.
    ///
    /// # Examples
    ///
    /// ```
    /// use generic_pool::{ConfigError, PoolOptions};
    ///
    /// let limits = PoolOptions::new().with_min(-1).with_max(-1).normalize().unwrap();
    /// assert_eq!((limits.min, limits.max), (0, 1));
    ///
    /// let err = PoolOptions::new().with_min(5).with_max(1).normalize().unwrap_err();
    /// assert_eq!(err, ConfigError::MaxBelowMin { min: 5, max: 1 });
    /// ```
    pub fn normalize(&self) -> Result<PoolLimits, ConfigError> {
        let min = self.min.max(0);
        let max = if self.max < 0 {
            min.saturating_add(1)
        } else {
            self.max
        };

        let min = usize::try_from(min).unwrap_or(usize::MAX);
        let max = usize::try_from(max).unwrap_or(usize::MAX);
        if max < min {
            return Err(ConfigError::MaxBelowMin { min, max });
        }

        let idle_timeout = if self.idle_timeout.is_zero() {
            DEFAULT_IDLE_TIMEOUT
        } else {
            self.idle_timeout
        };
        let reap_interval = if self.reap_interval.is_zero() {
            DEFAULT_REAP_INTERVAL
        } else {
            self.reap_interval
        };

        Ok(PoolLimits {
            min,
            max,
            idle_timeout,
            reap_interval,
        })
    }
}

/// Normalized pool options; `min <= max` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolLimits {
    pub min: usize,
    pub max: usize,
    pub idle_timeout: Duration,
    pub reap_interval: Duration,
}

pub(crate) type CreateFn<T, E> = dyn Fn(&Pool<T, E>, ResourceId) -> Result<T, E> + Send + Sync;
pub(crate) type DestroyFn<T, E> = dyn Fn(&Pool<T, E>, &T) -> Result<(), E> + Send + Sync;

/// The caller-supplied create and destroy functions.
///
/// Both are required; [`Pool::new`] rejects a set missing either one. The
/// callbacks receive the pool handle, so a resource may hold on to a clone
/// and call [`Pool::release`] with its own id when it dies on its own.
pub struct Callbacks<T, E> {
    pub(crate) create: Option<Arc<CreateFn<T, E>>>,
    pub(crate) destroy: Option<Arc<DestroyFn<T, E>>>,
}

impl<T, E> Callbacks<T, E> {
    pub fn new() -> Self {
        Self {
            create: None,
            destroy: None,
        }
    }

    /// Set the function that materializes a resource for a fresh id.
    pub fn with_create<F>(mut self, create: F) -> Self
    where
        F: Fn(&Pool<T, E>, ResourceId) -> Result<T, E> + Send + Sync + 'static,
    {
        self.create = Some(Arc::new(create));
        self
    }

    /// Set the function that tears a resource down on release, eviction or
    /// pool destruction. On error the resource stays pooled.
    pub fn with_destroy<F>(mut self, destroy: F) -> Self
    where
        F: Fn(&Pool<T, E>, &T) -> Result<(), E> + Send + Sync + 'static,
    {
        self.destroy = Some(Arc::new(destroy));
        self
    }
}

impl<T, E> Default for Callbacks<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Callbacks<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("create", &self.create.is_some())
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}
