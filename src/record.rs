//! Resource records and the handles given out to callers

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Identity of a pooled resource.
///
/// Ids are assigned in strictly increasing order starting at 1 and are never
/// reused for the lifetime of a pool, even after the resource is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u64);

impl ResourceId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One live pool slot.
pub(crate) struct ResourceRecord<T> {
    pub id: ResourceId,
    pub payload: Arc<T>,
    pub created_at: Instant,
    pub last_use_at: Instant,
    pub use_count: u64,
    pub idle: bool,
    /// Set while a destroy callback for this record is in flight.
    pub retiring: bool,
}

impl<T> ResourceRecord<T> {
    pub fn new(id: ResourceId, payload: T) -> Self {
        let now = Instant::now();
        Self {
            id,
            payload: Arc::new(payload),
            created_at: now,
            last_use_at: now,
            use_count: 0,
            idle: false,
            retiring: false,
        }
    }

    /// Hand the record out again.
    pub fn touch(&mut self) {
        self.last_use_at = Instant::now();
        self.idle = false;
        self.use_count += 1;
    }

    pub fn is_idle_past(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_use_at) > timeout
    }

    pub fn info(&self) -> ResourceInfo {
        ResourceInfo {
            id: self.id,
            created_at: self.created_at,
            last_use_at: self.last_use_at,
            use_count: self.use_count,
            idle: self.idle,
        }
    }

    pub fn lease(&self) -> Lease<T> {
        Lease {
            id: self.id,
            payload: Arc::clone(&self.payload),
        }
    }
}

// Manual impl: `Arc<T>` clones without `T: Clone`.
impl<T> Clone for ResourceRecord<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            payload: Arc::clone(&self.payload),
            created_at: self.created_at,
            last_use_at: self.last_use_at,
            use_count: self.use_count,
            idle: self.idle,
            retiring: self.retiring,
        }
    }
}

/// Point-in-time view of a pooled resource's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceInfo {
    pub id: ResourceId,
    pub created_at: Instant,
    pub last_use_at: Instant,
    /// Times the resource was handed out again after creation
    pub use_count: u64,
    /// Flagged by the reaper while the pool sat at its minimum size
    pub idle: bool,
}

impl ResourceInfo {
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn idle_for(&self) -> Duration {
        self.last_use_at.elapsed()
    }
}

/// A resource handed out by [`Pool::get`](crate::Pool::get).
///
/// The pool keeps ownership of the resource: dropping a lease does nothing,
/// and at saturation the same payload may be leased to several callers at
/// once. Call [`Pool::release`](crate::Pool::release) with [`Lease::id`] to
/// tear the resource down.
///
/// # Examples
///
/// ```
/// use generic_pool::{Callbacks, Pool, PoolOptions};
///
/// let callbacks = Callbacks::<String, std::io::Error>::new()
///     .with_create(|_, id| Ok(format!("conn-{id}")))
///     .with_destroy(|_, _| Ok(()));
/// let pool = Pool::new(callbacks, PoolOptions::new().with_max(2)).unwrap();
///
/// let lease = pool.get().unwrap();
/// assert_eq!(lease.id().get(), 1);
/// assert_eq!(lease.as_str(), "conn-1");
/// ```
pub struct Lease<T> {
    id: ResourceId,
    payload: Arc<T>,
}

impl<T> Lease<T> {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Shared handle to the payload.
    pub fn payload(&self) -> &Arc<T> {
        &self.payload
    }

    pub fn into_inner(self) -> Arc<T> {
        self.payload
    }
}

impl<T> Clone for Lease<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            payload: Arc::clone(&self.payload),
        }
    }
}

impl<T> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.payload
    }
}

impl<T: fmt::Debug> fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("id", &self.id)
            .field("payload", &self.payload)
            .finish()
    }
}
