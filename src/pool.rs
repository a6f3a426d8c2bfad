//! Core resource pool implementation

use crate::config::{Callbacks, CreateFn, DestroyFn, PoolLimits, PoolOptions};
use crate::errors::{ConfigError, PoolError, PoolResult};
use crate::health::HealthStatus;
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};
use crate::reaper::{self, ReapReport, Reaper};
use crate::record::{Lease, ResourceId, ResourceInfo, ResourceRecord};
use crate::store::ConcurrentStore;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest wait between checks while `destroy` waits on other teardowns
const MAX_TEARDOWN_BACKOFF: Duration = Duration::from_millis(20);

pub(crate) struct Shared<T, E> {
    pub create: Arc<CreateFn<T, E>>,
    pub destroy: Arc<DestroyFn<T, E>>,
    pub limits: PoolLimits,
    pub store: ConcurrentStore<ResourceId, ResourceRecord<T>>,
    /// Last id handed out; ids start at 1
    pub next_id: AtomicU64,
    /// Slots reserved by in-flight creates. Only changed under the store's write guard.
    pub pending: AtomicUsize,
    /// Monotonic. Only set under the store's write guard.
    pub destroyed: AtomicBool,
    pub metrics: MetricsTracker,
    pub reaper: Mutex<Option<Reaper>>,
}

/// Bounded pool of caller-defined resources.
///
/// The pool creates resources on demand up to `max`, hands out the least
/// recently used one once saturated, and a background reaper destroys
/// resources idle past the timeout while the pool holds more than `min`.
///
/// `Pool` is a cheap handle: clones share the same resources. The create and
/// destroy callbacks receive the handle, so a resource can keep a clone and
/// call [`Pool::release`] with its own id when it dies on its own.
///
/// Saturated `get` calls do not wait and do not grant exclusive use: the same
/// payload may be leased to several callers at once.
///
/// # Examples
///
/// ```
/// use generic_pool::{Callbacks, Pool, PoolOptions};
/// use std::time::Duration;
///
/// let callbacks = Callbacks::<String, std::io::Error>::new()
///     .with_create(|_, id| Ok(format!("conn-{id}")))
///     .with_destroy(|_, _conn| Ok(()));
/// let options = PoolOptions::new()
///     .with_min(1)
///     .with_max(5)
///     .with_idle_timeout(Duration::from_secs(60));
///
/// let pool = Pool::new(callbacks, options).unwrap();
/// let lease = pool.get().unwrap();
/// assert_eq!(lease.id().get(), 1);
/// assert_eq!(pool.count(), 1);
///
/// pool.destroy().unwrap();
/// assert!(pool.get().unwrap_err().is_destroyed());
/// ```
pub struct Pool<T, E> {
    pub(crate) inner: Arc<Shared<T, E>>,
}

enum Admission<T> {
    Create(ResourceId),
    Reuse(Lease<T>),
    Saturated,
}

/// A slot reserved for an in-flight create. Dropping it without committing
/// gives the slot back.
struct PendingSlot<'a, T, E> {
    shared: &'a Shared<T, E>,
    open: bool,
}

impl<T, E> PendingSlot<'_, T, E> {
    /// Store the record, unless the pool was destroyed in the meantime.
    fn commit(mut self, record: ResourceRecord<T>) -> bool {
        self.open = false;
        let shared = self.shared;
        shared.store.write(|map| {
            shared.pending.fetch_sub(1, Ordering::Relaxed);
            if shared.destroyed.load(Ordering::Acquire) {
                return false;
            }
            map.insert(record.id, record);
            true
        })
    }
}

impl<T, E> Drop for PendingSlot<'_, T, E> {
    fn drop(&mut self) {
        if self.open {
            let shared = self.shared;
            shared.store.write(|_| {
                shared.pending.fetch_sub(1, Ordering::Relaxed);
            });
        }
    }
}

impl<T, E> Pool<T, E>
where
    T: Send + Sync + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Create a pool and start its idle reaper.
    ///
    /// Fails when a callback is missing or when `max < min` after the
    /// defaults of [`PoolOptions::normalize`] are applied.
    pub fn new(callbacks: Callbacks<T, E>, options: PoolOptions) -> Result<Self, ConfigError> {
        let create = callbacks.create.ok_or(ConfigError::MissingCreate)?;
        let destroy = callbacks.destroy.ok_or(ConfigError::MissingDestroy)?;
        let limits = options.normalize()?;

        let inner = Arc::new(Shared {
            create,
            destroy,
            limits,
            store: ConcurrentStore::new(),
            next_id: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
            destroyed: AtomicBool::new(false),
            metrics: MetricsTracker::new(),
            reaper: Mutex::new(None),
        });

        // The reaper only holds a weak reference, so dropping the last
        // handle ends it.
        let weak = Arc::downgrade(&inner);
        let reaper = Reaper::spawn(limits.reap_interval, move || match weak.upgrade() {
            Some(inner) => {
                Pool { inner }.reap_idle();
                true
            }
            None => false,
        })
        .map_err(|err| ConfigError::ReaperSpawn(err.to_string()))?;
        *inner.reaper.lock() = Some(reaper);

        debug!(
            min = limits.min,
            max = limits.max,
            idle_timeout = ?limits.idle_timeout,
            "resource pool created"
        );
        Ok(Self { inner })
    }

    /// Get a resource.
    ///
    /// Below `max` a new resource is created with the next id. At `max` the
    /// resource with the oldest last use (lowest id on ties) is handed out
    /// again and becomes the most recently used.
    pub fn get(&self) -> PoolResult<Lease<T>, E> {
        match self.admit(true)? {
            Admission::Create(id) => self.create_resource(id),
            Admission::Reuse(lease) => {
                MetricsTracker::incr(&self.inner.metrics.reused);
                debug!(id = %lease.id(), "reusing least recently used resource");
                Ok(lease)
            }
            Admission::Saturated => Err(PoolError::Exhausted),
        }
    }

    /// Try to get a resource without surfacing the error
    pub fn try_get(&self) -> Option<Lease<T>> {
        self.get().ok()
    }

    /// Destroy the resource with `id` and remove it from the pool.
    ///
    /// Unknown ids, and ids another caller is already tearing down, are a
    /// no-op. If the destroy callback fails the resource stays pooled and the
    /// error is returned.
    pub fn release(&self, id: ResourceId) -> PoolResult<(), E> {
        let Some(payload) = self.claim(id) else {
            return Ok(());
        };

        self.retire(id, &payload)
            .map_err(|source| PoolError::DestroyFailed { id, source })?;
        MetricsTracker::incr(&self.inner.metrics.released);
        debug!(%id, "released resource");
        Ok(())
    }

    /// Destroy every resource and mark the pool destroyed.
    ///
    /// Resources are destroyed in id order. The first destroy failure stops
    /// the teardown: the error is returned, the pool stays usable and the
    /// remaining resources stay pooled, so the call can be retried. Once it
    /// succeeds the reaper is stopped and every later `get` fails with
    /// [`PoolError::Destroyed`]; further `destroy`/`release` calls are no-ops.
    pub fn destroy(&self) -> PoolResult<(), E> {
        let shared = &*self.inner;
        let mut backoff = Duration::from_millis(1);
        loop {
            if shared.destroyed.load(Ordering::Acquire) {
                return Ok(());
            }

            let mut ids: Vec<ResourceId> = shared.store.read(|map| {
                map.values()
                    .filter(|record| !record.retiring)
                    .map(|record| record.id)
                    .collect()
            });

            if ids.is_empty() {
                let emptied = shared.store.write(|map| {
                    if map.is_empty() {
                        shared.destroyed.store(true, Ordering::Release);
                        true
                    } else {
                        false
                    }
                });
                if emptied {
                    break;
                }
                // Other callers are still tearing resources down
                thread::sleep(backoff);
                backoff = (backoff * 2).min(MAX_TEARDOWN_BACKOFF);
                continue;
            }

            ids.sort_unstable();
            for id in ids {
                self.release(id)?;
            }
        }

        let reaper = shared.reaper.lock().take();
        if let Some(mut reaper) = reaper {
            reaper.stop();
        }
        debug!("resource pool destroyed");
        Ok(())
    }

    /// Pre-create up to `count` resources without reusing any.
    ///
    /// Stops early once the pool is saturated. Returns how many resources
    /// were created.
    pub fn warmup(&self, count: usize) -> PoolResult<usize, E> {
        let mut created = 0;
        while created < count {
            match self.admit(false)? {
                Admission::Create(id) => {
                    self.create_resource(id)?;
                    created += 1;
                }
                Admission::Reuse(_) | Admission::Saturated => break,
            }
        }
        debug!(created, "pool warmed up");
        Ok(created)
    }

    /// Run one idle-reaper pass now, on the calling thread.
    pub fn reap_idle(&self) -> ReapReport {
        reaper::reap_idle(self)
    }

    /// Get a resource, running the create callback on tokio's blocking pool
    pub async fn get_async(&self) -> PoolResult<Lease<T>, E> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || pool.get())
            .await
            .map_err(|_| PoolError::Cancelled)?
    }

    /// Release a resource, running the destroy callback on tokio's blocking pool
    pub async fn release_async(&self, id: ResourceId) -> PoolResult<(), E> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || pool.release(id))
            .await
            .map_err(|_| PoolError::Cancelled)?
    }

    /// Destroy the pool on tokio's blocking pool
    pub async fn destroy_async(&self) -> PoolResult<(), E> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || pool.destroy())
            .await
            .map_err(|_| PoolError::Cancelled)?
    }

    /// Number of live resources
    pub fn count(&self) -> usize {
        self.inner.store.count()
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.inner.store.contains(&id)
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Normalized options the pool runs with
    pub fn limits(&self) -> PoolLimits {
        self.inner.limits
    }

    /// Bookkeeping of every live resource, ordered by id
    pub fn resources(&self) -> Vec<ResourceInfo> {
        let mut infos: Vec<ResourceInfo> = self
            .inner
            .store
            .items()
            .into_iter()
            .map(|(_, record)| record.info())
            .collect();
        infos.sort_unstable_by_key(|info| info.id);
        infos
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        let (live, idle) = self.live_and_idle();
        self.inner.metrics.get_metrics(live, idle, self.inner.limits.max)
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }

    /// Get health status
    pub fn health_status(&self) -> HealthStatus {
        let (live, idle) = self.live_and_idle();
        HealthStatus::new(live, idle, self.inner.limits.max, self.is_destroyed())
    }

    fn live_and_idle(&self) -> (usize, usize) {
        self.inner
            .store
            .read(|map| (map.len(), map.values().filter(|record| record.idle).count()))
    }

    /// Decide under the store guard whether a `get` creates or reuses.
    fn admit(&self, reuse: bool) -> PoolResult<Admission<T>, E> {
        let shared = &*self.inner;
        shared.store.write(|map| {
            if shared.destroyed.load(Ordering::Acquire) {
                return Err(PoolError::Destroyed);
            }

            let pending = shared.pending.load(Ordering::Relaxed);
            if map.len() + pending < shared.limits.max {
                shared.pending.store(pending + 1, Ordering::Relaxed);
                let id = ResourceId::new(shared.next_id.fetch_add(1, Ordering::Relaxed) + 1);
                return Ok(Admission::Create(id));
            }

            if !reuse {
                return Ok(Admission::Saturated);
            }

            let oldest = map
                .values_mut()
                .filter(|record| !record.retiring)
                .min_by_key(|record| (record.last_use_at, record.id));
            Ok(match oldest {
                Some(record) => {
                    record.touch();
                    Admission::Reuse(record.lease())
                }
                None => Admission::Saturated,
            })
        })
    }

    /// Run the create callback for a reserved id, outside the store guard.
    fn create_resource(&self, id: ResourceId) -> PoolResult<Lease<T>, E> {
        let shared = &*self.inner;
        let slot = PendingSlot {
            shared,
            open: true,
        };

        let payload = match (shared.create)(self, id) {
            Ok(payload) => payload,
            Err(err) => {
                drop(slot);
                MetricsTracker::incr(&shared.metrics.create_failures);
                debug!(%id, error = %err, "create callback failed");
                return Err(PoolError::CreateFailed(err));
            }
        };

        let record = ResourceRecord::new(id, payload);
        let lease = record.lease();
        if !slot.commit(record) {
            // Torn down while we were creating: this payload must not outlive it
            if let Err(err) = (shared.destroy)(self, lease.payload()) {
                MetricsTracker::incr(&shared.metrics.destroy_failures);
                warn!(%id, error = %err, "failed to destroy resource created after pool teardown");
            }
            return Err(PoolError::Destroyed);
        }

        MetricsTracker::incr(&shared.metrics.created);
        debug!(%id, "created resource");
        Ok(lease)
    }

    /// Mark a record as being torn down so no one else hands it out or
    /// destroys it. `None` if it is gone or already claimed.
    fn claim(&self, id: ResourceId) -> Option<Arc<T>> {
        self.inner.store.write(|map| match map.get_mut(&id) {
            Some(record) if !record.retiring => {
                record.retiring = true;
                Some(Arc::clone(&record.payload))
            }
            _ => None,
        })
    }

    /// Run the destroy callback for a claimed record, outside the store
    /// guard. Removes the record on success and drops the claim on failure.
    pub(crate) fn retire(&self, id: ResourceId, payload: &Arc<T>) -> Result<(), E> {
        let shared = &*self.inner;
        match (shared.destroy)(self, payload) {
            Ok(()) => {
                shared.store.delete(&id);
                Ok(())
            }
            Err(err) => {
                shared.store.write(|map| {
                    if let Some(record) = map.get_mut(&id) {
                        record.retiring = false;
                    }
                });
                MetricsTracker::incr(&shared.metrics.destroy_failures);
                Err(err)
            }
        }
    }
}

impl<T, E> Clone for Pool<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for Pool<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("limits", &self.inner.limits)
            .field("count", &self.inner.store.count())
            .field("destroyed", &self.inner.destroyed.load(Ordering::Acquire))
            .finish()
    }
}
