//! # generic-pool
//!
//! Bounded, thread-safe pool for expensive resources such as network
//! connections. The caller supplies a create and a destroy function; the pool
//! keeps the number of live resources between a minimum and a maximum, hands
//! out the least recently used resource once saturated, and reaps resources
//! that sit idle past a timeout.
//!
//! ## Features
//!
//! - Statically typed create/destroy callbacks with a caller-defined error type
//! - Strictly increasing resource ids, never reused
//! - Least-recently-used reuse at saturation (shared, not exclusive)
//! - Background idle reaper that stops with the pool
//! - Out-of-band release for resources that die on their own
//! - Async wrappers for tokio callers
//! - Metrics, Prometheus export and health status
//!
//! ## Quick Start
//!
//! ```rust
//! use generic_pool::{Callbacks, Pool, PoolOptions};
//!
//! let callbacks = Callbacks::<Vec<u8>, std::io::Error>::new()
//!     .with_create(|_pool, _id| Ok(Vec::with_capacity(1024)))
//!     .with_destroy(|_pool, _buf| Ok(()));
//!
//! let pool = Pool::new(callbacks, PoolOptions::new().with_min(1).with_max(4)).unwrap();
//! let lease = pool.get().unwrap();
//! assert_eq!(lease.capacity(), 1024);
//!
//! pool.release(lease.id()).unwrap();
//! assert_eq!(pool.count(), 0);
//! ```

mod pool;
mod config;
mod metrics;
mod health;
mod reaper;
mod record;
mod store;
mod errors;

pub use pool::Pool;
pub use config::{Callbacks, PoolLimits, PoolOptions, DEFAULT_IDLE_TIMEOUT, DEFAULT_REAP_INTERVAL};
pub use metrics::{PoolMetrics, MetricsExporter};
pub use health::HealthStatus;
pub use reaper::ReapReport;
pub use record::{Lease, ResourceId, ResourceInfo};
pub use store::ConcurrentStore;
pub use errors::{ConfigError, PoolError, PoolResult};
