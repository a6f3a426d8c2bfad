//! End-to-end pool behavior through the public API

use generic_pool::{Callbacks, ConfigError, Pool, PoolError, PoolOptions, ResourceId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
struct EngineError(&'static str);

#[derive(Debug)]
struct Engine {
    name: &'static str,
}

fn engines() -> Callbacks<Engine, EngineError> {
    Callbacks::new()
        .with_create(|_, _| Ok(Engine { name: "hello id" }))
        .with_destroy(|_, _| Ok(()))
}

fn options(min: i64, max: i64, idle: Duration) -> PoolOptions {
    PoolOptions::new()
        .with_min(min)
        .with_max(max)
        .with_idle_timeout(idle)
}

#[test]
fn test_single_get() {
    let pool = Pool::new(engines(), options(1, 5, Duration::from_secs(60))).unwrap();

    let engine = pool.get().unwrap();
    assert_eq!(pool.count(), 1);
    assert_eq!(engine.id(), ResourceId::new(1));
    assert_eq!(engine.name, "hello id");

    pool.destroy().unwrap();
    assert_eq!(pool.count(), 0);
    assert!(matches!(pool.get(), Err(PoolError::Destroyed)));
}

#[test]
fn test_size_caps_at_max() {
    let pool = Pool::new(engines(), options(1, 5, Duration::from_secs(60))).unwrap();

    let mut last_id = 0;
    for i in 0..100 {
        let lease = pool.get().unwrap();
        if i < 5 {
            assert!(lease.id().get() > last_id);
            last_id = lease.id().get();
            assert_eq!(pool.count(), i + 1);
        } else {
            assert_eq!(pool.count(), 5);
        }
    }
}

#[test]
fn test_saturated_get_returns_oldest_and_refreshes_it() {
    let pool = Pool::new(engines(), options(0, 4, Duration::from_secs(60))).unwrap();
    for _ in 0..4 {
        pool.get().unwrap();
        thread::sleep(Duration::from_millis(2));
    }

    for _ in 0..10 {
        let before = pool.resources();
        let oldest = before
            .iter()
            .min_by_key(|info| (info.last_use_at, info.id))
            .unwrap()
            .id;

        let lease = pool.get().unwrap();
        assert_eq!(lease.id(), oldest);

        let after = pool.resources();
        let newest = after.iter().max_by_key(|info| info.last_use_at).unwrap();
        assert_eq!(newest.id, oldest);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_idle_resources_reaped_to_min() {
    let pool = Pool::new(engines(), options(1, 5, Duration::from_secs(2))).unwrap();
    for _ in 0..100 {
        pool.get().unwrap();
    }
    assert_eq!(pool.count(), 5);

    // Default one-second reaper
    thread::sleep(Duration::from_secs(5));

    assert_eq!(pool.count(), 1);
    let remaining = pool.resources();
    assert!(remaining[0].idle);
    assert_eq!(pool.metrics().evicted, 4);
}

#[test]
fn test_failed_destroy_keeps_pool_alive() {
    let callbacks = Callbacks::<Engine, EngineError>::new()
        .with_create(|_, _| Ok(Engine { name: "stuck" }))
        .with_destroy(|_, _| Err(EngineError("cannot close")));
    let pool = Pool::new(callbacks, options(1, 5, Duration::from_secs(60))).unwrap();

    pool.get().unwrap();
    let err = pool.destroy().unwrap_err();

    assert!(matches!(
        err,
        PoolError::DestroyFailed { source: EngineError("cannot close"), .. }
    ));
    assert!(!pool.is_destroyed());
    assert_eq!(pool.count(), 1);
    assert!(pool.get().is_ok());
}

#[test]
fn test_max_below_min_is_rejected() {
    let err = Pool::new(engines(), options(5, 1, Duration::from_secs(30))).unwrap_err();
    assert_eq!(err, ConfigError::MaxBelowMin { min: 5, max: 1 });
}

#[test]
fn test_negative_bounds_are_normalized() {
    let pool = Pool::new(engines(), options(-1, -1, Duration::from_secs(30))).unwrap();
    let limits = pool.limits();
    assert_eq!(limits.min, 0);
    assert_eq!(limits.max, 1);

    let first = pool.get().unwrap();
    let second = pool.get().unwrap();
    assert_eq!(first.id(), second.id());
    assert!(Arc::ptr_eq(first.payload(), second.payload()));
}

#[test]
fn test_dropping_last_handle_releases_pool() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicUsize::new(0));

    struct Tracked(Arc<AtomicUsize>);
    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let on_drop = Arc::clone(&dropped);
    let on_destroy = Arc::clone(&destroyed);
    let callbacks = Callbacks::<Tracked, EngineError>::new()
        .with_create(move |_, _| Ok(Tracked(Arc::clone(&on_drop))))
        .with_destroy(move |_, _| {
            on_destroy.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    let pool = Pool::new(
        callbacks,
        options(0, 2, Duration::from_secs(60)).with_reap_interval(Duration::from_secs(3600)),
    )
    .unwrap();
    pool.get().unwrap();

    // Dropping must not wait for the next reaper tick
    let started = Instant::now();
    drop(pool);
    assert!(started.elapsed() < Duration::from_secs(1));

    // Payloads are dropped with the pool; destroy is only for explicit teardown
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
    assert_eq!(destroyed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_async_get_from_many_tasks() {
    let pool = Pool::new(engines(), options(0, 3, Duration::from_secs(60))).unwrap();

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.get_async().await.map(|lease| lease.id()) })
        })
        .collect();

    for task in tasks {
        match task.await.unwrap() {
            Ok(id) => assert!(id.get() <= 3),
            Err(err) => assert!(matches!(err, PoolError::Exhausted)),
        }
    }
    assert!(pool.count() <= 3);

    pool.destroy_async().await.unwrap();
    assert!(pool.is_destroyed());
}
