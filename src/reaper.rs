//! Background idle reaper
//!
//! A dedicated thread wakes every `reap_interval` and runs one reap pass over
//! the pool: resources idle past the timeout are destroyed while the pool is
//! above its minimum size, and flagged idle once it is down to the minimum.

use crate::metrics::MetricsTracker;
use crate::pool::Pool;
use crate::record::ResourceId;

use crossbeam::channel::{self, Sender};
use crossbeam::select;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Outcome of one reap pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Resources destroyed and removed
    pub evicted: usize,

    /// Resources newly flagged idle because the pool sat at its minimum
    pub flagged: usize,

    /// Evictions whose destroy callback failed; those resources stay pooled
    pub failed: usize,
}

enum Verdict<T> {
    Evict(Arc<T>),
    Flag,
    Skip,
}

/// Run one reap pass over `pool`.
///
/// Every candidate is re-examined under the store guard, so the pass stops
/// evicting exactly when the pool reaches its minimum, whatever the scan order.
pub(crate) fn reap_idle<T, E>(pool: &Pool<T, E>) -> ReapReport
where
    T: Send + Sync + 'static,
    E: fmt::Display + Send + 'static,
{
    let shared = &pool.inner;
    let min = shared.limits.min;
    let timeout = shared.limits.idle_timeout;
    let mut report = ReapReport::default();

    let count = shared.store.count();
    if count <= min {
        trace!(count, min, "reaper idle: pool at or below minimum");
        return report;
    }

    let now = Instant::now();
    let mut candidates: Vec<ResourceId> = shared.store.read(|map| {
        map.values()
            .filter(|record| !record.retiring && record.is_idle_past(timeout, now))
            .map(|record| record.id)
            .collect()
    });
    candidates.sort_unstable();

    for id in candidates {
        let verdict = shared.store.write(|map| {
            let live = map.values().filter(|record| !record.retiring).count();
            let total = map.len();
            let Some(record) = map.get_mut(&id) else {
                return Verdict::Skip;
            };
            if record.retiring || !record.is_idle_past(timeout, Instant::now()) {
                return Verdict::Skip;
            }
            if live > min {
                record.retiring = true;
                Verdict::Evict(Arc::clone(&record.payload))
            } else if total > min {
                // A teardown in flight may still fail; flag only at the minimum
                Verdict::Skip
            } else if !record.idle {
                record.idle = true;
                Verdict::Flag
            } else {
                Verdict::Skip
            }
        });

        match verdict {
            Verdict::Evict(payload) => match pool.retire(id, &payload) {
                Ok(()) => {
                    MetricsTracker::incr(&shared.metrics.evicted);
                    report.evicted += 1;
                    debug!(%id, "evicted idle resource");
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(%id, error = %err, "failed to destroy idle resource, retrying next tick");
                }
            },
            Verdict::Flag => {
                MetricsTracker::incr(&shared.metrics.flagged_idle);
                report.flagged += 1;
                debug!(%id, "flagged resource idle at minimum pool size");
            }
            Verdict::Skip => {}
        }
    }

    trace!(
        evicted = report.evicted,
        flagged = report.flagged,
        failed = report.failed,
        "reap pass finished"
    );
    report
}

/// Handle on the reaper thread. Stopping (or dropping) it ends the thread.
pub(crate) struct Reaper {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl Reaper {
    /// Start a thread that calls `tick` every `interval` until `tick` returns
    /// `false` or the reaper is stopped.
    pub fn spawn<F>(interval: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (shutdown, stopped) = channel::bounded::<()>(0);
        let ticker = channel::tick(interval);

        let thread = thread::Builder::new()
            .name("pool-reaper".to_string())
            .spawn(move || {
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            if !tick() {
                                break;
                            }
                        }
                        // Sender dropped
                        recv(stopped) -> _ => break,
                    }
                }
                trace!("reaper thread exiting");
            })?;

        Ok(Self {
            shutdown: Some(shutdown),
            thread_id: thread.thread().id(),
            thread: Some(thread),
        })
    }

    /// Signal the thread and wait for it, unless called from the reaper
    /// thread itself.
    pub fn stop(&mut self) {
        self.shutdown = None;
        if let Some(thread) = self.thread.take()
            && thread::current().id() != self.thread_id
            && thread.join().is_err()
        {
            warn!("reaper thread panicked");
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}
