//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use generic_pool::{Callbacks, Pool, PoolOptions};
///
/// let callbacks = Callbacks::<u32, std::io::Error>::new()
///     .with_create(|_, _| Ok(7))
///     .with_destroy(|_, _| Ok(()));
/// let pool = Pool::new(callbacks, PoolOptions::new().with_max(1)).unwrap();
///
/// let _first = pool.get().unwrap();
/// let _again = pool.get().unwrap();
///
/// let metrics = pool.metrics();
/// assert_eq!(metrics.created, 1);
/// assert_eq!(metrics.reused, 1);
/// assert_eq!(metrics.live_resources, 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolMetrics {
    /// Resources created through the create callback
    pub created: usize,

    /// Saturated `get` calls answered with an existing resource
    pub reused: usize,

    /// Resources torn down by `release` or `destroy`
    pub released: usize,

    /// Resources torn down by the idle reaper
    pub evicted: usize,

    /// Times the reaper flagged a resource idle instead of evicting it
    pub flagged_idle: usize,

    /// Create callback failures
    pub create_failures: usize,

    /// Destroy callback failures, including swallowed reaper failures
    pub destroy_failures: usize,

    /// Current live resources
    pub live_resources: usize,

    /// Current resources flagged idle
    pub idle_resources: usize,

    /// Live resources as a share of max (0.0 to 1.0)
    pub utilization: f64,

    /// Maximum pool size
    pub max_size: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("created".to_string(), self.created.to_string());
        metrics.insert("reused".to_string(), self.reused.to_string());
        metrics.insert("released".to_string(), self.released.to_string());
        metrics.insert("evicted".to_string(), self.evicted.to_string());
        metrics.insert("flagged_idle".to_string(), self.flagged_idle.to_string());
        metrics.insert("create_failures".to_string(), self.create_failures.to_string());
        metrics.insert("destroy_failures".to_string(), self.destroy_failures.to_string());
        metrics.insert("live_resources".to_string(), self.live_resources.to_string());
        metrics.insert("idle_resources".to_string(), self.idle_resources.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert("max_size".to_string(), self.max_size.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use generic_pool::{Callbacks, Pool, PoolOptions};
    /// use std::collections::HashMap;
    ///
    /// let callbacks = Callbacks::<u32, std::io::Error>::new()
    ///     .with_create(|_, _| Ok(1))
    ///     .with_destroy(|_, _| Ok(()));
    /// let pool = Pool::new(callbacks, PoolOptions::default()).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("db", Some(&tags));
    /// assert!(output.contains("resourcepool_resources_live"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let labels = Self::format_labels(pool_name, tags);
        let mut output = String::new();

        let gauges = [
            ("resourcepool_resources_live", "Current live resources", metrics.live_resources),
            ("resourcepool_resources_idle", "Current resources flagged idle", metrics.idle_resources),
            ("resourcepool_resources_max", "Maximum pool size", metrics.max_size),
        ];
        for (name, help, value) in gauges {
            Self::push_metric(&mut output, name, help, "gauge", &labels, &value.to_string());
        }
        Self::push_metric(
            &mut output,
            "resourcepool_utilization",
            "Pool utilization ratio",
            "gauge",
            &labels,
            &format!("{:.2}", metrics.utilization),
        );

        let counters = [
            ("resourcepool_created_total", "Resources created", metrics.created),
            ("resourcepool_reused_total", "Saturated gets served by reuse", metrics.reused),
            ("resourcepool_released_total", "Resources released", metrics.released),
            ("resourcepool_evicted_total", "Resources evicted by the reaper", metrics.evicted),
            ("resourcepool_flagged_idle_total", "Resources flagged idle", metrics.flagged_idle),
            ("resourcepool_create_failures_total", "Create callback failures", metrics.create_failures),
            ("resourcepool_destroy_failures_total", "Destroy callback failures", metrics.destroy_failures),
        ];
        for (name, help, value) in counters {
            Self::push_metric(&mut output, name, help, "counter", &labels, &value.to_string());
        }

        output
    }

    fn push_metric(output: &mut String, name: &str, help: &str, kind: &str, labels: &str, value: &str) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} {}\n", name, kind));
        output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut tags: Vec<_> = tags.iter().collect();
            tags.sort();
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Debug, Default)]
pub(crate) struct MetricsTracker {
    pub created: AtomicUsize,
    pub reused: AtomicUsize,
    pub released: AtomicUsize,
    pub evicted: AtomicUsize,
    pub flagged_idle: AtomicUsize,
    pub create_failures: AtomicUsize,
    pub destroy_failures: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, live: usize, idle: usize, max_size: usize) -> PoolMetrics {
        let utilization = if max_size > 0 {
            live as f64 / max_size as f64
        } else {
            0.0
        };

        PoolMetrics {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            flagged_idle: self.flagged_idle.load(Ordering::Relaxed),
            create_failures: self.create_failures.load(Ordering::Relaxed),
            destroy_failures: self.destroy_failures.load(Ordering::Relaxed),
            live_resources: live,
            idle_resources: idle,
            utilization,
            max_size,
        }
    }
}
