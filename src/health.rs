//! Health reporting for resource pools

/// Health status of a resource pool
///
/// # Examples
///
/// ```
/// use generic_pool::{Callbacks, Pool, PoolOptions};
///
/// let callbacks = Callbacks::<u32, std::io::Error>::new()
///     .with_create(|_, _| Ok(1))
///     .with_destroy(|_, _| Ok(()));
/// let pool = Pool::new(callbacks, PoolOptions::new().with_max(4)).unwrap();
/// let _lease = pool.get().unwrap();
///
/// let health = pool.health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.live_resources, 1);
/// assert_eq!(health.utilization, 0.25);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Live resources as a share of max (0.0 to 1.0)
    pub utilization: f64,

    /// Live resources count
    pub live_resources: usize,

    /// Resources flagged idle
    pub idle_resources: usize,

    /// Maximum pool size
    pub max_size: usize,

    /// Whether the pool has been destroyed
    pub destroyed: bool,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub fn new(live: usize, idle: usize, max_size: usize, destroyed: bool) -> Self {
        let utilization = if max_size > 0 {
            live as f64 / max_size as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if destroyed {
            warnings.push("Pool has been destroyed".to_string());
            is_healthy = false;
        }

        // Saturated pools hand the same resource to several callers
        if max_size > 0 && live >= max_size {
            warnings.push(format!("Pool saturated: {}/{} resources in use", live, max_size));
            is_healthy = false;
        }

        if max_size == 0 && !destroyed {
            warnings.push("Pool has zero capacity".to_string());
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            live_resources: live,
            idle_resources: idle,
            max_size,
            destroyed,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturated_pool_is_unhealthy() {
        let health = HealthStatus::new(5, 0, 5, false);
        assert!(!health.is_healthy());
        assert_eq!(health.warning_count, 1);
        assert_eq!(health.utilization, 1.0);
    }

    #[test]
    fn test_destroyed_pool_is_unhealthy() {
        let health = HealthStatus::new(0, 0, 5, true);
        assert!(!health.is_healthy());
        assert_eq!(health.warnings, vec!["Pool has been destroyed".to_string()]);
    }

    #[test]
    fn test_zero_capacity_warns_but_stays_healthy() {
        let health = HealthStatus::new(0, 0, 0, false);
        assert!(health.is_healthy());
        assert_eq!(health.warning_count, 1);
    }
}
