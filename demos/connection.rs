//! Pooling fake network connections

use generic_pool::{Callbacks, Pool, PoolOptions, ResourceId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

static NETWORK_UP: AtomicBool = AtomicBool::new(true);

#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("connection {0} refused")]
    Refused(ResourceId),
}

struct Connection {
    id: ResourceId,
    online: AtomicBool,
    pool: Pool<Connection, ConnectionError>,
}

impl Connection {
    fn connect(pool: &Pool<Connection, ConnectionError>, id: ResourceId) -> Result<Self, ConnectionError> {
        if !NETWORK_UP.load(Ordering::Relaxed) {
            return Err(ConnectionError::Refused(id));
        }
        println!("   Connecting #{}", id);
        Ok(Self {
            id,
            online: AtomicBool::new(true),
            pool: pool.clone(),
        })
    }

    fn send(&self, data: &[u8]) {
        println!("   #{} sending {} bytes", self.id, data.len());
    }

    /// The remote end hung up: tell the pool so it stops handing us out.
    fn on_remote_close(&self) {
        self.online.store(false, Ordering::Relaxed);
        if let Err(err) = self.pool.release(self.id) {
            println!("   Could not release #{}: {}", self.id, err);
        }
    }

    fn close(&self) -> Result<(), ConnectionError> {
        println!("   Closing #{} (online: {})", self.id, self.online.load(Ordering::Relaxed));
        Ok(())
    }
}

fn main() {
    println!("=== generic-pool - Connection Examples ===\n");

    let callbacks = Callbacks::new()
        .with_create(Connection::connect)
        .with_destroy(|_, conn: &Connection| conn.close());
    let options = PoolOptions::new()
        .with_min(1)
        .with_max(3)
        .with_idle_timeout(Duration::from_millis(500))
        .with_reap_interval(Duration::from_millis(100));
    let pool = Pool::new(callbacks, options).expect("valid pool options");

    // Example 1: saturation
    saturation(&pool);

    // Example 2: remote close
    remote_close(&pool);

    // Example 3: idle reaping
    idle_reaping(&pool);

    // Example 4: metrics and teardown
    teardown(&pool);
}

fn saturation(pool: &Pool<Connection, ConnectionError>) {
    println!("1. Saturation:");
    for _ in 0..5 {
        let conn = pool.get().expect("connection");
        conn.send(b"hello world");
    }
    println!("   Live connections: {}\n", pool.count());
}

fn remote_close(pool: &Pool<Connection, ConnectionError>) {
    println!("2. Remote Close:");
    let conn = pool.get().expect("connection");
    conn.on_remote_close();
    println!("   Live connections: {}\n", pool.count());
}

fn idle_reaping(pool: &Pool<Connection, ConnectionError>) {
    println!("3. Idle Reaping:");
    thread::sleep(Duration::from_secs(1));
    for info in pool.resources() {
        println!("   #{} idle: {} uses: {}", info.id, info.idle, info.use_count);
    }
    println!();
}

fn teardown(pool: &Pool<Connection, ConnectionError>) {
    println!("4. Metrics and Teardown:");
    NETWORK_UP.store(false, Ordering::Relaxed);
    for _ in 0..3 {
        match pool.get() {
            Ok(conn) => println!("   Got #{}", conn.id),
            Err(err) => println!("   Error: {}", err),
        }
    }

    let health = pool.health_status();
    println!("   Health: {}", if health.is_healthy { "Healthy" } else { "Unhealthy" });
    println!("   Utilization: {:.1}%", health.utilization * 100.0);

    for (key, value) in pool.export_metrics() {
        println!("     {}: {}", key, value);
    }

    match pool.destroy() {
        Ok(()) => println!("   Pool destroyed"),
        Err(err) => println!("   Destroy failed: {}", err),
    }
}
