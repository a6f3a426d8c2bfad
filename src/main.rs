// generic-pool demo binary
// The library lives in lib.rs; run the connection demo with:
// cargo run --example connection

use generic_pool::{Callbacks, Pool, PoolOptions};
use std::time::Duration;

fn main() {
    println!("=== generic-pool ===");
    println!("Run: cargo run --example connection");
    println!();

    println!("Quick Demo:");
    let callbacks = Callbacks::<String, std::io::Error>::new()
        .with_create(|_, id| Ok(format!("worker-{id}")))
        .with_destroy(|_, name| {
            println!("  Destroying {name}");
            Ok(())
        });
    let options = PoolOptions::new()
        .with_min(1)
        .with_max(3)
        .with_idle_timeout(Duration::from_secs(60));

    let pool = match Pool::new(callbacks, options) {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("  Invalid pool configuration: {err}");
            return;
        }
    };

    for _ in 0..5 {
        match pool.get() {
            Ok(lease) => println!("  Got {} (id {})", *lease, lease.id()),
            Err(err) => println!("  Error: {err}"),
        }
    }
    println!("  Live resources: {}", pool.count());

    if let Err(err) = pool.destroy() {
        println!("  Destroy failed: {err}");
    }
}
