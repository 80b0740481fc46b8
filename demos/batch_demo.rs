//! Batch demo
//!
//! Runs a handful of jobs through a two-slot pool: one tracked on its own,
//! three grouped in a batch whose failures are reported together.
//!
//! Run with `RUST_LOG=gobs=debug cargo run --example batch_demo` for the
//! admission and completion events.

use gobs::utils::telemetry::init_tracing;
use gobs::{Pool, PoolConfig};
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let pool = Pool::try_new(PoolConfig::new(2).with_name("demo"))?;

    let status = pool
        .submit(|| async {
            sleep(Duration::from_millis(100)).await;
            Ok(())
        })
        .await;

    let batch = pool.batch();
    for i in 1..=3u64 {
        batch
            .submit(move || async move {
                sleep(Duration::from_millis(10 * i)).await;
                if i < 3 {
                    anyhow::bail!("an error {} occurred", i);
                }
                Ok(())
            })
            .await;
    }

    match batch.wait().await {
        Ok(()) => println!("batch succeeded"),
        Err(err) => {
            println!("batch failed: {}", err);
            for failure in err.errors() {
                println!("  - {}", failure);
            }
        }
    }

    // Not part of the batch, so still running here
    status.wait().await?;
    pool.stop().await;
    println!("all jobs done");

    Ok(())
}
