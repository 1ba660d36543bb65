//! Timed Memo demo
//!
//! Plays the part of a report consumer: calls memoized functions and methods
//! repeatedly and reports how many calls were served from the cache.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timed_memo::{AsyncMemoized, CacheConfig, Memoized, MemoizedMethod, Scope, Scoped};

/// An owner of memoized methods; `n` is deliberately not part of any key.
struct Aggregator {
    scope: Scope,
    n: u64,
}

impl Aggregator {
    fn new(n: u64) -> Self {
        Self {
            scope: Scope::unique(),
            n,
        }
    }
}

impl Scoped for Aggregator {
    fn scope(&self) -> &Scope {
        &self.scope
    }
}

fn config(ttl_seconds: f64, name: &str) -> Result<CacheConfig> {
    Ok(CacheConfig::new(ttl_seconds)?.with_notify_template(format!("returned cached {} at {{time}}", name)))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timed_memo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Timed Memo demo");

    let f1 = MemoizedMethod::new("f1", config(0.01, "f1")?, |_: &Aggregator, n: &u64| {
        if *n <= 1 {
            *n
        } else {
            (n - 1) + (n - 2)
        }
    })?;
    let f2 = MemoizedMethod::new("f2", config(0.05, "f2")?, |owner: &Aggregator, n: &u64| {
        n * owner.n
    })?;
    let f3 = Memoized::new("f3", config(0.07, "f3")?, |n: &u64| *n)?;

    let owner = Aggregator::new(10);
    anyhow::ensure!(f1.get(&owner, &1)? == 1);
    anyhow::ensure!(f1.get(&owner, &1)? == 1);
    tokio::time::sleep(Duration::from_millis(200)).await;
    anyhow::ensure!(f1.get(&owner, &1)? == 1);
    anyhow::ensure!(f2.get(&owner, &5)? == 50);
    anyhow::ensure!(f2.get(&owner, &5)? == 50);
    tokio::time::sleep(Duration::from_millis(100)).await;
    anyhow::ensure!(f2.get(&owner, &5)? == 50);

    let owner = Aggregator::new(20);
    anyhow::ensure!(f2.get(&owner, &5)? == 100);
    anyhow::ensure!(f1.get(&owner, &100)? == 197);
    anyhow::ensure!(f3.get(&15)? == 15);
    anyhow::ensure!(f3.get(&15)? == 15);

    let cached = f1.stats().hits + f2.stats().hits + f3.stats().hits;
    info!(cached, "Synchronous calls served from cache (expected 3)");

    // Report aggregation shared by concurrent consumers; loaded from MEMO_* vars
    let weekly = Arc::new(AsyncMemoized::new(
        "weekly_totals",
        CacheConfig::from_env()?,
        |weeks: u32| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            (0..weeks).map(|w| (w + 1) * 7).collect::<Vec<u32>>()
        },
    )?);

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let weekly = Arc::clone(&weekly);
            tokio::spawn(async move { weekly.get(4).await })
        })
        .collect();
    for consumer in consumers {
        let totals = consumer.await??;
        info!(?totals, "Weekly totals received");
    }

    let stats = weekly.stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        hit_rate = stats.hit_rate(),
        "Concurrent consumers converged on one computation"
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
