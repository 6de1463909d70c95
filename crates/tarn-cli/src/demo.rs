//! `tarn run`: drive a pool with a crowd of short-lived workers

use std::time::Duration;

use anyhow::Context as _;
use rand::Rng;
use tarn_core::{Context, StubFactory};
use tarn_pool::{ConnectionPool, PoolConfig};

/// Settings for a demo run
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub config: PoolConfig,
    pub workers: usize,
    /// Upper bound for how long each worker holds its connection
    pub max_hold: Duration,
    /// Simulated handshake latency of the stub factory
    pub connect_delay: Duration,
    /// How often to check the idle count once the workers are done
    pub poll_interval: Duration,
    /// Print full JSON stats instead of the one-line summary
    pub json: bool,
}

pub async fn run(options: DemoOptions) -> anyhow::Result<()> {
    let factory = StubFactory::new().with_connect_delay(options.connect_delay);
    let pool = ConnectionPool::new(options.config.clone(), factory)
        .context("failed to create connection pool")?;

    let shutdown = Context::background();
    {
        let token = shutdown.cancellation_token().clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling workers");
                token.cancel();
            }
        });
    }

    tracing::info!(workers = options.workers, "starting workers");

    let handles: Vec<_> = (0..options.workers)
        .map(|worker| {
            let pool = pool.clone();
            let ctx = Context::background()
                .with_cancellation(shutdown.cancellation_token().child_token());
            let max_hold = options.max_hold;
            let json = options.json;
            tokio::spawn(async move { query(&pool, &ctx, worker, max_hold, json).await })
        })
        .collect();

    for handle in handles {
        handle.await.context("worker panicked")??;
    }

    loop {
        if shutdown.run(tokio::time::sleep(options.poll_interval)).await.is_err() {
            break;
        }

        let idle = pool.idle_count();
        println!("idle connection: {}", idle);
        if idle == 0 {
            break;
        }
    }

    let stats = pool.stats();
    pool.close().await.context("failed to close connection pool")?;
    tracing::info!(
        created = stats.created(),
        closed = stats.closed(),
        exec_count = stats.exec_count(),
        "demo finished"
    );
    Ok(())
}

async fn query(
    pool: &ConnectionPool,
    ctx: &Context,
    worker: usize,
    max_hold: Duration,
    json: bool,
) -> anyhow::Result<()> {
    let conn = match pool.acquire(ctx).await {
        Ok(conn) => conn,
        Err(e) if e.is_context_error() => {
            tracing::info!(worker, error = %e, "worker stopped before getting a connection");
            return Ok(());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("worker {} could not get a connection", worker));
        }
    };

    let hold_ms = rand::thread_rng().gen_range(0..=max_hold.as_millis() as u64);
    tracing::debug!(worker, connection_id = conn.id(), hold_ms, "holding connection");
    // Cut short on interrupt; the connection is still released below.
    let _ = ctx.run(tokio::time::sleep(Duration::from_millis(hold_ms))).await;
    tracing::debug!(
        worker,
        connection_id = conn.id(),
        held_ms = conn.last_used().elapsed().as_millis() as u64,
        "done with connection"
    );

    if json {
        println!("{}", serde_json::to_string(&pool.stats())?);
    } else {
        println!(
            "active conn: {} idle conn: {}  pending conn: {} average execution time: {:?}",
            pool.active_count(),
            pool.idle_count(),
            pool.pending_count(),
            pool.average_execution_time()
        );
    }

    pool.release(conn)
        .await
        .with_context(|| format!("worker {} failed to release its connection", worker))
}
