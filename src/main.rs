use urgent_pool::{
    ElasticPool,
    FixedPool,
    PoolResult,
    SyntheticTask,
    TaskPool,
    Urgency,
};
use futures::future::try_join_all;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::runtime::Builder;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_TASKS: usize = 2_000;
const SUBMITTERS: usize = 8;


fn task_count() -> usize {
    std::env::var("URGENT_POOL_TASKS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_TASKS)
}

async fn run_demo(name: &str, pool: &dyn TaskPool, tasks: usize) -> PoolResult<()> {
    let counter = Arc::new(AtomicUsize::new(0));
    let now = Instant::now();

    pool.start()?;
    let submitters = (0..SUBMITTERS).map(|submitter| {
        let counter = counter.clone();
        async move {
            for i in (submitter..tasks).step_by(SUBMITTERS) {
                let task = SyntheticTask::new(Duration::from_millis(1)).with_counter(counter.clone());
                pool.schedule(Urgency::from(i % 5 == 0), Box::new(task)).await?;
            }
            PoolResult::Ok(())
        }
    });
    try_join_all(submitters).await?;
    pool.stop().await;

    info!(
        pool = name,
        executed = counter.load(Ordering::Relaxed),
        elapsed = ?now.elapsed(),
        "demo finished"
    );
    Ok(())
}

fn main() -> PoolResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let rt = Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .enable_all()
        .build()
        .map_err(|_| urgent_pool::PoolError::NoRuntime)?;

    let tasks = task_count();
    rt.block_on(async {
        let fixed = FixedPool::new(num_cpus::get() * 4)?;
        run_demo("fixed", &fixed, tasks).await?;

        let elastic = ElasticPool::new(num_cpus::get(), num_cpus::get() * 4)?;
        run_demo("elastic", &elastic, tasks).await
    })
}
