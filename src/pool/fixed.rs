//! Фиксированный пул: заданное число долгоживущих воркеров.
//!
//! Часть воркеров (по умолчанию 10%) обслуживает только срочную очередь,
//! остальные берут задачи из обеих очередей.
//!
//! Смешанные воркеры предпочитают срочные задачи. После `urgent_streak_limit`
//! срочных задач подряд смешанный воркер сначала берёт готовую обычную, так
//! обычная работа не голодает при непрерывном потоке срочных.

use super::{ActiveWorkers, TaskPool};
use crate::{
    errors::PoolError,
    model::{PoolMetrics, PoolState, Urgency},
    queue::BoundedQueue,
    result::PoolResult,
    task::{self, BoxedTask, Task},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU8, AtomicUsize, Ordering},
    Arc,
};
use tokio::{runtime::Handle, sync::OnceCell};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace, warn};


/// Конфигурация фиксированного пула
#[derive(Debug, Clone)]
pub struct FixedPoolConfig {
    pub workers: usize,
    pub urgent_share_percent: usize,
    pub urgent_queue_factor: usize,
    pub normal_queue_factor: usize,
    /// 0 disables the rule
    pub urgent_streak_limit: usize,
}

impl Default for FixedPoolConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            urgent_share_percent: 10,
            urgent_queue_factor: 2,
            normal_queue_factor: 5000, // нормальный трафик приходит пачками
            urgent_streak_limit: 16,
        }
    }
}

impl FixedPoolConfig {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    pub fn with_urgent_share_percent(mut self, percent: usize) -> Self {
        self.urgent_share_percent = percent.min(100);
        self
    }

    pub fn with_queue_factors(mut self, urgent: usize, normal: usize) -> Self {
        self.urgent_queue_factor = urgent.max(1);
        self.normal_queue_factor = normal.max(1);
        self
    }

    pub fn with_urgent_streak_limit(mut self, limit: usize) -> Self {
        self.urgent_streak_limit = limit;
        self
    }

    pub fn validate(&self) -> PoolResult<()> {
        if self.workers == 0 {
            return Err(PoolError::ZeroWorkers);
        }
        Ok(())
    }

    /// floor(workers * share / 100), leaving at least one mixed worker
    pub fn dedicated_urgent_workers(&self) -> usize {
        (self.workers * self.urgent_share_percent.min(100) / 100)
            .min(self.workers.saturating_sub(1))
    }

    fn urgent_capacity(&self) -> usize {
        self.workers.saturating_mul(self.urgent_queue_factor)
    }

    fn normal_capacity(&self) -> usize {
        self.workers.saturating_mul(self.normal_queue_factor)
    }
}


struct Shared {
    config: FixedPoolConfig,
    urgent: BoundedQueue<BoxedTask>,
    normal: BoundedQueue<BoxedTask>,
    state: AtomicU8,
    active: ActiveWorkers,
    completed: AtomicUsize,
    tracker: TaskTracker,
}

impl Shared {
    #[inline]
    fn queue(&self, urgency: Urgency) -> &BoundedQueue<BoxedTask> {
        match urgency {
            Urgency::Urgent => &self.urgent,
            Urgency::Normal => &self.normal,
        }
    }

    #[inline]
    fn state(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::Acquire))
    }

    async fn execute(&self, urgency: Urgency, task: BoxedTask) {
        let _active = self.active.enter(urgency);
        trace!(%urgency, "FixedPool: executing task");
        if task::run(task).await {
            self.completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn urgent_only_loop(self: Arc<Self>, worker: usize) {
        debug!(worker, "FixedPool: urgent-only worker started");
        while let Some(task) = self.urgent.pop().await {
            self.execute(Urgency::Urgent, task).await;
        }
        debug!(worker, "FixedPool: urgent-only worker exited");
    }

    async fn mixed_loop(self: Arc<Self>, worker: usize) {
        debug!(worker, "FixedPool: mixed worker started");
        let mut urgent_streak = 0usize;
        while let Some((urgency, task)) = self.next_mixed(urgent_streak).await {
            urgent_streak = match urgency {
                Urgency::Urgent => urgent_streak + 1,
                Urgency::Normal => 0,
            };
            self.execute(urgency, task).await;
        }
        debug!(worker, "FixedPool: mixed worker exited");
    }

    /// `None` once both queues are closed and empty.
    async fn next_mixed(&self, urgent_streak: usize) -> Option<(Urgency, BoxedTask)> {
        let limit = self.config.urgent_streak_limit;
        if limit > 0 && urgent_streak >= limit {
            if let Some(task) = self.normal.try_pop() {
                return Some((Urgency::Normal, task));
            }
        }

        tokio::select! {
            biased;
            Some(task) = self.urgent.pop() => Some((Urgency::Urgent, task)),
            Some(task) = self.normal.pop() => Some((Urgency::Normal, task)),
            else => None,
        }
    }
}


pub struct FixedPool {
    shared: Arc<Shared>,
    // start и stop меняют состояние и запускают воркеры под одним замком
    lifecycle: Mutex<()>,
    stop_once: OnceCell<()>,
}

impl FixedPool {
    pub fn new(workers: usize) -> PoolResult<Self> {
        Self::with_config(FixedPoolConfig::new(workers))
    }

    pub fn with_config(config: FixedPoolConfig) -> PoolResult<Self> {
        if let Err(err) = config.validate() {
            error!(%err, "FixedPool: invalid configuration");
            return Err(err);
        }

        info!(
            workers = config.workers,
            urgent_only = config.dedicated_urgent_workers(),
            "FixedPool: created"
        );

        let shared = Arc::new(Shared {
            urgent: BoundedQueue::new(config.urgent_capacity()),
            normal: BoundedQueue::new(config.normal_capacity()),
            state: AtomicU8::new(PoolState::Created as u8),
            active: ActiveWorkers::default(),
            completed: AtomicUsize::new(0),
            tracker: TaskTracker::new(),
            config,
        });

        Ok(Self {
            shared,
            lifecycle: Mutex::new(()),
            stop_once: OnceCell::new(),
        })
    }

    /// Запускает все воркеры. Требует tokio runtime.
    pub fn start(&self) -> PoolResult<()> {
        let handle = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;
        let _lifecycle = self.lifecycle.lock();

        if let Err(raw) = self.shared.state.compare_exchange(
            PoolState::Created as u8,
            PoolState::Started as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(match PoolState::from_u8(raw) {
                PoolState::Started => PoolError::AlreadyStarted,
                _ => PoolError::Stopped,
            });
        }

        self.launch_workers(&handle);
        Ok(())
    }

    fn launch_workers(&self, handle: &Handle) {
        let workers = self.shared.config.workers;
        let dedicated = self.shared.config.dedicated_urgent_workers();

        for worker in 0..workers {
            let shared = Arc::clone(&self.shared);
            if worker < dedicated {
                self.shared.tracker.spawn_on(shared.urgent_only_loop(worker), handle);
            } else {
                self.shared.tracker.spawn_on(shared.mixed_loop(worker), handle);
            }
        }

        info!(workers, urgent_only = dedicated, "FixedPool: started");
    }

    /// Ставит задачу в очередь своего класса, ожидая места если очередь полна.
    /// До `start` задачи просто копятся в очереди.
    pub async fn schedule<T: Task>(&self, urgency: Urgency, task: T) -> PoolResult<()> {
        self.enqueue(urgency, Box::new(task)).await
    }

    async fn enqueue(&self, urgency: Urgency, task: BoxedTask) -> PoolResult<()> {
        if self.shared.state() == PoolState::Stopped {
            debug!(%urgency, "FixedPool: rejected task, pool is stopped");
            return Err(PoolError::Stopped);
        }

        match self.shared.queue(urgency).push(task).await {
            Ok(()) => {
                trace!(%urgency, "FixedPool: task queued");
                Ok(())
            }
            Err(_) => {
                debug!(%urgency, "FixedPool: rejected task, pool is stopping");
                Err(PoolError::Stopped)
            }
        }
    }

    /// Закрывает приём, даёт воркерам выбрать уже принятые задачи и ждёт их.
    pub async fn stop(&self) {
        self.stop_once.get_or_init(|| self.shutdown()).await;
    }

    async fn shutdown(&self) {
        info!("FixedPool: stopping");
        {
            let _lifecycle = self.lifecycle.lock();
            let previous = PoolState::from_u8(
                self.shared.state.swap(PoolState::Stopped as u8, Ordering::AcqRel),
            );

            if previous == PoolState::Created {
                match Handle::try_current() {
                    Ok(handle) => {
                        debug!("FixedPool: never started, launching workers to drain");
                        self.launch_workers(&handle);
                    }
                    Err(_) => warn!(
                        queued = self.shared.urgent.len() + self.shared.normal.len(),
                        "FixedPool: no runtime to drain queued tasks"
                    ),
                }
            }
        }

        self.shared.urgent.close();
        self.shared.normal.close();

        self.shared.tracker.close();
        self.shared.tracker.wait().await;

        info!(
            completed = self.shared.completed.load(Ordering::Relaxed),
            "FixedPool: stopped"
        );
    }

    #[inline]
    pub fn state(&self) -> PoolState {
        self.shared.state()
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.shared.config.workers
    }

    #[inline]
    pub fn dedicated_urgent_workers(&self) -> usize {
        self.shared.config.dedicated_urgent_workers()
    }

    /// Workers currently executing a task.
    #[inline]
    pub fn active_workers(&self) -> usize {
        self.shared.active.total()
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            active_workers: self.shared.active.total(),
            active_urgent: self.shared.active.get(Urgency::Urgent),
            active_normal: self.shared.active.get(Urgency::Normal),
            queued_urgent: self.shared.urgent.len(),
            queued_normal: self.shared.normal.len(),
            completed_tasks: self.shared.completed.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl TaskPool for FixedPool {
    fn start(&self) -> PoolResult<()> {
        FixedPool::start(self)
    }

    async fn schedule(&self, urgency: Urgency, task: BoxedTask) -> PoolResult<()> {
        self.enqueue(urgency, task).await
    }

    async fn stop(&self) {
        FixedPool::stop(self).await
    }

    fn metrics(&self) -> PoolMetrics {
        FixedPool::metrics(self)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedicated_share_is_floored_and_capped() {
        assert_eq!(FixedPoolConfig::new(10).dedicated_urgent_workers(), 1);
        assert_eq!(FixedPoolConfig::new(9).dedicated_urgent_workers(), 0);
        assert_eq!(FixedPoolConfig::new(25).dedicated_urgent_workers(), 2);
        let all_urgent = FixedPoolConfig::new(4).with_urgent_share_percent(100);
        assert_eq!(all_urgent.dedicated_urgent_workers(), 3);
        let single = FixedPoolConfig::new(1).with_urgent_share_percent(100);
        assert_eq!(single.dedicated_urgent_workers(), 0);
    }

    #[test]
    fn queue_capacities_follow_worker_count() {
        let pool = FixedPool::new(3).unwrap();
        assert_eq!(pool.shared.urgent.capacity(), 6);
        assert_eq!(pool.shared.normal.capacity(), 15_000);
        assert_eq!(pool.state(), PoolState::Created);
    }

    #[test]
    fn start_outside_runtime_fails() {
        let pool = FixedPool::new(2).unwrap();
        assert_eq!(pool.start(), Err(PoolError::NoRuntime));
        assert_eq!(pool.state(), PoolState::Created);
    }
}
