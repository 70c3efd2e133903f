//! Эластичный пул: воркер создаётся на каждую принятую задачу и завершается
//! после выполнения ровно одной задачи.
//!
//! Конкурентность каждого класса ограничена своим [`ConcurrencyLimit`],
//! неиспользованная ёмкость ничего не стоит. `schedule` ждёт только места в
//! очереди, слот воркера захватывает отслеживаемая фоновая задача.

use super::{ActiveWorkers, TaskPool};
use crate::{
    errors::PoolError,
    limiter::{ConcurrencyLimit, Slot},
    model::{PoolMetrics, PoolState, Urgency},
    queue::BoundedQueue,
    result::PoolResult,
    task::{self, BoxedTask, Task},
};
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicU8, AtomicUsize, Ordering},
    Arc,
};
use tokio::{runtime::Handle, sync::OnceCell};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, trace, warn};


#[derive(Debug, Clone)]
pub struct ElasticPoolConfig {
    pub max_urgent_workers: usize,
    pub max_normal_workers: usize,
    pub urgent_queue_factor: usize,
    pub normal_queue_factor: usize,
}

impl Default for ElasticPoolConfig {
    fn default() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            max_urgent_workers: num_cpus,
            max_normal_workers: num_cpus * 2,
            urgent_queue_factor: 2,
            normal_queue_factor: 10,
        }
    }
}

impl ElasticPoolConfig {
    pub fn new(max_urgent_workers: usize, max_normal_workers: usize) -> Self {
        Self {
            max_urgent_workers,
            max_normal_workers,
            ..Default::default()
        }
    }

    pub fn with_queue_factors(mut self, urgent: usize, normal: usize) -> Self {
        self.urgent_queue_factor = urgent.max(1);
        self.normal_queue_factor = normal.max(1);
        self
    }

    pub fn validate(&self) -> PoolResult<()> {
        if self.max_urgent_workers == 0 {
            return Err(PoolError::ZeroUrgentWorkers);
        }
        if self.max_normal_workers == 0 {
            return Err(PoolError::ZeroNormalWorkers);
        }
        Ok(())
    }
}


struct Lane {
    queue: BoundedQueue<BoxedTask>,
    limit: ConcurrencyLimit,
}

impl Lane {
    fn new(ceiling: usize, queue_factor: usize) -> Self {
        Self {
            queue: BoundedQueue::new(ceiling.saturating_mul(queue_factor)),
            limit: ConcurrencyLimit::new(ceiling),
        }
    }
}

struct Shared {
    urgent: Lane,
    normal: Lane,
    state: AtomicU8,
    shutdown: CancellationToken,
    active: ActiveWorkers,
    completed: AtomicUsize,
    // live workers, pending materializations and in-flight schedule calls
    tracker: TaskTracker,
}

impl Shared {
    #[inline]
    fn lane(&self, urgency: Urgency) -> &Lane {
        match urgency {
            Urgency::Urgent => &self.urgent,
            Urgency::Normal => &self.normal,
        }
    }

    #[inline]
    fn state(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::Acquire))
    }

    async fn materialize(self: Arc<Self>, urgency: Urgency) {
        let Some(slot) = self.lane(urgency).limit.acquire_or_cancel(&self.shutdown).await else {
            trace!(%urgency, "ElasticPool: worker not launched, pool is stopping");
            return;
        };
        self.work(urgency, slot).await;
    }

    /// Один воркер: не более одной задачи, затем выход.
    async fn work(&self, urgency: Urgency, slot: Slot) {
        let active = self.active.enter(urgency);
        debug!(%urgency, active = self.active.total(), "ElasticPool: launched worker");

        let queue = &self.lane(urgency).queue;
        let next = tokio::select! {
            biased;
            task = queue.pop() => task,
            _ = self.shutdown.cancelled() => None,
        };

        if let Some(task) = next {
            if task::run(task).await {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
        }

        drop(slot);
        drop(active);
        debug!(%urgency, active = self.active.total(), "ElasticPool: worker finished");
    }
}


pub struct ElasticPool {
    shared: Arc<Shared>,
    stop_once: OnceCell<()>,
}

impl ElasticPool {
    pub fn new(max_urgent_workers: usize, max_normal_workers: usize) -> PoolResult<Self> {
        Self::with_config(ElasticPoolConfig::new(max_urgent_workers, max_normal_workers))
    }

    pub fn with_config(config: ElasticPoolConfig) -> PoolResult<Self> {
        if let Err(err) = config.validate() {
            error!(%err, "ElasticPool: invalid configuration");
            return Err(err);
        }

        info!(
            max_urgent_workers = config.max_urgent_workers,
            max_normal_workers = config.max_normal_workers,
            "ElasticPool: created"
        );

        let shared = Arc::new(Shared {
            urgent: Lane::new(config.max_urgent_workers, config.urgent_queue_factor),
            normal: Lane::new(config.max_normal_workers, config.normal_queue_factor),
            state: AtomicU8::new(PoolState::Created as u8),
            shutdown: CancellationToken::new(),
            active: ActiveWorkers::default(),
            completed: AtomicUsize::new(0),
            tracker: TaskTracker::new(),
        });

        Ok(Self {
            shared,
            stop_once: OnceCell::new(),
        })
    }

    /// Воркеры создаются лениво в `schedule`, здесь только смена состояния.
    pub fn start(&self) -> PoolResult<()> {
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
        info!("ElasticPool: started, workers are created per task");
        Ok(())
    }

    /// `Err(PoolError::Stopped)`, если пул остановлен или останавливается, пока
    /// вызов ждёт места в очереди. Задача тогда отбрасывается невыполненной.
    /// Вне tokio runtime возвращает `Err(PoolError::NoRuntime)`.
    pub async fn schedule<T: Task>(&self, urgency: Urgency, task: T) -> PoolResult<()> {
        self.enqueue(urgency, Box::new(task)).await
    }

    async fn enqueue(&self, urgency: Urgency, task: BoxedTask) -> PoolResult<()> {
        let handle = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;
        let _in_flight = self.shared.tracker.token();
        if self.shared.state() == PoolState::Stopped {
            return Err(PoolError::Stopped);
        }

        let queue = &self.shared.lane(urgency).queue;
        let accepted = tokio::select! {
            biased;
            _ = self.shared.shutdown.cancelled() => false,
            pushed = queue.push(task) => pushed.is_ok(),
        };
        if !accepted {
            debug!(%urgency, "ElasticPool: pool stopped while scheduling task");
            return Err(PoolError::Stopped);
        }

        self.shared
            .tracker
            .spawn_on(Arc::clone(&self.shared).materialize(urgency), &handle);
        Ok(())
    }

    /// Идемпотентен. Возвращается только когда все принятые задачи выполнены.
    pub async fn stop(&self) {
        self.stop_once.get_or_init(|| self.shutdown()).await;
    }

    async fn shutdown(&self) {
        info!("ElasticPool: stopping");
        self.shared
            .state
            .store(PoolState::Stopped as u8, Ordering::Release);
        self.shared.shutdown.cancel();

        self.shared.urgent.queue.close();
        self.shared.normal.queue.close();

        self.shared.tracker.close();
        self.shared.tracker.wait().await;
        debug!("ElasticPool: all active workers stopped");

        let drained = self.drain_abandoned().await;

        self.shared.urgent.limit.close();
        self.shared.normal.limit.close();

        info!(
            drained,
            completed = self.shared.completed.load(Ordering::Relaxed),
            "ElasticPool: stopped"
        );
    }

    /// Задачи, чей запуск воркера был брошен при остановке.
    /// Воркеры дочистки живут в `tracker`, поэтому переживают отмену `stop`:
    /// повторный `stop` сначала дожидается их, затем дочищает остаток.
    async fn drain_abandoned(&self) -> usize {
        let Ok(handle) = Handle::try_current() else {
            warn!(
                queued = self.shared.urgent.queue.len() + self.shared.normal.queue.len(),
                "ElasticPool: no runtime to drain queued tasks"
            );
            return 0;
        };
        let mut drained = 0;

        for urgency in [Urgency::Urgent, Urgency::Normal] {
            let lane = self.shared.lane(urgency);
            for _ in 0..lane.queue.len() {
                let Ok(slot) = lane.limit.acquire().await else {
                    break;
                };
                let shared = Arc::clone(&self.shared);
                self.shared
                    .tracker
                    .spawn_on(async move { shared.work(urgency, slot).await }, &handle);
                drained += 1;
            }
        }

        self.shared.tracker.wait().await;
        drained
    }

    #[inline]
    pub fn state(&self) -> PoolState {
        self.shared.state()
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.state() == PoolState::Stopped
    }

    /// Snapshot of live workers across both classes. Not an admission signal.
    #[inline]
    pub fn active_workers(&self) -> usize {
        self.shared.active.total()
    }

    #[inline]
    pub fn max_urgent_workers(&self) -> usize {
        self.shared.urgent.limit.capacity()
    }

    #[inline]
    pub fn max_normal_workers(&self) -> usize {
        self.shared.normal.limit.capacity()
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            active_workers: self.shared.active.total(),
            active_urgent: self.shared.active.get(Urgency::Urgent),
            active_normal: self.shared.active.get(Urgency::Normal),
            queued_urgent: self.shared.urgent.queue.len(),
            queued_normal: self.shared.normal.queue.len(),
            completed_tasks: self.shared.completed.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl TaskPool for ElasticPool {
    fn start(&self) -> PoolResult<()> {
        ElasticPool::start(self)
    }

    async fn schedule(&self, urgency: Urgency, task: BoxedTask) -> PoolResult<()> {
        self.enqueue(urgency, task).await
    }

    async fn stop(&self) {
        ElasticPool::stop(self).await
    }

    fn metrics(&self) -> PoolMetrics {
        ElasticPool::metrics(self)
    }
}
