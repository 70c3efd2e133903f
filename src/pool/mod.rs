//! Два варианта пула с общим контрактом `start` / `schedule` / `stop`.

pub mod elastic;
pub mod fixed;

pub use elastic::{ElasticPool, ElasticPoolConfig};
pub use fixed::{FixedPool, FixedPoolConfig};

use super::{
    model::{PoolMetrics, Urgency},
    result::PoolResult,
    task::BoxedTask,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};


#[async_trait]
pub trait TaskPool: Send + Sync {
    fn start(&self) -> PoolResult<()>;

    /// `Err(PoolError::Stopped)` once the pool has begun stopping.
    async fn schedule(&self, urgency: Urgency, task: BoxedTask) -> PoolResult<()>;

    /// Drains accepted work and waits for every worker. Idempotent.
    async fn stop(&self);

    fn metrics(&self) -> PoolMetrics;
}


/// Live worker counters, one per class.
#[derive(Debug, Default)]
pub(crate) struct ActiveWorkers {
    urgent: AtomicUsize,
    normal: AtomicUsize,
}

impl ActiveWorkers {
    #[inline]
    fn counter(&self, urgency: Urgency) -> &AtomicUsize {
        match urgency {
            Urgency::Urgent => &self.urgent,
            Urgency::Normal => &self.normal,
        }
    }

    pub(crate) fn enter(&self, urgency: Urgency) -> ActiveGuard<'_> {
        self.counter(urgency).fetch_add(1, Ordering::AcqRel);
        ActiveGuard { workers: self, urgency }
    }

    #[inline]
    pub(crate) fn get(&self, urgency: Urgency) -> usize {
        self.counter(urgency).load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn total(&self) -> usize {
        self.get(Urgency::Urgent) + self.get(Urgency::Normal)
    }
}

pub(crate) struct ActiveGuard<'a> {
    workers: &'a ActiveWorkers,
    urgency: Urgency,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.workers.counter(self.urgency).fetch_sub(1, Ordering::AcqRel);
    }
}
