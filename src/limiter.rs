use super::{
    errors::PoolError,
    result::PoolResult,
};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;


/// Одно место в лимите конкурентности. Освобождается при drop на любом пути.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}


/// Счётный семафор, ограничивающий число одновременных воркеров одного класса
#[derive(Debug, Clone)]
pub struct ConcurrencyLimit {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimit {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub async fn acquire(&self) -> PoolResult<Slot> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map(|permit| Slot { _permit: permit })
            .map_err(|_| PoolError::LimiterClosed)
    }

    /// `None` if `cancel` fires first (or already fired) or the limit is closed.
    pub async fn acquire_or_cancel(&self, cancel: &CancellationToken) -> Option<Slot> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            slot = self.acquire() => slot.ok(),
        }
    }

    pub fn try_acquire(&self) -> Option<Slot> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| Slot { _permit: permit })
    }

    pub fn close(&self) {
        self.semaphore.close();
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    #[inline]
    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }
}
