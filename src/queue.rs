use std::sync::atomic::{AtomicBool, Ordering};
use crossbeam::queue::ArrayQueue;
use parking_lot::RwLock;
use tokio::sync::Notify;


#[derive(Debug, PartialEq, Eq)]
pub enum TryPushError<T> {
    Full(T),
    Closed(T),
}

impl<T> TryPushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TryPushError::Full(item) | TryPushError::Closed(item) => item,
        }
    }
}

/// Очередь закрыта, элемент возвращается вызывающему
#[derive(Debug, PartialEq, Eq)]
pub struct QueueClosed<T>(pub T);


/// Ограниченная FIFO очередь (MPMC) с асинхронным ожиданием места и элементов.
///
/// Закрытие останавливает только приём: потребители дочитывают буфер и
/// получают `None`, когда очередь закрыта и пуста.
pub struct BoundedQueue<T> {
    items: ArrayQueue<T>,
    closed: AtomicBool,
    // pushes hold it shared, close takes it exclusively
    gate: RwLock<()>,
    not_empty: Notify,
    not_full: Notify,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: ArrayQueue::new(capacity.max(1)),
            closed: AtomicBool::new(false),
            gate: RwLock::new(()),
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    pub fn try_push(&self, item: T) -> Result<(), TryPushError<T>> {
        let _gate = self.gate.read();
        if self.closed.load(Ordering::Acquire) {
            return Err(TryPushError::Closed(item));
        }
        match self.items.push(item) {
            Ok(()) => {
                self.not_empty.notify_one();
                Ok(())
            }
            Err(item) => Err(TryPushError::Full(item)),
        }
    }

    /// Ждёт свободного места. Ошибка только если очередь закрыта.
    pub async fn push(&self, mut item: T) -> Result<(), QueueClosed<T>> {
        loop {
            let space = self.not_full.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            match self.try_push(item) {
                Ok(()) => return Ok(()),
                Err(TryPushError::Closed(item)) => return Err(QueueClosed(item)),
                Err(TryPushError::Full(back)) => item = back,
            }

            space.await;
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        let item = self.items.pop();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Cancel-safe: an item is only taken inside the poll that returns it.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let ready = self.not_empty.notified();
            tokio::pin!(ready);
            ready.as_mut().enable();

            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if self.is_closed() {
                // no push can land after close, so this check is final
                return self.try_pop();
            }

            ready.await;
        }
    }

    /// Returns `true` if this call closed the queue.
    pub fn close(&self) -> bool {
        let first = {
            let _gate = self.gate.write();
            !self.closed.swap(true, Ordering::AcqRel)
        };
        if first {
            self.not_empty.notify_waiters();
            self.not_full.notify_waiters();
        }
        first
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    #[test]
    fn fifo_order_and_capacity() {
        let queue = BoundedQueue::new(3);
        assert_eq!(queue.capacity(), 3);
        for i in 0..3 {
            assert!(queue.try_push(i).is_ok());
        }
        assert_eq!(queue.try_push(99), Err(TryPushError::Full(99)));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_pop(), Some(0));
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), Some(2));
        assert!(queue.is_empty());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let queue: BoundedQueue<u8> = BoundedQueue::new(0);
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn closed_queue_rejects_but_keeps_items() {
        let queue = BoundedQueue::new(4);
        queue.try_push(1).unwrap();
        assert!(queue.close());
        assert!(!queue.close());
        assert_eq!(queue.try_push(2), Err(TryPushError::Closed(2)));
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), None);
    }

    #[tokio::test]
    async fn pop_drains_then_ends_after_close() {
        let queue = BoundedQueue::new(4);
        queue.push("a").await.unwrap();
        queue.push("b").await.unwrap();
        queue.close();
        assert_eq!(queue.pop().await, Some("a"));
        assert_eq!(queue.pop().await, Some("b"));
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn push_waits_for_space() {
        let queue = Arc::new(BoundedQueue::new(1));
        queue.push(1).await.unwrap();

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.push(2).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished());

        assert_eq!(queue.pop().await, Some(1));
        assert!(producer.await.unwrap().is_ok());
        assert_eq!(queue.pop().await, Some(2));
    }

    #[tokio::test]
    async fn close_wakes_blocked_producer_and_consumer() {
        let full = Arc::new(BoundedQueue::new(1));
        full.push(0).await.unwrap();
        let producer = {
            let full = full.clone();
            tokio::spawn(async move { full.push(7).await })
        };

        let empty: Arc<BoundedQueue<i32>> = Arc::new(BoundedQueue::new(1));
        let consumer = {
            let empty = empty.clone();
            tokio::spawn(async move { empty.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        full.close();
        empty.close();

        assert_eq!(producer.await.unwrap(), Err(QueueClosed(7)));
        assert_eq!(consumer.await.unwrap(), None);
    }

    #[tokio::test]
    async fn dropped_pop_does_not_lose_items() {
        let queue = BoundedQueue::new(2);
        let timed_out = tokio::time::timeout(Duration::from_millis(10), queue.pop()).await;
        assert!(timed_out.is_err());
        queue.push(5).await.unwrap();
        assert_eq!(queue.pop().await, Some(5));
    }
}
