use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::error;


/// Единица работы для пула. Владение переходит к воркеру, который её выполняет.
pub trait Task: Send + 'static {
    fn execute(self: Box<Self>);
}

pub type BoxedTask = Box<dyn Task>;

impl<F> Task for F
where
    F: FnOnce() + Send + 'static,
{
    #[inline]
    fn execute(self: Box<Self>) {
        (*self)()
    }
}


/// Синтетическая нагрузка с фиксированной задержкой
#[derive(Debug, Clone)]
pub struct SyntheticTask {
    latency: Duration,
    completed: Option<Arc<AtomicUsize>>,
}

impl SyntheticTask {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            completed: None,
        }
    }

    pub fn with_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.completed = Some(counter);
        self
    }

    #[inline]
    pub fn latency(&self) -> Duration {
        self.latency
    }
}

impl Task for SyntheticTask {
    fn execute(self: Box<Self>) {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if let Some(counter) = &self.completed {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}


/// Выполняет задачу на blocking pool. Паника логируется, но не ретраится.
/// Возвращает `true`, если задача завершилась штатно.
pub(crate) async fn run(task: BoxedTask) -> bool {
    match tokio::task::spawn_blocking(move || task.execute()).await {
        Ok(()) => true,
        Err(join_err) if join_err.is_panic() => {
            error!("task panicked during execution");
            false
        }
        Err(join_err) => {
            error!(error = %join_err, "task execution aborted");
            false
        }
    }
}
