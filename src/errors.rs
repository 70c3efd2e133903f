use thiserror::Error;


#[derive(Debug, PartialEq, Eq, Clone, Copy, Error)]
pub enum PoolError {
    #[error("worker count cannot be zero")]
    ZeroWorkers,
    #[error("max urgent workers cannot be zero")]
    ZeroUrgentWorkers,
    #[error("max normal workers cannot be zero")]
    ZeroNormalWorkers,
    #[error("pool already started")]
    AlreadyStarted,
    #[error("pool is stopped")]
    Stopped,
    #[error("no tokio runtime available")]
    NoRuntime,
    #[error("concurrency limiter closed")]
    LimiterClosed,
}
