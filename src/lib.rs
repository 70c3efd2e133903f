//! Пул задач с двумя классами срочности и ограниченной конкурентностью
//!
//! # Features
//! - `FixedPool`: фиксированный набор воркеров, часть из них только для срочных задач
//! - `ElasticPool`: воркер на задачу, отдельные лимиты для срочных и обычных задач
//! - Graceful shutdown: `stop` дожидается всех принятых задач
//! - Блокирующие задачи выполняются на blocking pool tokio
//! - Метрики: активные воркеры, длина очередей, выполненные задачи

pub mod errors;
pub mod limiter;
pub mod model;
pub mod pool;
pub mod queue;
pub mod result;
pub mod task;

pub use errors::PoolError;
pub use model::{PoolMetrics, PoolState, Urgency};
pub use pool::{ElasticPool, ElasticPoolConfig, FixedPool, FixedPoolConfig, TaskPool};
pub use result::PoolResult;
pub use task::{BoxedTask, SyntheticTask, Task};
