pub mod pool;

pub use pool::{JobHandle, SchedulerConfig, SchedulerPool};
