//! Crate-wide error handling
//!
//! Fallible operations in this crate are configuration and pool construction
//! failures; per-viewer operation failures are reported as plain booleans and
//! never abort a tracker's update loop.

use thiserror::Error;

/// Type alias for rigtrack operation results
pub type RigResult<T> = Result<T, RigError>;

/// Errors produced by the tracker scheduling core
#[derive(Debug, Error)]
pub enum RigError {
    /// A recurring job was registered with a zero interval.
    #[error("recurring interval must be greater than zero")]
    ZeroInterval,

    /// `SchedulerPool::initialize` was called after the global pool existed.
    #[error("scheduler pool already initialized")]
    SchedulerAlreadyInitialized,

    /// The worker pool could not be constructed.
    #[error("failed to build scheduler pool: {message}")]
    PoolBuild { message: String },

    /// The timer thread could not be spawned.
    #[error("failed to spawn scheduler timer thread: {message}")]
    TimerSpawn { message: String },

    /// The scheduler's timer thread is gone; no new jobs can be accepted.
    #[error("scheduler pool has stopped")]
    SchedulerStopped,
}
