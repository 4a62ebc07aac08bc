// Rigtrack constants - SINGLE SOURCE OF TRUTH
//
// All timing and capacity tunables used by the tracker scheduling core live
// in this file. Do NOT define tunable constants anywhere else in the crate.

/// Scheduling cadence and pool capacity
pub mod scheduler {
    /// Fine-grained tracker tick interval, in milliseconds.
    pub const TRACKER_TICK_INTERVAL_MS: u64 = 10;

    /// Coarse logical tick duration, in milliseconds.
    pub const LOGICAL_TICK_MS: u64 = 50;

    /// Number of tracker ticks per logical tick.
    pub const LOGICAL_TICK_MULTIPLIER: u64 = LOGICAL_TICK_MS / TRACKER_TICK_INTERVAL_MS;

    /// Worker threads in the shared scheduler pool.
    ///
    /// This is a soft capacity bound, sized to comfortably exceed the
    /// expected number of simultaneously scheduled trackers, not a hard
    /// architectural limit.
    pub const WORKER_THREADS: usize = 256;

    /// Stack size for scheduler worker threads (in bytes).
    pub const WORKER_STACK_SIZE: usize = 512 * 1024;

    /// Thread name prefix for scheduler workers.
    pub const WORKER_NAME_PREFIX: &str = "rigtrack-worker";
}

/// Model geometry defaults
pub mod model {
    /// Reference height used by the bounding-size scale policy: a model whose
    /// pipeline reports this height renders at scale 1.0.
    pub const BASE_MODEL_HEIGHT: f32 = 2.0;
}
