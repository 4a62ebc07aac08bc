/// Shared Tracker Scheduler Pool
///
/// One process-wide pool runs the recurring update of every tracker:
/// - A single timer thread keeps a deadline heap and dispatches due jobs
/// - A rayon worker pool executes job bodies concurrently
/// - Firings of the same job are strictly serialized: the next occurrence is
///   enqueued only after the current one returns (or panics)
/// - A panic escaping a job body is caught, logged, and never stops the
///   job's schedule or the worker that ran it

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::constants::scheduler as tuning;
use crate::error::{RigError, RigResult};

/// Configuration for the scheduler pool
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker threads executing job bodies.
    pub workers: usize,
    /// Thread name prefix for workers and the timer thread.
    pub thread_name_prefix: String,
    /// Stack size for worker threads (in bytes).
    pub stack_size: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: tuning::WORKER_THREADS,
            thread_name_prefix: tuning::WORKER_NAME_PREFIX.to_string(),
            stack_size: Some(tuning::WORKER_STACK_SIZE),
        }
    }
}

/// Shared cancellation state of one recurring job
#[derive(Debug, Default)]
struct JobState {
    cancelled: AtomicBool,
}

/// Cancellable handle to a recurring job
///
/// Cheap to clone; cancelling any clone cancels the job. Cancellation takes
/// effect no later than the job's next deadline.
#[derive(Debug, Clone)]
pub struct JobHandle {
    state: Arc<JobState>,
}

impl JobHandle {
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }
}

/// A recurring job waiting in the timer heap
struct ScheduledJob {
    deadline: Instant,
    interval: Duration,
    name: String,
    state: Arc<JobState>,
    body: Arc<dyn Fn() + Send + Sync>,
    resubmit: Sender<TimerCommand>,
}

impl PartialEq for ScheduledJob {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}

impl Eq for ScheduledJob {}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledJob {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deadline.cmp(&other.deadline)
    }
}

enum TimerCommand {
    Submit(ScheduledJob),
}

/// Global scheduler pool instance
static SCHEDULER_POOL: OnceLock<SchedulerPool> = OnceLock::new();

/// Process-wide scheduler shared by all trackers
pub struct SchedulerPool {
    submit: Sender<TimerCommand>,
    workers: Arc<ThreadPool>,
    worker_count: usize,
}

impl SchedulerPool {
    /// Initialize the global pool with an explicit configuration.
    ///
    /// Fails if the global pool already exists.
    pub fn initialize(config: SchedulerConfig) -> RigResult<()> {
        let pool = Self::with_config(config)?;
        SCHEDULER_POOL
            .set(pool)
            .map_err(|_| RigError::SchedulerAlreadyInitialized)
    }

    /// Get the global pool, creating it with defaults on first use.
    pub fn global() -> &'static SchedulerPool {
        SCHEDULER_POOL.get_or_init(|| {
            Self::with_config(SchedulerConfig::default())
                .expect("Failed to create default scheduler pool")
        })
    }

    /// Create a standalone pool. Prefer [`SchedulerPool::global`] outside of
    /// tests and embedders that manage their own lifecycle.
    pub fn with_config(config: SchedulerConfig) -> RigResult<Self> {
        if config.workers == 0 {
            return Err(RigError::PoolBuild {
                message: "worker count must be greater than 0".to_string(),
            });
        }

        let prefix = config.thread_name_prefix.clone();
        let mut builder = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(move |idx| format!("{}-{}", prefix, idx));

        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let workers = Arc::new(builder.build().map_err(|e| RigError::PoolBuild {
            message: e.to_string(),
        })?);

        let (submit, receive) = crossbeam_channel::unbounded();
        let timer_workers = workers.clone();
        std::thread::Builder::new()
            .name(format!("{}-timer", config.thread_name_prefix))
            .spawn(move || timer_loop(receive, timer_workers))
            .map_err(|e| RigError::TimerSpawn {
                message: e.to_string(),
            })?;

        log::debug!("scheduler pool started with {} workers", config.workers);

        Ok(Self {
            submit,
            workers,
            worker_count: config.workers,
        })
    }

    /// Schedule `body` to run at a fixed rate, first firing one `interval`
    /// from now.
    ///
    /// Firings of the returned job never overlap; firings of distinct jobs
    /// run concurrently on the worker pool and are unordered relative to each
    /// other. `name` is used purely for diagnostics.
    pub fn schedule_fixed_rate(
        &self,
        name: impl Into<String>,
        interval: Duration,
        body: impl Fn() + Send + Sync + 'static,
    ) -> RigResult<JobHandle> {
        if interval.is_zero() {
            return Err(RigError::ZeroInterval);
        }

        let state = Arc::new(JobState::default());
        let job = ScheduledJob {
            deadline: Instant::now() + interval,
            interval,
            name: name.into(),
            state: state.clone(),
            body: Arc::new(body),
            resubmit: self.submit.clone(),
        };

        self.submit
            .send(TimerCommand::Submit(job))
            .map_err(|_| RigError::SchedulerStopped)?;

        Ok(JobHandle { state })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Number of worker threads currently idle is not tracked; this exposes
    /// the rayon pool for embedders that want to co-schedule one-shot work.
    pub fn workers(&self) -> &Arc<ThreadPool> {
        &self.workers
    }
}

fn timer_loop(receive: Receiver<TimerCommand>, workers: Arc<ThreadPool>) {
    let mut queue: BinaryHeap<Reverse<ScheduledJob>> = BinaryHeap::new();

    loop {
        let command = match queue.peek() {
            Some(Reverse(next)) => {
                let now = Instant::now();
                if next.deadline <= now {
                    Err(RecvTimeoutError::Timeout)
                } else {
                    receive.recv_timeout(next.deadline - now)
                }
            }
            None => receive.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match command {
            Ok(TimerCommand::Submit(job)) => {
                if !job.state.cancelled.load(Ordering::SeqCst) {
                    queue.push(Reverse(job));
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        while queue
            .peek()
            .map_or(false, |Reverse(job)| job.deadline <= now)
        {
            if let Some(Reverse(job)) = queue.pop() {
                if job.state.cancelled.load(Ordering::SeqCst) {
                    continue;
                }
                dispatch(&workers, job);
            }
        }
    }

    log::debug!("scheduler timer thread exiting");
}

/// Run one firing on the worker pool, then hand the job back to the timer.
///
/// Resubmitting only after the body returns is what serializes firings of a
/// single job.
fn dispatch(workers: &ThreadPool, mut job: ScheduledJob) {
    workers.spawn(move || {
        let result = catch_unwind(AssertUnwindSafe(|| (job.body)()));
        if result.is_err() {
            log::error!(
                "scheduled job '{}' panicked; schedule continues at next interval",
                job.name
            );
        }

        if job.state.cancelled.load(Ordering::SeqCst) {
            return;
        }

        // Fixed-rate: advance from the previous deadline, skipping any
        // periods the firing overran.
        let now = Instant::now();
        job.deadline += job.interval;
        while job.deadline <= now {
            job.deadline += job.interval;
        }

        let name = job.name.clone();
        let resubmit = job.resubmit.clone();
        if resubmit.send(TimerCommand::Submit(job)).is_err() {
            log::debug!("scheduler stopped; dropping job '{}'", name);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn test_pool() -> SchedulerPool {
        SchedulerPool::with_config(SchedulerConfig {
            workers: 4,
            thread_name_prefix: "sched-test".to_string(),
            stack_size: None,
        })
        .expect("Failed to create test scheduler pool")
    }

    #[test]
    fn test_zero_interval_rejected() {
        let pool = test_pool();
        let result = pool.schedule_fixed_rate("zero", Duration::ZERO, || {});
        assert!(matches!(result, Err(RigError::ZeroInterval)));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = SchedulerPool::with_config(SchedulerConfig {
            workers: 0,
            thread_name_prefix: "sched-test".to_string(),
            stack_size: None,
        });
        assert!(matches!(result, Err(RigError::PoolBuild { .. })));
    }

    #[test]
    fn test_recurring_job_fires_repeatedly() {
        let pool = test_pool();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let handle = pool
            .schedule_fixed_rate("counter", Duration::from_millis(5), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .expect("Failed to schedule job");

        thread::sleep(Duration::from_millis(200));
        handle.cancel();

        assert!(
            fired.load(Ordering::SeqCst) >= 5,
            "expected several firings, got {}",
            fired.load(Ordering::SeqCst)
        );
    }

    #[test]
    fn test_cancel_stops_future_firings() {
        let pool = test_pool();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let handle = pool
            .schedule_fixed_rate("cancelled", Duration::from_millis(5), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .expect("Failed to schedule job");

        thread::sleep(Duration::from_millis(50));
        handle.cancel();
        assert!(handle.is_cancelled());

        // Allow any in-flight firing to drain, then verify the count froze.
        thread::sleep(Duration::from_millis(30));
        let settled = fired.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(settled, fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_same_job_never_overlaps() {
        let pool = test_pool();
        let inside = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));
        let (inside_flag, overlap_flag) = (inside.clone(), overlapped.clone());

        let handle = pool
            .schedule_fixed_rate("slow", Duration::from_millis(5), move || {
                if inside_flag.swap(true, Ordering::SeqCst) {
                    overlap_flag.store(true, Ordering::SeqCst);
                }
                thread::sleep(Duration::from_millis(20));
                inside_flag.store(false, Ordering::SeqCst);
            })
            .expect("Failed to schedule job");

        thread::sleep(Duration::from_millis(200));
        handle.cancel();

        assert!(!overlapped.load(Ordering::SeqCst), "firings overlapped");
    }

    #[test]
    fn test_panicking_job_keeps_rescheduling() {
        let pool = test_pool();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let handle = pool
            .schedule_fixed_rate("panicky", Duration::from_millis(5), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                panic!("intentional test panic");
            })
            .expect("Failed to schedule job");

        thread::sleep(Duration::from_millis(150));
        handle.cancel();

        assert!(
            fired.load(Ordering::SeqCst) >= 3,
            "panicking job stopped firing after {} runs",
            fired.load(Ordering::SeqCst)
        );
    }

    #[test]
    fn test_distinct_jobs_run_concurrently() {
        let pool = test_pool();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..3 {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            let handle = pool
                .schedule_fixed_rate(format!("job-{}", i), Duration::from_millis(5), move || {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(current, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(15));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
                .expect("Failed to schedule job");
            handles.push(handle);
        }

        thread::sleep(Duration::from_millis(200));
        for handle in &handles {
            handle.cancel();
        }

        assert!(
            peak.load(Ordering::SeqCst) >= 2,
            "jobs never ran concurrently"
        );
    }
}
