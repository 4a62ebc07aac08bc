//! Tracker core: per-model lifecycle, scheduling, and update batching
//!
//! A `Tracker` owns the recurring update of one composite model: it
//! self-schedules onto the shared scheduler pool when its first viewer
//! arrives, runs a composable handler chain at a fine-grained tick rate,
//! flushes a tick's worth of mutations through its bundler set, and
//! self-cancels when unobserved. All externally reachable state is safe to
//! touch from arbitrary threads.

pub mod bundler;
pub mod dummy;
pub mod handler;
pub mod modifier;
pub mod rotation;

use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::constants::scheduler::{LOGICAL_TICK_MULTIPLIER, TRACKER_TICK_INTERVAL_MS};
use crate::event::{TrackerEvent, TrackerNotifier};
use crate::pipeline::{
    Animation, AnimationModifier, Brightness, DisplayHandle, LoopMode,
    OutputBatch, PartFilter, PartInfo, PartItem, RenderPipeline, ViewerId,
};
use crate::scheduler::{JobHandle, SchedulerPool};

use bundler::{BatchKind, BundlerSet};
use handler::HandlerChain;
use modifier::{TrackerModifier, TrackerSnapshot};
use rotation::{Location, ModelRotation, ModelRotator, ModelScaler};

/// 128-bit unique tracker identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackerId {
    pub high: u64,
    pub low: u64,
}

impl TrackerId {
    /// Create a new random id.
    pub fn new() -> Self {
        Self {
            high: rand::random(),
            low: rand::random(),
        }
    }

    pub const fn nil() -> Self {
        Self { high: 0, low: 0 }
    }

    pub fn is_nil(&self) -> bool {
        self.high == 0 && self.low == 0
    }
}

impl fmt::Display for TrackerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.high, self.low)
    }
}

impl Default for TrackerId {
    fn default() -> Self {
        Self::nil()
    }
}

/// Deferred action run exactly once at the next logical-tick boundary.
pub type QueuedTask = Box<dyn FnOnce() + Send>;

/// Externally replaceable source of raw rotation input.
pub type RotationSupplier = Arc<dyn Fn() -> ModelRotation + Send + Sync>;

/// Externally replaceable source of the model's location.
pub type LocationSupplier = Arc<dyn Fn() -> Location + Send + Sync>;

/// Hook invoked exactly once when the tracker closes.
pub type CloseHook = Box<dyn Fn(&Tracker) + Send + Sync>;

/// Lifecycle, scheduling, and update batching for one tracked model.
///
/// Identity is name-based: two trackers whose pipelines report the same name
/// are the same logical entity for set/map membership.
pub struct Tracker {
    pipeline: Arc<dyn RenderPipeline>,
    notifier: Arc<dyn TrackerNotifier>,
    modifier: TrackerModifier,
    frame: AtomicU64,
    closed: AtomicBool,
    pending_force_update: AtomicBool,
    pending_removal: AtomicBool,
    rotation_locked: AtomicBool,
    queued_tasks: Mutex<VecDeque<QueuedTask>>,
    handlers: HandlerChain,
    bundlers: Mutex<BundlerSet>,
    rotator: RwLock<ModelRotator>,
    scaler: RwLock<ModelScaler>,
    rotation_supplier: RwLock<RotationSupplier>,
    location_supplier: RwLock<LocationSupplier>,
    close_hooks: Mutex<Vec<CloseHook>>,
    job: Mutex<Option<JobHandle>>,
}

impl Tracker {
    /// Create a tracker bound to a pipeline, wire the default handler chain,
    /// and arm the first-viewer start trigger.
    pub fn new(
        pipeline: Arc<dyn RenderPipeline>,
        modifier: TrackerModifier,
        notifier: Arc<dyn TrackerNotifier>,
    ) -> Arc<Self> {
        let bundlers = Mutex::new(BundlerSet::new(pipeline.as_ref()));
        let tracker = Arc::new(Self {
            pipeline,
            notifier,
            modifier,
            frame: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            pending_force_update: AtomicBool::new(false),
            pending_removal: AtomicBool::new(false),
            rotation_locked: AtomicBool::new(false),
            queued_tasks: Mutex::new(VecDeque::new()),
            handlers: HandlerChain::new(),
            bundlers,
            rotator: RwLock::new(ModelRotator::default()),
            scaler: RwLock::new(ModelScaler::default()),
            rotation_supplier: RwLock::new(Arc::new(|| ModelRotation::ZERO)),
            location_supplier: RwLock::new(Arc::new(Location::default)),
            close_hooks: Mutex::new(Vec::new()),
            job: Mutex::new(None),
        });

        // Default chain, in registration order: per-frame pipeline advance,
        // force-update consumption, then logical-tick rotation push and
        // script advance.
        tracker.on_frame(|t, s| t.pipeline.advance_frame(s.batch_mut(BatchKind::View)));
        tracker.on_frame(|t, s| {
            if t.pending_force_update
                .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                t.pipeline.rebuild_data(s.batch_mut(BatchKind::Data));
            }
        });
        tracker.on_tick(|t, s| {
            let rotation = if t.is_running_single_animation() && t.modifier.lock_on_play_animation
            {
                t.pipeline.rotation()
            } else {
                t.rotation()
            };
            t.pipeline
                .apply_rotation(rotation, s.batch_mut(BatchKind::Tick));
        });
        tracker.on_tick(|t, _| t.pipeline.advance_script());

        tracker.on_close(|t| {
            t.notifier.notify(t, TrackerEvent::Closing);
        });

        tracker.pipeline.set_view_range(modifier.view_range);

        if modifier.sight_trace {
            let weak = Arc::downgrade(&tracker);
            tracker.pipeline.set_view_filter(Arc::new(move |viewer| {
                weak.upgrade()
                    .map_or(false, |t| t.pipeline.line_of_sight(viewer, t.location()))
            }));
        }

        let weak = Arc::downgrade(&tracker);
        tracker.pipeline.set_first_viewer_hook(Box::new(move || {
            if let Some(t) = weak.upgrade() {
                t.start();
            }
        }));

        log::debug!("tracker '{}' created", tracker.name());
        tracker
    }

    // ---- lifecycle ----------------------------------------------------

    /// Install the recurring update job. Idempotent; no-op once closed.
    pub(crate) fn start(self: &Arc<Self>) {
        if self.is_closed() {
            return;
        }
        let mut slot = self.job.lock();
        // A concurrent close() may have claimed `closed` since the unlocked
        // check; once it reads true under the job lock, no job may be
        // installed again.
        if self.is_closed() {
            return;
        }
        if slot.as_ref().map_or(false, |handle| !handle.is_cancelled()) {
            return;
        }

        let weak = Arc::downgrade(self);
        let scheduled = SchedulerPool::global().schedule_fixed_rate(
            self.name(),
            Duration::from_millis(TRACKER_TICK_INTERVAL_MS),
            move || {
                if let Some(tracker) = weak.upgrade() {
                    tracker.tick_once();
                }
            },
        );

        match scheduled {
            Ok(handle) => {
                *slot = Some(handle);
                log::debug!("tracker '{}' scheduler started", self.name());
            }
            Err(error) => {
                log::error!("tracker '{}' could not be scheduled: {}", self.name(), error);
            }
        }
    }

    /// Cancel the recurring job and reset the frame counter. The tracker may
    /// be restarted later by a new viewer. Safe to call redundantly from any
    /// thread.
    pub fn shutdown(&self) {
        let mut slot = self.job.lock();
        if let Some(handle) = slot.take() {
            handle.cancel();
            self.frame.store(0, Ordering::SeqCst);
            log::debug!("tracker '{}' scheduler shutdown", self.name());
        }
    }

    /// Close the tracker: run close hooks exactly once, cancel the schedule,
    /// and despawn from every remaining viewer. Terminal and idempotent.
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let hooks = std::mem::take(&mut *self.close_hooks.lock());
            for hook in &hooks {
                hook(self);
            }
            self.shutdown();
            self.pipeline.despawn_all();
            log::debug!("tracker '{}' closed", self.name());
        }
    }

    /// One scheduled firing: stop when unobserved, otherwise run the guarded
    /// update cycle and advance the frame counter.
    pub(crate) fn tick_once(&self) {
        if self.pipeline.viewer_count() == 0 && !self.is_marked_for_removal() {
            self.shutdown();
            return;
        }
        self.fire();
        self.frame.fetch_add(1, Ordering::SeqCst);
    }

    /// Run one update cycle with fault containment: a panic anywhere in the
    /// chain or flush is logged, the cycle's batches are discarded, and the
    /// schedule survives.
    pub(crate) fn fire(&self) {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.run_update()));
        if outcome.is_err() {
            log::error!(
                "tracker '{}' update faulted; discarding this cycle's batches",
                self.name()
            );
            self.bundlers.lock().discard(self.pipeline.as_ref());
        }
    }

    fn run_update(&self) {
        if self.frame.load(Ordering::SeqCst) % LOGICAL_TICK_MULTIPLIER == 0 {
            self.drain_tasks();
        }
        let mut bundlers = self.bundlers.lock();
        self.handlers.run(self, &mut bundlers);
        bundlers.flush(self.pipeline.as_ref());
    }

    /// Run queued tasks in FIFO enqueue order, each exactly once.
    fn drain_tasks(&self) {
        loop {
            let task = self.queued_tasks.lock().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.job
            .lock()
            .as_ref()
            .map_or(false, |handle| !handle.is_cancelled())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Fine-grained firings since the last (re)start.
    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::SeqCst)
    }

    /// Mark that an external owner intends to remove this tracker; while
    /// set, the schedule keeps running even with zero viewers.
    pub fn mark_for_removal(&self, removal: bool) {
        self.pending_removal.store(removal, Ordering::SeqCst);
    }

    pub fn is_marked_for_removal(&self) -> bool {
        self.pending_removal.load(Ordering::SeqCst)
    }

    /// Remove the model from every viewer without closing the tracker.
    pub fn despawn(&self) {
        if !self.is_closed() {
            self.pipeline.despawn_all();
            log::debug!("tracker '{}' despawned", self.name());
        }
    }

    // ---- registration --------------------------------------------------

    /// Register a handler that runs on every scheduler firing.
    pub fn on_frame(&self, handler: impl Fn(&Tracker, &mut BundlerSet) + Send + Sync + 'static) {
        self.handlers.push(Arc::new(handler));
    }

    /// Register a handler that runs once per logical tick.
    pub fn on_tick(&self, handler: impl Fn(&Tracker, &mut BundlerSet) + Send + Sync + 'static) {
        self.on_tick_every(1, handler);
    }

    /// Register a handler that runs once every `ticks` logical ticks.
    pub fn on_tick_every(
        &self,
        ticks: u64,
        handler: impl Fn(&Tracker, &mut BundlerSet) + Send + Sync + 'static,
    ) {
        self.schedule(LOGICAL_TICK_MULTIPLIER * ticks, handler);
    }

    /// Register a handler that runs once every `period` firings.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero; that is a programming error, not a
    /// runtime condition.
    pub fn schedule(
        &self,
        period: u64,
        handler: impl Fn(&Tracker, &mut BundlerSet) + Send + Sync + 'static,
    ) {
        assert!(period > 0, "handler period must be greater than zero");
        self.on_frame(move |tracker, bundlers| {
            if tracker.frame() % period == 0 {
                handler(tracker, bundlers);
            }
        });
    }

    /// Enqueue a deferred task; it runs exactly once, in FIFO order, at the
    /// next logical-tick boundary.
    pub fn enqueue(&self, task: impl FnOnce() + Send + 'static) {
        self.queued_tasks.lock().push_back(Box::new(task));
    }

    /// Register an additional close hook.
    pub fn on_close(&self, hook: impl Fn(&Tracker) + Send + Sync + 'static) {
        self.close_hooks.lock().push(Box::new(hook));
    }

    // ---- rotation & scale ----------------------------------------------

    /// Displayed rotation: frozen at the pipeline's current value while the
    /// rotation lock is held, otherwise the rotator policy applied to raw
    /// supplier input.
    pub fn rotation(&self) -> ModelRotation {
        if self.rotation_locked.load(Ordering::SeqCst) {
            self.pipeline.rotation()
        } else {
            let raw = (self.rotation_supplier.read())();
            self.rotator.read().apply(raw)
        }
    }

    /// Acquire or release the rotation lock. Returns false when the lock was
    /// already in the requested state.
    pub fn lock_rotation(&self, lock: bool) -> bool {
        self.rotation_locked
            .compare_exchange(!lock, lock, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn rotator(&self) -> ModelRotator {
        self.rotator.read().clone()
    }

    pub fn set_rotator(&self, rotator: ModelRotator) {
        *self.rotator.write() = rotator;
    }

    pub fn scaler(&self) -> ModelScaler {
        self.scaler.read().clone()
    }

    pub fn set_scaler(&self, scaler: ModelScaler) {
        *self.scaler.write() = scaler;
    }

    pub fn set_rotation_supplier(
        &self,
        supplier: impl Fn() -> ModelRotation + Send + Sync + 'static,
    ) {
        *self.rotation_supplier.write() = Arc::new(supplier);
    }

    pub fn set_location_supplier(&self, supplier: impl Fn() -> Location + Send + Sync + 'static) {
        *self.location_supplier.write() = Arc::new(supplier);
    }

    /// Current model location, as reported by the installed supplier.
    pub fn location(&self) -> Location {
        (self.location_supplier.read())()
    }

    // ---- state queries -------------------------------------------------

    pub fn name(&self) -> String {
        self.pipeline.name()
    }

    pub fn height(&self) -> f32 {
        self.pipeline.height()
    }

    pub fn modifier(&self) -> TrackerModifier {
        self.modifier
    }

    pub fn viewer_count(&self) -> usize {
        self.pipeline.viewer_count()
    }

    pub fn viewers(&self) -> Vec<ViewerId> {
        self.pipeline.viewers()
    }

    /// Serializable description of this tracker's configuration.
    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            name: self.name(),
            rotator: self.rotator.read().tag(),
            scaler: self.scaler.read().tag(),
            modifier: self.modifier,
        }
    }

    /// Request (or withdraw) a full data rebuild on the next firing.
    /// Concurrent requests coalesce; the flag is consumed at most once.
    pub fn force_update(&self, force: bool) {
        self.pending_force_update.store(force, Ordering::SeqCst);
    }

    /// Whether a run-once animation is currently driving the model.
    pub fn is_running_single_animation(&self) -> bool {
        matches!(
            self.pipeline.running_animation(),
            Some(animation) if animation.loop_mode == LoopMode::Once
        )
    }

    // ---- viewer operations ---------------------------------------------

    /// Write a spawn for one viewer into `batch`. Vetoable; false when
    /// closed, vetoed, or refused by the pipeline.
    pub(crate) fn spawn_into(&self, viewer: ViewerId, batch: &mut dyn OutputBatch) -> bool {
        if self.is_closed() {
            return false;
        }
        if !self.notifier.notify(self, TrackerEvent::SpawnAt(viewer)) {
            return false;
        }
        let spawned = self.pipeline.spawn(viewer, batch);
        if spawned {
            log::debug!("tracker '{}' spawned at {}", self.name(), viewer);
        }
        spawned
    }

    /// Remove the model from one viewer.
    pub fn remove_viewer(&self, viewer: ViewerId) -> bool {
        if self.is_closed() {
            return false;
        }
        self.notifier.notify(self, TrackerEvent::DespawnAt(viewer));
        let removed = self.pipeline.remove(viewer);
        if removed {
            log::debug!("tracker '{}' removed from {}", self.name(), viewer);
        }
        removed
    }

    /// Hide the model from one viewer. Vetoable.
    pub fn hide(&self, viewer: ViewerId) -> bool {
        self.notifier.notify(self, TrackerEvent::HideAt(viewer)) && self.pipeline.hide(viewer)
    }

    pub fn is_hidden(&self, viewer: ViewerId) -> bool {
        self.pipeline.is_hidden(viewer)
    }

    /// Show the model to a previously hidden viewer. Vetoable.
    pub fn show(&self, viewer: ViewerId) -> bool {
        self.notifier.notify(self, TrackerEvent::ShowAt(viewer)) && self.pipeline.show(viewer)
    }

    // ---- part mutations ------------------------------------------------

    /// A mutation that reports a real change requests a force-update so it is
    /// reflected on the next data flush.
    fn after_mutation(&self, changed: bool) -> bool {
        if changed {
            self.force_update(true);
        }
        changed
    }

    /// Tint matching parts.
    pub fn tint(&self, filter: &PartFilter, rgb: u32) -> bool {
        self.after_mutation(self.pipeline.tint(filter, rgb))
    }

    pub fn toggle_part(&self, filter: &PartFilter, visible: bool) -> bool {
        self.after_mutation(self.pipeline.toggle_part(filter, visible))
    }

    pub fn set_item(&self, filter: &PartFilter, item: PartItem) -> bool {
        self.after_mutation(self.pipeline.set_item(filter, item))
    }

    pub fn glow(&self, filter: &PartFilter, glow: bool, color: u32) -> bool {
        self.after_mutation(self.pipeline.glow(filter, glow, color))
    }

    pub fn enchant(&self, filter: &PartFilter, enchant: bool) -> bool {
        self.after_mutation(self.pipeline.enchant(filter, enchant))
    }

    pub fn brightness(&self, filter: &PartFilter, brightness: Brightness) -> bool {
        self.after_mutation(self.pipeline.brightness(filter, brightness))
    }

    pub fn update_item(&self, filter: &PartFilter) -> bool {
        self.after_mutation(self.pipeline.update_item(filter))
    }

    // ---- animation -----------------------------------------------------

    /// Play an animation by name with default options.
    pub fn animate(&self, name: &str) -> bool {
        self.animate_with(name, AnimationModifier::default())
    }

    pub fn animate_with(&self, name: &str, modifier: AnimationModifier) -> bool {
        self.animate_filtered(&PartFilter::all(), name, modifier, || {})
    }

    pub fn animate_filtered(
        &self,
        filter: &PartFilter,
        name: &str,
        modifier: AnimationModifier,
        on_finish: impl FnOnce() + Send + 'static,
    ) -> bool {
        self.pipeline
            .animate(filter, name, modifier, Box::new(on_finish))
    }

    /// Play a pre-resolved animation.
    pub fn animate_resolved(
        &self,
        filter: &PartFilter,
        animation: &Animation,
        modifier: AnimationModifier,
        on_finish: impl FnOnce() + Send + 'static,
    ) {
        self.pipeline
            .animate_resolved(filter, animation, modifier, Box::new(on_finish));
    }

    pub fn stop_animation(&self, name: &str) {
        self.stop_animation_filtered(&PartFilter::all(), name);
    }

    pub fn stop_animation_filtered(&self, filter: &PartFilter, name: &str) {
        self.pipeline.stop_animation(filter, name);
    }

    pub fn replace_animation(&self, target: &str, name: &str, modifier: AnimationModifier) -> bool {
        self.replace_animation_filtered(&PartFilter::all(), target, name, modifier)
    }

    pub fn replace_animation_filtered(
        &self,
        filter: &PartFilter,
        target: &str,
        name: &str,
        modifier: AnimationModifier,
    ) -> bool {
        self.pipeline.replace_animation(filter, target, name, modifier)
    }

    pub fn replace_animation_resolved(
        &self,
        filter: &PartFilter,
        target: &str,
        animation: &Animation,
        modifier: AnimationModifier,
    ) {
        self.pipeline
            .replace_animation_resolved(filter, target, animation, modifier);
    }

    // ---- part lookup ---------------------------------------------------

    pub fn part(&self, name: &str) -> Option<PartInfo> {
        self.part_matching(|part| part.name == name)
    }

    pub fn part_matching(&self, predicate: impl Fn(&PartInfo) -> bool) -> Option<PartInfo> {
        self.pipeline.parts().into_iter().find(|part| predicate(part))
    }

    pub fn parts(&self) -> Vec<PartInfo> {
        self.pipeline.parts()
    }

    pub fn displays(&self) -> Vec<DisplayHandle> {
        self.pipeline
            .parts()
            .into_iter()
            .filter_map(|part| part.display)
            .collect()
    }

    pub(crate) fn pipeline(&self) -> &Arc<dyn RenderPipeline> {
        &self.pipeline
    }

    pub(crate) fn notifier(&self) -> &Arc<dyn TrackerNotifier> {
        &self.notifier
    }
}

impl PartialEq for Tracker {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for Tracker {}

impl Hash for Tracker {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("name", &self.name())
            .field("frame", &self.frame())
            .field("scheduled", &self.is_scheduled())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.close();
    }
}
