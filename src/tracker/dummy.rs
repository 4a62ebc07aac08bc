//! Free-floating tracker variant
//!
//! Binds a tracker to a point in space with no owning entity: the location
//! is whatever the caller last set, rotation input derives from the
//! location's orientation, and positional updates broadcast synchronously
//! the moment the location changes.

use std::ops::Deref;
use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;

use crate::event::{TrackerEvent, TrackerNotifier};
use crate::pipeline::{AnimationModifier, PartFilter, RenderPipeline, ViewerId};
use crate::tracker::modifier::TrackerModifier;
use crate::tracker::rotation::Location;
use crate::tracker::{Tracker, TrackerId};

/// Tracker for a model floating at a fixed point, not bound to any entity.
pub struct DummyTracker {
    inner: Arc<Tracker>,
    id: RwLock<TrackerId>,
    location: Arc<RwLock<Location>>,
}

impl DummyTracker {
    /// Create a free-floating tracker at `location`.
    ///
    /// Plays the "spawn" cue, wires scale/rotation/offset sources, lets
    /// `pre_update` adjust state, then runs one synchronous update so the
    /// first visual state is consistent before any viewer attaches, and
    /// finally announces the new instance.
    pub fn new(
        location: Location,
        pipeline: Arc<dyn RenderPipeline>,
        modifier: TrackerModifier,
        notifier: Arc<dyn TrackerNotifier>,
        pre_update: impl FnOnce(&DummyTracker),
    ) -> Arc<Self> {
        let inner = Tracker::new(pipeline, modifier, notifier);
        let location = Arc::new(RwLock::new(location));
        let dummy = Arc::new(Self {
            inner,
            id: RwLock::new(TrackerId::new()),
            location: location.clone(),
        });

        dummy
            .inner
            .animate_filtered(&PartFilter::all(), "spawn", AnimationModifier::default(), || {});

        let weak = Arc::downgrade(&dummy.inner);
        dummy.inner.pipeline().set_scale_source(Arc::new(move || {
            weak.upgrade()
                .map_or(1.0, |tracker| tracker.scaler().scale(&tracker))
        }));

        let rotation_source = location.clone();
        dummy
            .inner
            .set_rotation_supplier(move || rotation_source.read().rotation());

        let location_source = location.clone();
        dummy
            .inner
            .set_location_supplier(move || *location_source.read());

        dummy
            .inner
            .pipeline()
            .set_offset_source(Arc::new(|| Vec3::ZERO));

        pre_update(&dummy);
        dummy.inner.fire();

        dummy
            .inner
            .notifier()
            .notify(&dummy.inner, TrackerEvent::Created);

        dummy
    }

    pub fn id(&self) -> TrackerId {
        *self.id.read()
    }

    pub fn set_id(&self, id: TrackerId) {
        *self.id.write() = id;
    }

    pub fn location(&self) -> Location {
        *self.location.read()
    }

    /// Move the model. Moving to the identical location is a no-op;
    /// otherwise one positional batch is broadcast to every current viewer
    /// immediately, outside the scheduled firing cycle.
    pub fn set_location(&self, location: Location) {
        if *self.location.read() == location {
            return;
        }
        *self.location.write() = location;

        let pipeline = self.inner.pipeline();
        let mut batch = pipeline.create_batch();
        pipeline.teleport(&location, batch.as_mut());
        if !batch.is_empty() {
            for viewer in pipeline.viewers() {
                batch.send_to(viewer);
            }
        }
    }

    /// Spawn the model to one viewer, flushing the spawn batch immediately.
    pub fn spawn(&self, viewer: ViewerId) -> bool {
        let pipeline = self.inner.pipeline();
        let mut batch = pipeline.create_batch();
        let spawned = self.inner.spawn_into(viewer, batch.as_mut());
        batch.send_to(viewer);
        spawned
    }
}

impl Deref for DummyTracker {
    type Target = Tracker;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
