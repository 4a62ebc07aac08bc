//! Batched dispatch of a tracker's network-visible side effects
//!
//! Handlers within one firing write into three category batches; after the
//! chain runs, each non-empty batch is flushed exactly once to its viewer
//! subset and replaced with a fresh batch, so partially-filled batches never
//! bleed into the next cycle.

use crate::pipeline::{OutputBatch, RenderPipeline};

/// Output category of one batch in a [`BundlerSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKind {
    /// Flushed to every current viewer.
    Tick,
    /// Flushed to viewers not marked hidden.
    Data,
    /// Flushed to viewers within view criteria.
    View,
}

/// The three per-tracker output batches, owned for the tracker's lifetime.
pub struct BundlerSet {
    tick: Box<dyn OutputBatch>,
    data: Box<dyn OutputBatch>,
    view: Box<dyn OutputBatch>,
}

impl BundlerSet {
    pub(crate) fn new(pipeline: &dyn RenderPipeline) -> Self {
        Self {
            tick: pipeline.create_batch(),
            data: pipeline.create_batch(),
            view: pipeline.create_batch(),
        }
    }

    /// Accumulating batch for one category.
    pub fn batch_mut(&mut self, kind: BatchKind) -> &mut dyn OutputBatch {
        match kind {
            BatchKind::Tick => self.tick.as_mut(),
            BatchKind::Data => self.data.as_mut(),
            BatchKind::View => self.view.as_mut(),
        }
    }

    pub fn is_empty(&self, kind: BatchKind) -> bool {
        match kind {
            BatchKind::Tick => self.tick.is_empty(),
            BatchKind::Data => self.data.is_empty(),
            BatchKind::View => self.view.is_empty(),
        }
    }

    /// Flush each non-empty batch to its viewer subset and replace it.
    /// Empty batches are left untouched.
    pub(crate) fn flush(&mut self, pipeline: &dyn RenderPipeline) {
        if !self.tick.is_empty() {
            for viewer in pipeline.viewers() {
                self.tick.send_to(viewer);
            }
            self.tick = pipeline.create_batch();
        }
        if !self.data.is_empty() {
            for viewer in pipeline.unhidden_viewers() {
                self.data.send_to(viewer);
            }
            self.data = pipeline.create_batch();
        }
        if !self.view.is_empty() {
            for viewer in pipeline.in_view_viewers() {
                self.view.send_to(viewer);
            }
            self.view = pipeline.create_batch();
        }
    }

    /// Throw away everything accumulated this cycle without sending it.
    /// Used when a firing faults partway through.
    pub(crate) fn discard(&mut self, pipeline: &dyn RenderPipeline) {
        self.tick = pipeline.create_batch();
        self.data = pipeline.create_batch();
        self.view = pipeline.create_batch();
    }
}
