//! rigtrack - tracker scheduling and update batching for composite models
//!
//! Coordinates many independent per-model update loops: each tracker
//! self-schedules a fine-grained recurring update onto one shared worker
//! pool, converts between the internal tick rate and the external logical
//! tick rate, batches its network-visible side effects per viewer category,
//! and shuts itself down safely when unobserved. Rendering, animation
//! payloads, and delivery are owned by a [`pipeline::RenderPipeline`]
//! collaborator supplied by the embedding application.

pub mod constants;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod scheduler;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{RigError, RigResult};
pub use event::{NoopNotifier, TrackerEvent, TrackerNotifier};
pub use pipeline::{
    Animation, AnimationModifier, Brightness, DisplayHandle, LoopMode, OutputBatch, PartFilter,
    PartInfo, PartItem, RenderPipeline, ViewerId,
};
pub use scheduler::{JobHandle, SchedulerConfig, SchedulerPool};
pub use tracker::bundler::{BatchKind, BundlerSet};
pub use tracker::dummy::DummyTracker;
pub use tracker::modifier::{TrackerModifier, TrackerSnapshot};
pub use tracker::rotation::{Location, ModelRotation, ModelRotator, ModelScaler};
pub use tracker::{Tracker, TrackerId};
