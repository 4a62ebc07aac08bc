//! Rendering/animation pipeline contracts
//!
//! The tracker core never computes a visual payload itself. Everything a
//! tracked model actually looks like is owned by a [`RenderPipeline`]
//! implementation supplied by the surrounding application; the core only
//! decides *when* pipeline work runs and *in what batches* its output is
//! delivered. These traits are the full boundary between the two.

use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::tracker::rotation::{Location, ModelRotation};

/// Opaque identity of a viewer registered with a pipeline.
///
/// Resolution to an addressable network recipient happens inside the
/// pipeline; the core only forwards these around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ViewerId(pub u64);

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer-{}", self.0)
    }
}

/// Handle to a display element owned by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayHandle(pub u64);

/// A single named part of a composite model, as reported by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PartInfo {
    pub name: String,
    pub display: Option<DisplayHandle>,
}

/// Selects the subset of model parts a mutation applies to.
#[derive(Clone, Default)]
pub enum PartFilter {
    /// Every part.
    #[default]
    All,
    /// The part with exactly this name.
    Named(String),
    /// Arbitrary predicate over part metadata.
    Predicate(Arc<dyn Fn(&PartInfo) -> bool + Send + Sync>),
}

impl PartFilter {
    pub fn all() -> Self {
        Self::All
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn matching(predicate: impl Fn(&PartInfo) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(predicate))
    }

    pub fn matches(&self, part: &PartInfo) -> bool {
        match self {
            Self::All => true,
            Self::Named(name) => part.name == *name,
            Self::Predicate(predicate) => predicate(part),
        }
    }
}

impl fmt::Debug for PartFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "PartFilter::All"),
            Self::Named(name) => write!(f, "PartFilter::Named({:?})", name),
            Self::Predicate(_) => write!(f, "PartFilter::Predicate(..)"),
        }
    }
}

/// How a playing animation repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoopMode {
    /// Run to the end once, then stop.
    Once,
    /// Restart from the beginning forever.
    Loop,
    /// Run once and hold the final pose.
    Hold,
}

/// A pre-resolved animation owned by the pipeline's model data.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub name: String,
    pub loop_mode: LoopMode,
}

/// Playback options applied when an animation starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimationModifier {
    /// Overrides the animation's own loop mode when set.
    pub loop_mode: Option<LoopMode>,
    /// Playback speed multiplier.
    pub speed: f32,
    /// Blend-in duration in logical ticks.
    pub blend_in: u32,
    /// Blend-out duration in logical ticks.
    pub blend_out: u32,
}

impl Default for AnimationModifier {
    fn default() -> Self {
        Self {
            loop_mode: None,
            speed: 1.0,
            blend_in: 1,
            blend_out: 0,
        }
    }
}

/// Callback invoked by the pipeline when a run-once animation finishes.
pub type AnimationCallback = Box<dyn FnOnce() + Send>;

/// Item payload displayed by a model part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartItem {
    pub item: String,
    pub offset: Vec3,
    pub scale: f32,
}

/// Light levels applied to a model part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brightness {
    pub block: i32,
    pub sky: i32,
}

/// Per-viewer visibility predicate installed by the core.
pub type ViewFilter = Arc<dyn Fn(ViewerId) -> bool + Send + Sync>;

/// Displayed-scale source installed by a tracker variant.
pub type ScaleSource = Arc<dyn Fn() -> f32 + Send + Sync>;

/// Positional-offset source installed by a tracker variant.
pub type OffsetSource = Arc<dyn Fn() -> Vec3 + Send + Sync>;

/// Accumulating output batch created by a pipeline.
///
/// A batch collects an arbitrary number of writes during one update cycle and
/// is then sent, as a unit, to each viewer in the target subset.
pub trait OutputBatch: Send {
    /// True when nothing has been written since creation.
    fn is_empty(&self) -> bool;

    /// Number of accumulated writes.
    fn len(&self) -> usize;

    /// Deliver the accumulated batch to one viewer.
    fn send_to(&self, viewer: ViewerId);

    /// Downcast support: a pipeline receives batches back as trait objects
    /// and recovers its own concrete batch type to write into it.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// The rendering/animation collaborator a tracker drives.
///
/// Implementations own the part hierarchy, viewer registry, and payload
/// serialization. All mutating calls report success as a boolean; a `false`
/// is a transient per-viewer failure, never a reason to stop the tracker.
pub trait RenderPipeline: Send + Sync {
    /// Stable model name. Trackers derive identity from this.
    fn name(&self) -> String;

    /// Current model height, used by the bounding-size scale policy.
    fn height(&self) -> f32;

    /// Rotation currently displayed to viewers.
    fn rotation(&self) -> ModelRotation;

    /// Write a rotation change into a batch.
    fn apply_rotation(&self, rotation: ModelRotation, batch: &mut dyn OutputBatch);

    /// Per-frame visual step; writes any resulting updates into a batch.
    fn advance_frame(&self, batch: &mut dyn OutputBatch);

    /// Advance the animation/script state machine by one logical tick.
    fn advance_script(&self);

    /// Create an empty output batch.
    fn create_batch(&self) -> Box<dyn OutputBatch>;

    /// Every currently registered viewer.
    fn viewers(&self) -> Vec<ViewerId>;

    /// Viewers not currently marked hidden.
    fn unhidden_viewers(&self) -> Vec<ViewerId>;

    /// Viewers for whom the model is within view/visibility criteria.
    fn in_view_viewers(&self) -> Vec<ViewerId>;

    fn viewer_count(&self) -> usize;

    /// Write a full data rebuild into a batch.
    fn rebuild_data(&self, batch: &mut dyn OutputBatch);

    fn spawn(&self, viewer: ViewerId, batch: &mut dyn OutputBatch) -> bool;
    fn remove(&self, viewer: ViewerId) -> bool;
    fn hide(&self, viewer: ViewerId) -> bool;
    fn is_hidden(&self, viewer: ViewerId) -> bool;
    fn show(&self, viewer: ViewerId) -> bool;

    /// Write a positional update into a batch.
    fn teleport(&self, location: &Location, batch: &mut dyn OutputBatch);

    /// Remove the model from every remaining viewer.
    fn despawn_all(&self);

    /// Whether a straight line from the viewer's eye reaches the target.
    fn line_of_sight(&self, viewer: ViewerId, target: Location) -> bool;

    /// Register the callback fired when the first viewer is registered.
    fn set_first_viewer_hook(&self, hook: Box<dyn Fn() + Send + Sync>);

    fn set_view_filter(&self, filter: ViewFilter);

    /// Maximum distance at which the model counts as in view; feeds the
    /// pipeline's in-view criteria.
    fn set_view_range(&self, range: f32);
    fn set_scale_source(&self, source: ScaleSource);
    fn set_offset_source(&self, source: OffsetSource);

    fn animate(
        &self,
        filter: &PartFilter,
        name: &str,
        modifier: AnimationModifier,
        on_finish: AnimationCallback,
    ) -> bool;

    fn animate_resolved(
        &self,
        filter: &PartFilter,
        animation: &Animation,
        modifier: AnimationModifier,
        on_finish: AnimationCallback,
    );

    fn stop_animation(&self, filter: &PartFilter, name: &str);

    fn replace_animation(
        &self,
        filter: &PartFilter,
        target: &str,
        name: &str,
        modifier: AnimationModifier,
    ) -> bool;

    fn replace_animation_resolved(
        &self,
        filter: &PartFilter,
        target: &str,
        animation: &Animation,
        modifier: AnimationModifier,
    );

    /// The animation currently driving the model, if any.
    fn running_animation(&self) -> Option<Animation>;

    fn tint(&self, filter: &PartFilter, rgb: u32) -> bool;
    fn toggle_part(&self, filter: &PartFilter, visible: bool) -> bool;
    fn set_item(&self, filter: &PartFilter, item: PartItem) -> bool;
    fn glow(&self, filter: &PartFilter, glow: bool, color: u32) -> bool;
    fn enchant(&self, filter: &PartFilter, enchant: bool) -> bool;
    fn brightness(&self, filter: &PartFilter, brightness: Brightness) -> bool;
    fn update_item(&self, filter: &PartFilter) -> bool;

    /// All parts of the composed model.
    fn parts(&self) -> Vec<PartInfo>;
}
