//! Tracker behavior toggles and persistable snapshots

use serde::{Deserialize, Serialize};

use crate::tracker::rotation::{RotatorTag, ScalerTag};

/// Immutable behavior toggles captured when a tracker is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerModifier {
    /// Gate per-viewer visibility by line of sight.
    pub sight_trace: bool,
    /// Maximum distance at which the model is considered in view.
    pub view_range: f32,
    /// Freeze external rotation input while a run-once animation plays.
    pub lock_on_play_animation: bool,
}

impl TrackerModifier {
    pub const DEFAULT: Self = Self {
        sight_trace: true,
        view_range: 48.0,
        lock_on_play_animation: true,
    };
}

impl Default for TrackerModifier {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Serializable description of a tracker's configuration, suitable for
/// persisting and later re-creating an equivalent tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub name: String,
    pub rotator: RotatorTag,
    pub scaler: ScalerTag,
    pub modifier: TrackerModifier,
}
