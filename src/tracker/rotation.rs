//! Rotation and scale policies
//!
//! A tracker separates *raw* rotation input (wherever it comes from) from the
//! *displayed* rotation, and routes the raw value through a pluggable policy.
//! Scale works the same way. Both default to the behavior most models want:
//! yaw-only rotation and bounding-size-derived scale.

use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::constants::model::BASE_MODEL_HEIGHT;
use crate::tracker::Tracker;

/// Displayed rotation of a model, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelRotation {
    pub pitch: f32,
    pub yaw: f32,
}

impl ModelRotation {
    pub const ZERO: Self = Self {
        pitch: 0.0,
        yaw: 0.0,
    };

    pub fn new(pitch: f32, yaw: f32) -> Self {
        Self { pitch, yaw }
    }
}

/// A point and orientation in space for free-floating models.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl Location {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        Self {
            position,
            yaw,
            pitch,
        }
    }

    pub fn rotation(&self) -> ModelRotation {
        ModelRotation::new(self.pitch, self.yaw)
    }
}

/// Serializable tag identifying a rotation policy in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotatorTag {
    YawOnly,
    PitchOnly,
    Full,
    Frozen,
    Custom,
}

/// Policy computing a displayed rotation from raw rotation input.
#[derive(Clone, Default)]
pub enum ModelRotator {
    /// Follow yaw, ignore pitch.
    #[default]
    YawOnly,
    /// Follow pitch, ignore yaw.
    PitchOnly,
    /// Follow both axes.
    Full,
    /// Ignore input entirely.
    Frozen,
    /// Arbitrary mapping supplied by the embedder.
    Custom(Arc<dyn Fn(ModelRotation) -> ModelRotation + Send + Sync>),
}

impl ModelRotator {
    pub fn apply(&self, raw: ModelRotation) -> ModelRotation {
        match self {
            Self::YawOnly => ModelRotation::new(0.0, raw.yaw),
            Self::PitchOnly => ModelRotation::new(raw.pitch, 0.0),
            Self::Full => raw,
            Self::Frozen => ModelRotation::ZERO,
            Self::Custom(map) => map(raw),
        }
    }

    pub fn tag(&self) -> RotatorTag {
        match self {
            Self::YawOnly => RotatorTag::YawOnly,
            Self::PitchOnly => RotatorTag::PitchOnly,
            Self::Full => RotatorTag::Full,
            Self::Frozen => RotatorTag::Frozen,
            Self::Custom(_) => RotatorTag::Custom,
        }
    }
}

impl fmt::Debug for ModelRotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelRotator::{:?}", self.tag())
    }
}

/// Serializable tag identifying a scale policy in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScalerTag {
    EntityBounds,
    Fixed(f32),
    Custom,
}

/// Policy computing a model's displayed scale.
#[derive(Clone, Default)]
pub enum ModelScaler {
    /// Scale derived from the pipeline's reported bounding height.
    #[default]
    EntityBounds,
    /// Constant scale.
    Fixed(f32),
    /// Arbitrary mapping supplied by the embedder.
    Custom(Arc<dyn Fn(&Tracker) -> f32 + Send + Sync>),
}

impl ModelScaler {
    pub fn scale(&self, tracker: &Tracker) -> f32 {
        match self {
            Self::EntityBounds => tracker.height() / BASE_MODEL_HEIGHT,
            Self::Fixed(value) => *value,
            Self::Custom(map) => map(tracker),
        }
    }

    pub fn tag(&self) -> ScalerTag {
        match self {
            Self::EntityBounds => ScalerTag::EntityBounds,
            Self::Fixed(value) => ScalerTag::Fixed(*value),
            Self::Custom(_) => ScalerTag::Custom,
        }
    }
}

impl fmt::Debug for ModelScaler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelScaler::{:?}", self.tag())
    }
}
