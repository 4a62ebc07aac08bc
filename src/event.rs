//! Tracker lifecycle notifications
//!
//! The core publishes lifecycle moments through a single narrow capability
//! implemented by the surrounding application (an event bus, a plugin
//! manager, a test probe). Some notifications may veto the operation that
//! triggered them by returning `false`.

use crate::pipeline::ViewerId;
use crate::tracker::Tracker;

/// A lifecycle moment published by a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerEvent {
    /// A new tracker instance finished construction. Fire-and-forget.
    Created,
    /// The tracker is closing; fired exactly once. Fire-and-forget.
    Closing,
    /// The model is about to spawn at a viewer. Vetoable.
    SpawnAt(ViewerId),
    /// The model was removed from a viewer. Fire-and-forget.
    DespawnAt(ViewerId),
    /// The model is about to be hidden from a viewer. Vetoable.
    HideAt(ViewerId),
    /// The model is about to be shown to a viewer. Vetoable.
    ShowAt(ViewerId),
}

/// Publish-and-get-veto capability consumed by trackers.
///
/// Returning `false` vetoes a vetoable event; the return value of
/// fire-and-forget events is ignored.
pub trait TrackerNotifier: Send + Sync {
    fn notify(&self, tracker: &Tracker, event: TrackerEvent) -> bool;
}

/// Notifier that allows everything and tells no one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl TrackerNotifier for NoopNotifier {
    fn notify(&self, _tracker: &Tracker, _event: TrackerEvent) -> bool {
        true
    }
}
