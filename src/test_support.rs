//! Shared mock pipeline for unit tests.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::pipeline::{
    Animation, AnimationCallback, AnimationModifier, Brightness, OffsetSource, OutputBatch,
    PartFilter, PartInfo, PartItem, RenderPipeline, ScaleSource, ViewFilter, ViewerId,
};
use crate::tracker::rotation::{Location, ModelRotation};

/// One batch delivery observed by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct SentRecord {
    pub viewer: ViewerId,
    pub entries: Vec<String>,
}

/// Batch that accumulates string entries and logs deliveries.
pub struct MockBatch {
    pub entries: Vec<String>,
    sink: Arc<Mutex<Vec<SentRecord>>>,
}

impl OutputBatch for MockBatch {
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn send_to(&self, viewer: ViewerId) {
        self.sink.lock().push(SentRecord {
            viewer,
            entries: self.entries.clone(),
        });
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[derive(Default)]
pub struct MockCalls {
    pub rebuilds: usize,
    pub script_ticks: usize,
    pub frame_advances: usize,
    pub despawn_alls: usize,
    pub applied_rotations: Vec<ModelRotation>,
    pub animations_started: Vec<String>,
    pub animations_stopped: Vec<String>,
    pub hides: usize,
    pub shows: usize,
}

pub struct MockPipeline {
    pub model_name: String,
    pub model_height: f32,
    pub viewers: Mutex<Vec<ViewerId>>,
    pub hidden: Mutex<HashSet<ViewerId>>,
    pub out_of_view: Mutex<HashSet<ViewerId>>,
    pub displayed_rotation: Mutex<ModelRotation>,
    pub running: Mutex<Option<Animation>>,
    pub calls: Mutex<MockCalls>,
    pub sent: Arc<Mutex<Vec<SentRecord>>>,
    pub part_list: Mutex<Vec<PartInfo>>,
    pub mutation_result: Mutex<bool>,
    /// When true, `advance_frame` writes a "frame" entry into the view batch.
    pub emit_frame_updates: Mutex<bool>,
    first_viewer_hook: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
    pub view_filter: Mutex<Option<ViewFilter>>,
    pub view_range: Mutex<Option<f32>>,
    pub scale_source: Mutex<Option<ScaleSource>>,
    pub offset_source: Mutex<Option<OffsetSource>>,
}

impl MockPipeline {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            model_name: name.to_string(),
            model_height: 2.0,
            viewers: Mutex::new(Vec::new()),
            hidden: Mutex::new(HashSet::new()),
            out_of_view: Mutex::new(HashSet::new()),
            displayed_rotation: Mutex::new(ModelRotation::ZERO),
            running: Mutex::new(None),
            calls: Mutex::new(MockCalls::default()),
            sent: Arc::new(Mutex::new(Vec::new())),
            part_list: Mutex::new(Vec::new()),
            mutation_result: Mutex::new(true),
            emit_frame_updates: Mutex::new(false),
            first_viewer_hook: Mutex::new(None),
            view_filter: Mutex::new(None),
            view_range: Mutex::new(None),
            scale_source: Mutex::new(None),
            offset_source: Mutex::new(None),
        })
    }

    pub fn sent_records(&self) -> Vec<SentRecord> {
        self.sent.lock().clone()
    }

    fn write(batch: &mut dyn OutputBatch, entry: &str) {
        if let Some(mock) = batch.as_any_mut().downcast_mut::<MockBatch>() {
            mock.entries.push(entry.to_string());
        }
    }
}

impl RenderPipeline for MockPipeline {
    fn name(&self) -> String {
        self.model_name.clone()
    }

    fn height(&self) -> f32 {
        self.model_height
    }

    fn rotation(&self) -> ModelRotation {
        *self.displayed_rotation.lock()
    }

    fn apply_rotation(&self, rotation: ModelRotation, batch: &mut dyn OutputBatch) {
        self.calls.lock().applied_rotations.push(rotation);
        *self.displayed_rotation.lock() = rotation;
        Self::write(batch, "rotate");
    }

    fn advance_frame(&self, batch: &mut dyn OutputBatch) {
        self.calls.lock().frame_advances += 1;
        if *self.emit_frame_updates.lock() {
            Self::write(batch, "frame");
        }
    }

    fn advance_script(&self) {
        self.calls.lock().script_ticks += 1;
    }

    fn create_batch(&self) -> Box<dyn OutputBatch> {
        Box::new(MockBatch {
            entries: Vec::new(),
            sink: self.sent.clone(),
        })
    }

    fn viewers(&self) -> Vec<ViewerId> {
        self.viewers.lock().clone()
    }

    fn unhidden_viewers(&self) -> Vec<ViewerId> {
        let hidden = self.hidden.lock();
        self.viewers
            .lock()
            .iter()
            .copied()
            .filter(|viewer| !hidden.contains(viewer))
            .collect()
    }

    fn in_view_viewers(&self) -> Vec<ViewerId> {
        let out_of_view = self.out_of_view.lock();
        self.viewers
            .lock()
            .iter()
            .copied()
            .filter(|viewer| !out_of_view.contains(viewer))
            .collect()
    }

    fn viewer_count(&self) -> usize {
        self.viewers.lock().len()
    }

    fn rebuild_data(&self, batch: &mut dyn OutputBatch) {
        self.calls.lock().rebuilds += 1;
        Self::write(batch, "data");
    }

    fn spawn(&self, viewer: ViewerId, batch: &mut dyn OutputBatch) -> bool {
        let became_first = {
            let mut viewers = self.viewers.lock();
            if viewers.contains(&viewer) {
                return false;
            }
            viewers.push(viewer);
            viewers.len() == 1
        };
        Self::write(batch, "spawn");
        if became_first {
            if let Some(hook) = self.first_viewer_hook.lock().as_ref() {
                hook();
            }
        }
        true
    }

    fn remove(&self, viewer: ViewerId) -> bool {
        let mut viewers = self.viewers.lock();
        match viewers.iter().position(|current| *current == viewer) {
            Some(index) => {
                viewers.remove(index);
                true
            }
            None => false,
        }
    }

    fn hide(&self, viewer: ViewerId) -> bool {
        self.calls.lock().hides += 1;
        self.hidden.lock().insert(viewer)
    }

    fn is_hidden(&self, viewer: ViewerId) -> bool {
        self.hidden.lock().contains(&viewer)
    }

    fn show(&self, viewer: ViewerId) -> bool {
        self.calls.lock().shows += 1;
        self.hidden.lock().remove(&viewer)
    }

    fn teleport(&self, _location: &Location, batch: &mut dyn OutputBatch) {
        Self::write(batch, "teleport");
    }

    fn despawn_all(&self) {
        self.calls.lock().despawn_alls += 1;
        self.viewers.lock().clear();
    }

    fn line_of_sight(&self, _viewer: ViewerId, _target: Location) -> bool {
        true
    }

    fn set_first_viewer_hook(&self, hook: Box<dyn Fn() + Send + Sync>) {
        *self.first_viewer_hook.lock() = Some(hook);
    }

    fn set_view_filter(&self, filter: ViewFilter) {
        *self.view_filter.lock() = Some(filter);
    }

    fn set_view_range(&self, range: f32) {
        *self.view_range.lock() = Some(range);
    }

    fn set_scale_source(&self, source: ScaleSource) {
        *self.scale_source.lock() = Some(source);
    }

    fn set_offset_source(&self, source: OffsetSource) {
        *self.offset_source.lock() = Some(source);
    }

    fn animate(
        &self,
        _filter: &PartFilter,
        name: &str,
        _modifier: AnimationModifier,
        _on_finish: AnimationCallback,
    ) -> bool {
        self.calls.lock().animations_started.push(name.to_string());
        true
    }

    fn animate_resolved(
        &self,
        _filter: &PartFilter,
        animation: &Animation,
        _modifier: AnimationModifier,
        _on_finish: AnimationCallback,
    ) {
        self.calls
            .lock()
            .animations_started
            .push(animation.name.clone());
    }

    fn stop_animation(&self, _filter: &PartFilter, name: &str) {
        self.calls.lock().animations_stopped.push(name.to_string());
    }

    fn replace_animation(
        &self,
        _filter: &PartFilter,
        target: &str,
        name: &str,
        _modifier: AnimationModifier,
    ) -> bool {
        let mut calls = self.calls.lock();
        calls.animations_stopped.push(target.to_string());
        calls.animations_started.push(name.to_string());
        true
    }

    fn replace_animation_resolved(
        &self,
        _filter: &PartFilter,
        target: &str,
        animation: &Animation,
        _modifier: AnimationModifier,
    ) {
        let mut calls = self.calls.lock();
        calls.animations_stopped.push(target.to_string());
        calls.animations_started.push(animation.name.clone());
    }

    fn running_animation(&self) -> Option<Animation> {
        self.running.lock().clone()
    }

    fn tint(&self, _filter: &PartFilter, _rgb: u32) -> bool {
        *self.mutation_result.lock()
    }

    fn toggle_part(&self, _filter: &PartFilter, _visible: bool) -> bool {
        *self.mutation_result.lock()
    }

    fn set_item(&self, _filter: &PartFilter, _item: PartItem) -> bool {
        *self.mutation_result.lock()
    }

    fn glow(&self, _filter: &PartFilter, _glow: bool, _color: u32) -> bool {
        *self.mutation_result.lock()
    }

    fn enchant(&self, _filter: &PartFilter, _enchant: bool) -> bool {
        *self.mutation_result.lock()
    }

    fn brightness(&self, _filter: &PartFilter, _brightness: Brightness) -> bool {
        *self.mutation_result.lock()
    }

    fn update_item(&self, _filter: &PartFilter) -> bool {
        *self.mutation_result.lock()
    }

    fn parts(&self) -> Vec<PartInfo> {
        self.part_list.lock().clone()
    }
}
