//! The editor façade.
//!
//! `EditorCore` owns the scene, the stroke buffer and the gesture engine and
//! is the only thing that mutates them. It must be used from the thread that
//! created it (the UI thread); this is asserted in debug builds. Saves split
//! into a snapshot taken on that thread and compositing on a worker; results
//! come back through [`EditorCore::poll_saves`] or
//! [`EditorCore::wait_for_saves`].

use crate::config::EditorBuilder;
use crate::save::{PendingSave, SaveJob, SaveOutput, SaveQueue, SaveTarget};
use kurbo::{Point, Rect, Size};
use photoink_core::{
    Bitmap, BrushConfig, BrushMode, DrawSurface, EditorListener, FilterEffect, FilteredSource,
    FontId, FontProvider, GestureContext, GestureEngine, GestureOutput, Overlay, OverlayFactory,
    OverlayId, OverlayKind, PointerEvent, PointerId, PointerPhase, Rgba, SaveResult, SaveSettings,
    Scene, StrokeBuffer, TextStyle, ViewHandle,
};
use photoink_render::{Compositor, SceneSnapshot};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::channel;
use std::thread::{self, ThreadId};


pub struct EditorCore {
    source: Box<dyn FilteredSource>,
    fonts: Arc<dyn FontProvider>,
    scene: Scene,
    strokes: StrokeBuffer,
    gestures: GestureEngine,
    factory: OverlayFactory,
    compositor: Compositor,
    canvas: Size,
    delete_zone: Option<Rect>,
    delete_zone_highlighted: bool,
    /// Pointer that owns the live brush stroke.
    brush_pointer: Option<PointerId>,
    listener: Option<Box<dyn EditorListener>>,
    surface: Option<Box<dyn DrawSurface>>,
    saves: SaveQueue,
    ui_thread: ThreadId,
}

impl EditorCore {
    pub fn builder() -> EditorBuilder {
        EditorBuilder::new()
    }

    pub(crate) fn from_builder(builder: EditorBuilder, source: Box<dyn FilteredSource>) -> Self {
        let (width, height) = source.size();
        let canvas = Size::new(width as f64, height as f64);
        let config = builder.config;
        let factory = OverlayFactory::new(canvas)
            .with_text_pinch_scalable(config.text_pinch_scalable)
            .with_default_text_font(config.default_text_font)
            .with_default_emoji_font(config.default_emoji_font);
        let mut compositor = Compositor::new(Arc::clone(&builder.fonts));
        if let Some(color) = builder.selection_color {
            compositor = compositor.with_selection_color(color);
        }
        log::debug!("editor created for {}x{} canvas", width, height);
        Self {
            source,
            fonts: builder.fonts,
            scene: Scene::new(),
            strokes: StrokeBuffer::new(width, height, config.brush),
            gestures: GestureEngine::new(config.gesture),
            factory,
            saves: SaveQueue::new(compositor.clone()),
            compositor,
            canvas,
            delete_zone: builder.delete_zone,
            delete_zone_highlighted: false,
            brush_pointer: None,
            listener: builder.listener,
            surface: builder.surface,
            ui_thread: thread::current().id(),
        }
    }

    fn assert_ui_thread(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.ui_thread,
            "EditorCore used off its UI thread"
        );
    }

    // --- accessors ---------------------------------------------------------

    pub fn canvas_size(&self) -> Size {
        self.canvas
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn strokes(&self) -> &StrokeBuffer {
        &self.strokes
    }

    pub fn overlay(&self, id: OverlayId) -> Option<&Overlay> {
        self.scene.get(id)
    }

    pub fn selected(&self) -> Option<OverlayId> {
        self.scene.selected()
    }

    pub fn fonts(&self) -> &Arc<dyn FontProvider> {
        &self.fonts
    }

    pub fn set_listener(&mut self, listener: Option<Box<dyn EditorListener>>) {
        self.listener = listener;
    }

    pub fn set_surface(&mut self, surface: Option<Box<dyn DrawSurface>>) {
        self.surface = surface;
    }

    pub fn set_delete_zone(&mut self, zone: Option<Rect>) {
        self.delete_zone = zone;
        if zone.is_none() {
            self.delete_zone_highlighted = false;
        }
    }

    pub fn delete_zone(&self) -> Option<Rect> {
        self.delete_zone
    }

    /// The dragged overlay is currently over the delete zone.
    pub fn delete_zone_highlighted(&self) -> bool {
        self.delete_zone_highlighted
    }

    // --- overlays ----------------------------------------------------------

    pub fn add_image(&mut self, bitmap: impl Into<Arc<Bitmap>>) -> OverlayId {
        self.assert_ui_thread();
        let overlay = self.factory.sticker(bitmap);
        self.add_overlay(overlay)
    }

    /// Add a text label. Empty text is accepted.
    pub fn add_text(&mut self, text: &str, style: &TextStyle) -> OverlayId {
        self.assert_ui_thread();
        self.set_brush_drawing_mode(false);
        let overlay = self.factory.text(text, style);
        let id = self.add_overlay(overlay);
        self.scene.focus(id);
        id
    }

    /// Replace the text and style of a visible text overlay.
    ///
    /// Ignored for unknown or removed handles and for empty text.
    pub fn edit_text(&mut self, id: OverlayId, text: &str, style: &TextStyle) -> bool {
        self.assert_ui_thread();
        if text.is_empty() {
            log::debug!("ignoring edit of {} with empty text", id);
            return false;
        }
        if !self.scene.is_visible(id) {
            log::debug!("ignoring edit of unknown overlay {}", id);
            return false;
        }
        let Some(label) = self.scene.get_mut(id).and_then(Overlay::as_text_mut) else {
            log::debug!("ignoring text edit of non-text overlay {}", id);
            return false;
        };
        label.text = text.to_string();
        label.apply_style(style);
        self.set_brush_drawing_mode(false);
        self.update_surface(id);
        true
    }

    /// Add an emoji, in `font` or the configured emoji font.
    pub fn add_emoji(&mut self, glyph: &str, font: Option<FontId>) -> OverlayId {
        self.assert_ui_thread();
        self.set_brush_drawing_mode(false);
        let overlay = self.factory.emoji(glyph, font);
        let id = self.add_overlay(overlay);
        self.scene.focus(id);
        id
    }

    fn add_overlay(&mut self, overlay: Overlay) -> OverlayId {
        let kind = overlay.kind();
        if let Some(surface) = self.surface.as_mut() {
            surface.add_node(&overlay);
        }
        let id = self.scene.insert(overlay);
        self.clear_redo();
        log::debug!("added {:?} overlay {}", kind, id);
        let count = self.scene.view().count();
        if let Some(listener) = self.listener.as_mut() {
            listener.on_add_view(kind, count);
        }
        id
    }

    /// Remove a specific overlay, as the close button does. Undoable.
    pub fn remove_overlay(&mut self, id: OverlayId) -> bool {
        self.assert_ui_thread();
        let Some(kind) = self.scene.get(id).map(Overlay::kind) else {
            log::debug!("ignoring removal of unknown overlay {}", id);
            return false;
        };
        if !self.scene.is_visible(id) {
            log::debug!("ignoring removal of hidden overlay {}", id);
            return false;
        }
        self.release_gesture(id);
        self.scene.remove(ViewHandle::Overlay(id));
        self.detach_surface(id);
        log::debug!("removed {:?} overlay {}", kind, id);
        self.notify_remove(kind);
        true
    }

    /// Remove every overlay and stroke and forget all history.
    pub fn clear_all_overlays(&mut self) {
        self.assert_ui_thread();
        let outputs = self.gestures.abort(&mut self.scene);
        self.apply_gestures(outputs);
        let handles: Vec<ViewHandle> = self.scene.view().iter().collect();
        for handle in handles {
            match handle {
                ViewHandle::Overlay(id) => {
                    let Some(kind) = self.scene.get(id).map(Overlay::kind) else {
                        continue;
                    };
                    self.scene.remove(handle);
                    self.detach_surface(id);
                    self.notify_remove(kind);
                }
                ViewHandle::Strokes => {
                    self.scene.remove(handle);
                    self.notify_remove(OverlayKind::BrushStroke);
                }
            }
        }
        self.strokes.clear_all();
        self.scene.clear();
        self.delete_zone_highlighted = false;
        log::debug!("cleared all overlays");
    }

    /// Hide every helper box and clear the selection.
    pub fn clear_helper_box(&mut self) {
        self.assert_ui_thread();
        let shown: Vec<OverlayId> = self
            .scene
            .visible()
            .filter(|o| o.helper_box)
            .map(Overlay::id)
            .collect();
        self.scene.clear_helper_box();
        for id in shown {
            self.update_surface(id);
        }
    }

    /// Select an overlay and show its helper box.
    pub fn select(&mut self, id: OverlayId) -> bool {
        self.assert_ui_thread();
        let previous = self.scene.selected();
        if !self.scene.select(id) {
            return false;
        }
        if let Some(prev) = previous.filter(|p| *p != id) {
            self.update_surface(prev);
        }
        self.update_surface(id);
        true
    }

    // --- brush -------------------------------------------------------------

    pub fn set_brush_config(&mut self, config: BrushConfig) {
        self.assert_ui_thread();
        self.strokes.configure(config);
    }

    pub fn brush_config(&self) -> &BrushConfig {
        self.strokes.config()
    }

    /// Route pointer events to the brush. Does not touch the selection.
    pub fn set_brush_drawing_mode(&mut self, enabled: bool) {
        self.assert_ui_thread();
        if !enabled && self.strokes.is_drawing() {
            self.notify_stop_change(OverlayKind::BrushStroke);
        }
        self.strokes.set_drawing_mode(enabled);
        self.brush_pointer = None;
    }

    pub fn brush_drawing_mode(&self) -> bool {
        self.strokes.drawing_mode()
    }

    /// Switch the brush to the eraser for subsequent strokes.
    pub fn brush_eraser(&mut self) {
        self.assert_ui_thread();
        self.strokes.set_mode(BrushMode::Erase);
    }

    pub fn set_brush_mode(&mut self, mode: BrushMode) {
        self.assert_ui_thread();
        self.strokes.set_mode(mode);
    }

    pub fn set_brush_size(&mut self, size: f64) {
        self.strokes.config_mut().width = size;
    }

    pub fn brush_size(&self) -> f64 {
        self.strokes.config().width
    }

    pub fn set_brush_color(&mut self, color: Rgba) {
        self.strokes.config_mut().color = color;
    }

    pub fn brush_color(&self) -> Rgba {
        self.strokes.config().color
    }

    /// Brush opacity in percent, 0 to 100.
    pub fn set_opacity(&mut self, percent: u8) {
        let percent = percent.min(100) as u32;
        self.strokes.config_mut().opacity = (percent * 255 / 100) as u8;
    }

    pub fn set_eraser_size(&mut self, size: f64) {
        self.strokes.config_mut().eraser_width = size;
    }

    pub fn eraser_size(&self) -> f64 {
        self.strokes.config().eraser_width
    }

    pub fn set_eraser_color(&mut self, color: Rgba) {
        self.strokes.config_mut().eraser_color = color;
    }

    /// Draw a whole stroke at once, as if a single pointer traced `points`.
    pub fn draw_stroke(&mut self, points: &[Point]) -> bool {
        self.assert_ui_thread();
        let Some((first, rest)) = points.split_first() else {
            return false;
        };
        self.begin_brush(*first);
        for point in rest {
            self.strokes.extend(*point);
        }
        self.finish_brush()
    }

    fn begin_brush(&mut self, origin: Point) {
        self.strokes.begin_stroke(origin);
        self.notify_start_change(OverlayKind::BrushStroke);
    }

    fn finish_brush(&mut self) -> bool {
        if !self.strokes.end_stroke() {
            return false;
        }
        self.scene.clear_redo();
        if !self.scene.view().contains(ViewHandle::Strokes) {
            let _ = self.scene.view_mut().append(ViewHandle::Strokes);
        }
        self.notify_stop_change(OverlayKind::BrushStroke);
        self.notify_add(OverlayKind::BrushStroke);
        true
    }

    // --- history -----------------------------------------------------------

    /// Undo the topmost entry: the last stroke if the stroke layer is on top,
    /// else the last overlay.
    pub fn undo(&mut self) -> bool {
        self.assert_ui_thread();
        match self.scene.view().last() {
            None => false,
            Some(ViewHandle::Strokes) => {
                if !self.strokes.undo() {
                    return false;
                }
                if self.strokes.can_undo() {
                    self.scene.view_mut().push_redo(ViewHandle::Strokes);
                } else {
                    self.scene.remove(ViewHandle::Strokes);
                }
                log::debug!("undid stroke ({} left)", self.strokes.stroke_count());
                self.notify_remove(OverlayKind::BrushStroke);
                true
            }
            Some(handle @ ViewHandle::Overlay(id)) => {
                let kind = self.scene.get(id).map(Overlay::kind);
                self.release_gesture(id);
                self.scene.remove(handle);
                self.detach_surface(id);
                log::debug!("undid overlay {}", id);
                if let Some(kind) = kind {
                    self.notify_remove(kind);
                }
                true
            }
        }
    }

    /// Restore the most recently undone entry.
    pub fn redo(&mut self) -> bool {
        self.assert_ui_thread();
        let Some(handle) = self.scene.view_mut().pop_redo() else {
            return false;
        };
        match handle {
            ViewHandle::Strokes => {
                if !self.strokes.redo() {
                    return false;
                }
                if !self.scene.view().contains(ViewHandle::Strokes) {
                    let _ = self.scene.view_mut().append(ViewHandle::Strokes);
                }
                log::debug!("redid stroke ({} total)", self.strokes.stroke_count());
                self.notify_add(OverlayKind::BrushStroke);
                true
            }
            ViewHandle::Overlay(id) => {
                if !self.scene.restore(handle) {
                    return false;
                }
                let kind = self.scene.get(id).map(Overlay::kind);
                if let (Some(surface), Some(overlay)) = (self.surface.as_mut(), self.scene.get(id)) {
                    surface.add_node(overlay);
                }
                log::debug!("redid overlay {}", id);
                if let Some(kind) = kind {
                    self.notify_add(kind);
                }
                true
            }
        }
    }

    /// True when nothing is visible and no stroke can be undone or redone.
    pub fn is_empty(&self) -> bool {
        self.scene.view().is_empty() && !self.strokes.can_undo() && !self.strokes.can_redo()
    }

    /// End a gesture manipulating `id`, rewinding it, before `id` leaves the scene.
    fn release_gesture(&mut self, id: OverlayId) {
        if self.gestures.active_overlay() == Some(id) {
            let outputs = self.gestures.abort(&mut self.scene);
            self.apply_gestures(outputs);
        }
    }

    fn clear_redo(&mut self) {
        self.scene.clear_redo();
        self.strokes.clear_redo();
    }

    // --- pointer input -----------------------------------------------------

    /// Feed one host pointer event, in arrival order.
    pub fn handle_pointer(&mut self, event: PointerEvent) {
        self.assert_ui_thread();
        if self.strokes.drawing_mode() {
            self.handle_brush_pointer(event);
            return;
        }
        let touched = self.gestures.active_overlay();
        let ctx = GestureContext {
            fonts: self.fonts.as_ref(),
            canvas: Rect::from_origin_size(Point::ZERO, self.canvas),
            delete_zone: self.delete_zone,
        };
        let outputs = self.gestures.handle(event, &mut self.scene, &ctx);
        if let Some(id) = touched.or(self.gestures.active_overlay()) {
            self.update_surface(id);
        }
        self.apply_gestures(outputs);
    }

    /// Let time pass without input; fires pending long presses.
    pub fn tick(&mut self, now_ms: u64) {
        self.assert_ui_thread();
        let outputs = self.gestures.tick(now_ms);
        self.apply_gestures(outputs);
    }

    fn handle_brush_pointer(&mut self, event: PointerEvent) {
        match event.phase {
            PointerPhase::Down => {
                if self.brush_pointer.is_none() {
                    self.brush_pointer = Some(event.pointer);
                    self.begin_brush(event.position);
                }
            }
            PointerPhase::Move if self.brush_pointer == Some(event.pointer) => {
                self.strokes.extend(event.position);
            }
            PointerPhase::Up if self.brush_pointer == Some(event.pointer) => {
                self.brush_pointer = None;
                self.strokes.extend(event.position);
                self.finish_brush();
            }
            PointerPhase::Cancel if self.brush_pointer == Some(event.pointer) => {
                self.brush_pointer = None;
                self.strokes.cancel_stroke();
                self.notify_stop_change(OverlayKind::BrushStroke);
            }
            _ => {}
        }
    }

    fn apply_gestures(&mut self, outputs: Vec<GestureOutput>) {
        for output in outputs {
            match output {
                GestureOutput::Clicked(id) => {
                    self.select(id);
                }
                GestureOutput::LongPressed(id) => {
                    let Some(label) = self.scene.get(id).and_then(Overlay::as_text) else {
                        continue;
                    };
                    let (text, color) = (label.text.clone(), label.color);
                    if let Some(listener) = self.listener.as_mut() {
                        listener.on_edit_text_requested(id, &text, color);
                    }
                }
                GestureOutput::StartChange(id) => {
                    if let Some(kind) = self.scene.get(id).map(Overlay::kind) {
                        self.notify_start_change(kind);
                    }
                }
                GestureOutput::StopChange { id, moved } => {
                    if moved {
                        self.clear_redo();
                    }
                    self.update_surface(id);
                    if let Some(kind) = self.scene.get(id).map(Overlay::kind) {
                        self.notify_stop_change(kind);
                    }
                }
                GestureOutput::DeleteZoneHover(over) => self.delete_zone_highlighted = over,
                GestureOutput::DeleteRequested(id) => {
                    self.remove_overlay(id);
                }
                GestureOutput::CanvasTapped => self.clear_helper_box(),
            }
        }
    }

    // --- filters, preview and save ----------------------------------------

    pub fn set_filter_effect(&mut self, effect: impl Into<FilterEffect>) {
        self.assert_ui_thread();
        self.source.set_filter(effect.into());
    }

    /// Render what the user sees onto `base`, helper boxes included.
    pub fn render_preview(&self, base: &Bitmap) -> Bitmap {
        self.compositor.render_preview(base, &self.scene, &self.strokes)
    }

    /// Flatten the scene into a bitmap on the save worker.
    pub fn save_as_bitmap(&mut self, settings: SaveSettings, sink: impl FnOnce(SaveResult<Bitmap>) + 'static) {
        self.begin_save(SaveTarget::Bitmap, settings, Box::new(move |result| {
            sink(result.and_then(|output| match output {
                SaveOutput::Bitmap(bitmap) => Ok(bitmap),
                SaveOutput::File(path) => Err(photoink_core::SaveError::Io(format!(
                    "unexpected file output {}",
                    path.display()
                ))),
            }))
        }));
    }

    /// Flatten, encode and write to `path`, truncating any existing file.
    pub fn save_as_file(
        &mut self,
        path: impl Into<PathBuf>,
        settings: SaveSettings,
        sink: impl FnOnce(SaveResult<PathBuf>) + 'static,
    ) {
        self.begin_save(SaveTarget::File(path.into()), settings, Box::new(move |result| {
            sink(result.and_then(|output| match output {
                SaveOutput::File(path) => Ok(path),
                SaveOutput::Bitmap(_) => Err(photoink_core::SaveError::Io(
                    "unexpected bitmap output for a file save".to_string(),
                )),
            }))
        }));
    }

    /// Phase 1: snapshot on this thread and hand the rest to the worker.
    fn begin_save(&mut self, target: SaveTarget, settings: SaveSettings, sink: crate::save::SaveSink) {
        self.assert_ui_thread();
        let outputs = self.gestures.abort(&mut self.scene);
        self.apply_gestures(outputs);
        self.delete_zone_highlighted = false;
        self.clear_helper_box();

        let (tx, rx) = channel();
        self.source.request_bitmap(Box::new(move |result| {
            let _ = tx.send(result);
        }));

        let ticket = self.saves.next_ticket();
        log::info!("save #{} started ({:?}, {:?})", ticket, target, settings.format);
        let job = SaveJob {
            ticket,
            base: rx,
            snapshot: SceneSnapshot::capture(&self.scene, &self.strokes),
            settings: settings.clone(),
            target,
        };
        let pending = PendingSave {
            ticket,
            clear_after_save: settings.clear_after_save,
            sink,
        };
        self.saves.submit(job, pending);
    }

    /// Number of saves issued but not yet delivered.
    pub fn saves_in_flight(&self) -> usize {
        self.saves.in_flight()
    }

    /// Deliver finished saves to their sinks without blocking.
    /// Returns how many were delivered.
    pub fn poll_saves(&mut self) -> usize {
        self.assert_ui_thread();
        let deliveries = self.saves.collect_ready();
        self.deliver(deliveries)
    }

    /// Block until every issued save has been delivered.
    pub fn wait_for_saves(&mut self) -> usize {
        self.assert_ui_thread();
        let deliveries = self.saves.collect_all();
        self.deliver(deliveries)
    }

    fn deliver(&mut self, deliveries: Vec<crate::save::Delivery>) -> usize {
        let count = deliveries.len();
        for delivery in deliveries {
            if delivery.pending.clear_after_save && delivery.result.is_ok() {
                self.clear_all_overlays();
            }
            (delivery.pending.sink)(delivery.result);
        }
        count
    }

    // --- notifications -----------------------------------------------------

    fn notify_add(&mut self, kind: OverlayKind) {
        let count = self.scene.view().count();
        if let Some(listener) = self.listener.as_mut() {
            listener.on_add_view(kind, count);
        }
    }

    fn notify_remove(&mut self, kind: OverlayKind) {
        let count = self.scene.view().count();
        if let Some(listener) = self.listener.as_mut() {
            listener.on_remove_view(kind, count);
        }
    }

    fn notify_start_change(&mut self, kind: OverlayKind) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_start_view_change(kind);
        }
    }

    fn notify_stop_change(&mut self, kind: OverlayKind) {
        if let Some(listener) = self.listener.as_mut() {
            listener.on_stop_view_change(kind);
        }
    }

    fn update_surface(&mut self, id: OverlayId) {
        if let (Some(surface), Some(overlay)) = (self.surface.as_mut(), self.scene.get(id)) {
            surface.update_layout(overlay);
        }
    }

    fn detach_surface(&mut self, id: OverlayId) {
        if let (Some(surface), Some(overlay)) = (self.surface.as_mut(), self.scene.get(id)) {
            surface.remove_node(overlay);
        }
    }
}
