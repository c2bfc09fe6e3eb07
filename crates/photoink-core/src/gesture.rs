//! Multi-touch gesture state machine for overlays.
//!
//! One session exists from the first pointer down to the last pointer up.
//! A session targets either the overlay under the first pointer or the bare
//! canvas. Overlay sessions move through:
//!
//! - `Tracking`: one pointer, no movement beyond the touch slop yet. Up
//!   within the tap timeout is a click; holding past the long-press timeout
//!   is a long click.
//! - `Dragging`: one pointer, translating the overlay. Releasing over the
//!   delete zone requests removal; releasing outside the canvas snaps the
//!   overlay back to the canvas centre.
//! - `Transforming`: two or more pointers. The first two drive scale,
//!   rotation and translation relative to where they were anchored.

use crate::fonts::FontProvider;
use crate::overlay::{OverlayId, OverlayTransform, normalize_angle};
use crate::scene::Scene;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

pub type PointerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// A raw pointer event from the host, in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub pointer: PointerId,
    pub position: Point,
    /// Host timestamp in milliseconds.
    pub time_ms: u64,
}

impl PointerEvent {
    pub fn new(phase: PointerPhase, pointer: PointerId, position: Point, time_ms: u64) -> Self {
        Self {
            phase,
            pointer,
            position,
            time_ms,
        }
    }

    pub fn down(pointer: PointerId, position: Point, time_ms: u64) -> Self {
        Self::new(PointerPhase::Down, pointer, position, time_ms)
    }

    pub fn moved(pointer: PointerId, position: Point, time_ms: u64) -> Self {
        Self::new(PointerPhase::Move, pointer, position, time_ms)
    }

    pub fn up(pointer: PointerId, position: Point, time_ms: u64) -> Self {
        Self::new(PointerPhase::Up, pointer, position, time_ms)
    }

    pub fn cancel(pointer: PointerId, position: Point, time_ms: u64) -> Self {
        Self::new(PointerPhase::Cancel, pointer, position, time_ms)
    }
}

/// Gesture thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Movement in pixels before a press turns into a drag.
    pub touch_slop: f64,
    pub tap_timeout_ms: u64,
    pub long_press_timeout_ms: u64,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            touch_slop: 8.0,
            tap_timeout_ms: 300,
            long_press_timeout_ms: 500,
            min_scale: 0.5,
            max_scale: 10.0,
        }
    }
}

/// Read-only geometry the engine needs per event.
#[derive(Clone, Copy)]
pub struct GestureContext<'a> {
    pub fonts: &'a dyn FontProvider,
    /// Canvas bounds, `(0, 0)` to `(W, H)`.
    pub canvas: Rect,
    pub delete_zone: Option<Rect>,
}

/// What the engine asks the editor to do, in emission order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutput {
    Clicked(OverlayId),
    LongPressed(OverlayId),
    StartChange(OverlayId),
    /// `moved` is false when the change was cancelled and rewound.
    StopChange { id: OverlayId, moved: bool },
    DeleteZoneHover(bool),
    DeleteRequested(OverlayId),
    CanvasTapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Overlay(OverlayId),
    Canvas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Tracking,
    Dragging,
    Transforming,
}

#[derive(Debug, Clone, Copy)]
enum Anchor {
    Single(Point),
    Pair { mid: Point, span: Vec2 },
}

#[derive(Debug, Clone)]
struct Session {
    target: Target,
    phase: Phase,
    /// Active pointers in press order.
    pointers: Vec<(PointerId, Point)>,
    down_position: Point,
    down_time: u64,
    /// Transform as of the last commit; cancel rewinds here.
    committed: OverlayTransform,
    /// Transform when the current anchor was taken.
    origin: OverlayTransform,
    anchor: Anchor,
    long_pressed: bool,
    moved: bool,
    /// A `StartChange` is outstanding.
    changing: bool,
    multi_touch: bool,
    over_delete_zone: bool,
    scalable: bool,
}

impl Session {
    fn position_of(&self, pointer: PointerId) -> Option<Point> {
        self.pointers.iter().find(|(id, _)| *id == pointer).map(|(_, p)| *p)
    }

    /// Drop the delete-zone highlight, if shown.
    fn leave_delete_zone(&mut self, out: &mut Vec<GestureOutput>) {
        if self.over_delete_zone {
            self.over_delete_zone = false;
            out.push(GestureOutput::DeleteZoneHover(false));
        }
    }

    fn pair_anchor(&self) -> Option<Anchor> {
        let (a, b) = match self.pointers.as_slice() {
            [(_, a), (_, b), ..] => (*a, *b),
            _ => return None,
        };
        Some(Anchor::Pair {
            mid: a.midpoint(b),
            span: b - a,
        })
    }
}

/// Drives overlay selection and manipulation from raw pointer events.
#[derive(Debug, Clone, Default)]
pub struct GestureEngine {
    config: GestureConfig,
    session: Option<Session>,
}

impl GestureEngine {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Overlay currently under manipulation, if any.
    pub fn active_overlay(&self) -> Option<OverlayId> {
        match self.session.as_ref()?.target {
            Target::Overlay(id) => Some(id),
            Target::Canvas => None,
        }
    }

    /// Process one pointer event. Events must arrive in host order.
    pub fn handle(&mut self, event: PointerEvent, scene: &mut Scene, ctx: &GestureContext<'_>) -> Vec<GestureOutput> {
        let mut out = Vec::new();
        self.check_long_press(event.time_ms, &mut out);
        match event.phase {
            PointerPhase::Down => self.pointer_down(event, scene, ctx, &mut out),
            PointerPhase::Move => self.pointer_move(event, scene, ctx, &mut out),
            PointerPhase::Up => self.pointer_up(event, scene, ctx, &mut out),
            PointerPhase::Cancel => self.cancel(scene, &mut out),
        }
        out
    }

    /// Advance time without a pointer event; detects long presses.
    pub fn tick(&mut self, now_ms: u64) -> Vec<GestureOutput> {
        let mut out = Vec::new();
        self.check_long_press(now_ms, &mut out);
        out
    }

    /// Drop the live session, rewinding any uncommitted movement.
    pub fn abort(&mut self, scene: &mut Scene) -> Vec<GestureOutput> {
        let mut out = Vec::new();
        self.cancel(scene, &mut out);
        out
    }

    fn pointer_down(
        &mut self,
        event: PointerEvent,
        scene: &mut Scene,
        ctx: &GestureContext<'_>,
        out: &mut Vec<GestureOutput>,
    ) {
        let Some(session) = self.session.as_mut() else {
            self.session = Some(Self::start_session(event, scene, ctx));
            return;
        };
        if session.position_of(event.pointer).is_some() {
            return;
        }
        session.pointers.push((event.pointer, event.position));
        session.multi_touch = true;

        let Target::Overlay(id) = session.target else {
            return;
        };
        let Some(overlay) = scene.get(id) else {
            self.session = None;
            return;
        };
        if let Some(anchor) = session.pair_anchor() {
            session.leave_delete_zone(out);
            session.phase = Phase::Transforming;
            session.origin = overlay.transform;
            session.anchor = anchor;
        }
    }

    fn start_session(event: PointerEvent, scene: &Scene, ctx: &GestureContext<'_>) -> Session {
        let hit = scene
            .overlay_at(event.position, ctx.fonts)
            .and_then(|id| scene.get(id));
        let (target, transform, scalable) = match hit {
            Some(overlay) => (Target::Overlay(overlay.id()), overlay.transform, overlay.scalable),
            None => (Target::Canvas, OverlayTransform::default(), false),
        };
        Session {
            target,
            phase: Phase::Tracking,
            pointers: vec![(event.pointer, event.position)],
            down_position: event.position,
            down_time: event.time_ms,
            committed: transform,
            origin: transform,
            anchor: Anchor::Single(event.position),
            long_pressed: false,
            moved: false,
            changing: false,
            multi_touch: false,
            over_delete_zone: false,
            scalable,
        }
    }

    fn pointer_move(
        &mut self,
        event: PointerEvent,
        scene: &mut Scene,
        ctx: &GestureContext<'_>,
        out: &mut Vec<GestureOutput>,
    ) {
        let slop = self.config.touch_slop;
        let (min_scale, max_scale) = (self.config.min_scale, self.config.max_scale);
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(slot) = session.pointers.iter_mut().find(|(id, _)| *id == event.pointer) else {
            return;
        };
        slot.1 = event.position;

        let Target::Overlay(id) = session.target else {
            if event.position.distance(session.down_position) > slop {
                session.moved = true;
            }
            return;
        };
        let Some(overlay) = scene.get_mut(id) else {
            self.session = None;
            return;
        };

        if session.phase == Phase::Tracking {
            if session.pointers.len() != 1 || event.position.distance(session.down_position) <= slop {
                return;
            }
            session.phase = Phase::Dragging;
            session.moved = true;
            session.origin = overlay.transform;
            session.anchor = Anchor::Single(session.down_position);
            if !session.changing {
                session.changing = true;
                out.push(GestureOutput::StartChange(id));
            }
        }

        match (session.phase, session.anchor) {
            (Phase::Dragging, Anchor::Single(start)) => {
                overlay.transform = session.origin.translated(event.position - start);
                if let Some(zone) = ctx.delete_zone {
                    let over = contains_inclusive(zone, event.position);
                    if over != session.over_delete_zone {
                        session.over_delete_zone = over;
                        out.push(GestureOutput::DeleteZoneHover(over));
                    }
                }
            }
            (Phase::Transforming, Anchor::Pair { mid, span }) => {
                let Some(Anchor::Pair { mid: now_mid, span: now_span }) = session.pair_anchor() else {
                    return;
                };
                session.moved = true;
                if !session.changing {
                    session.changing = true;
                    out.push(GestureOutput::StartChange(id));
                }
                let origin = session.origin;
                let start_len = span.hypot();
                let scale = if session.scalable && start_len > f64::EPSILON {
                    (origin.scale * now_span.hypot() / start_len).clamp(min_scale, max_scale)
                } else {
                    origin.scale
                };
                let twist = span.cross(now_span).atan2(span.dot(now_span));
                overlay.transform = OverlayTransform {
                    translation: origin.translation + (now_mid - mid),
                    scale,
                    rotation: normalize_angle(origin.rotation + twist),
                };
            }
            _ => {}
        }
    }

    fn pointer_up(
        &mut self,
        event: PointerEvent,
        scene: &mut Scene,
        ctx: &GestureContext<'_>,
        out: &mut Vec<GestureOutput>,
    ) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.pointers.retain(|(id, _)| *id != event.pointer);
        let remaining = session.pointers.len();
        let elapsed = event.time_ms.saturating_sub(session.down_time);
        let is_tap = !session.moved
            && !session.long_pressed
            && !session.multi_touch
            && elapsed <= self.config.tap_timeout_ms;

        let id = match session.target {
            Target::Overlay(id) => id,
            Target::Canvas => {
                if remaining == 0 {
                    if is_tap {
                        out.push(GestureOutput::CanvasTapped);
                    }
                    self.session = None;
                }
                return;
            }
        };
        let Some(overlay) = scene.get_mut(id) else {
            self.session = None;
            return;
        };

        match session.phase {
            Phase::Transforming => {
                if remaining >= 2 {
                    // Re-anchor on the pair still down.
                    if let Some(anchor) = session.pair_anchor() {
                        session.origin = overlay.transform;
                        session.anchor = anchor;
                    }
                    return;
                }
                session.committed = overlay.transform;
                if session.changing {
                    session.changing = false;
                    out.push(GestureOutput::StopChange { id, moved: true });
                }
                if let Some(&(_, position)) = session.pointers.first() {
                    session.phase = Phase::Tracking;
                    session.down_position = position;
                    session.origin = overlay.transform;
                    session.anchor = Anchor::Single(position);
                } else {
                    session.leave_delete_zone(out);
                    self.session = None;
                }
            }
            Phase::Dragging => {
                if remaining > 0 {
                    return;
                }
                if session.over_delete_zone {
                    out.push(GestureOutput::DeleteZoneHover(false));
                    out.push(GestureOutput::StopChange { id, moved: true });
                    out.push(GestureOutput::DeleteRequested(id));
                } else {
                    if !contains_inclusive(ctx.canvas, event.position) {
                        overlay.transform.translation = ctx.canvas.center();
                    }
                    out.push(GestureOutput::StopChange { id, moved: true });
                }
                self.session = None;
            }
            Phase::Tracking => {
                if remaining > 0 {
                    return;
                }
                session.leave_delete_zone(out);
                if is_tap {
                    out.push(GestureOutput::Clicked(id));
                }
                self.session = None;
            }
        }
    }

    fn cancel(&mut self, scene: &mut Scene, out: &mut Vec<GestureOutput>) {
        let Some(session) = self.session.take() else {
            return;
        };
        let Target::Overlay(id) = session.target else {
            return;
        };
        if let Some(overlay) = scene.get_mut(id) {
            overlay.transform = session.committed;
        }
        if session.over_delete_zone {
            out.push(GestureOutput::DeleteZoneHover(false));
        }
        if session.changing {
            out.push(GestureOutput::StopChange { id, moved: false });
        }
    }

    fn check_long_press(&mut self, now_ms: u64, out: &mut Vec<GestureOutput>) {
        let timeout = self.config.long_press_timeout_ms;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Target::Overlay(id) = session.target else {
            return;
        };
        if session.phase == Phase::Tracking
            && !session.moved
            && !session.long_pressed
            && !session.multi_touch
            && now_ms.saturating_sub(session.down_time) >= timeout
        {
            session.long_pressed = true;
            out.push(GestureOutput::LongPressed(id));
        }
    }
}

fn contains_inclusive(rect: Rect, point: Point) -> bool {
    point.x >= rect.x0 && point.x <= rect.x1 && point.y >= rect.y0 && point.y <= rect.y1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bitmap;
    use crate::fonts::BlockFont;
    use crate::overlay::{Overlay, OverlayPayload, Sticker};
    use std::f64::consts::FRAC_PI_2;

    fn setup() -> (GestureEngine, Scene, OverlayId) {
        let mut scene = Scene::new();
        let id = scene.insert(Overlay::new(
            OverlayPayload::Sticker(Sticker::new(Bitmap::new(20, 20))),
            OverlayTransform::at(Point::new(50.0, 50.0)),
        ));
        (GestureEngine::default(), scene, id)
    }

    fn ctx() -> GestureContext<'static> {
        GestureContext {
            fonts: &BlockFont,
            canvas: Rect::new(0.0, 0.0, 100.0, 100.0),
            delete_zone: Some(Rect::new(40.0, 90.0, 60.0, 100.0)),
        }
    }

    fn pt(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn test_tap_clicks() {
        let (mut engine, mut scene, id) = setup();
        engine.handle(PointerEvent::down(1, pt(50.0, 50.0), 0), &mut scene, &ctx());
        engine.handle(PointerEvent::moved(1, pt(52.0, 51.0), 50), &mut scene, &ctx());
        let out = engine.handle(PointerEvent::up(1, pt(52.0, 51.0), 100), &mut scene, &ctx());
        assert_eq!(out, vec![GestureOutput::Clicked(id)]);
        assert!(!engine.is_active());
    }

    #[test]
    fn test_slow_release_is_not_a_tap() {
        let (mut engine, mut scene, _) = setup();
        engine.handle(PointerEvent::down(1, pt(50.0, 50.0), 0), &mut scene, &ctx());
        let out = engine.handle(PointerEvent::up(1, pt(50.0, 50.0), 400), &mut scene, &ctx());
        assert!(out.is_empty());
    }

    #[test]
    fn test_long_press_via_tick() {
        let (mut engine, mut scene, id) = setup();
        engine.handle(PointerEvent::down(1, pt(50.0, 50.0), 0), &mut scene, &ctx());
        assert!(engine.tick(200).is_empty());
        assert_eq!(engine.tick(500), vec![GestureOutput::LongPressed(id)]);
        assert!(engine.tick(900).is_empty());
        let out = engine.handle(PointerEvent::up(1, pt(50.0, 50.0), 950), &mut scene, &ctx());
        assert!(out.is_empty());
    }

    #[test]
    fn test_drag_moves_and_commits() {
        let (mut engine, mut scene, id) = setup();
        engine.handle(PointerEvent::down(1, pt(50.0, 50.0), 0), &mut scene, &ctx());
        let out = engine.handle(PointerEvent::moved(1, pt(60.0, 50.0), 10), &mut scene, &ctx());
        assert_eq!(out, vec![GestureOutput::StartChange(id)]);
        assert_eq!(scene.get(id).unwrap().transform.translation, pt(60.0, 50.0));

        engine.handle(PointerEvent::moved(1, pt(70.0, 40.0), 20), &mut scene, &ctx());
        let out = engine.handle(PointerEvent::up(1, pt(70.0, 40.0), 30), &mut scene, &ctx());
        assert_eq!(out, vec![GestureOutput::StopChange { id, moved: true }]);
        assert_eq!(scene.get(id).unwrap().transform.translation, pt(70.0, 40.0));
    }

    #[test]
    fn test_drag_into_delete_zone() {
        let (mut engine, mut scene, id) = setup();
        engine.handle(PointerEvent::down(1, pt(50.0, 50.0), 0), &mut scene, &ctx());
        engine.handle(PointerEvent::moved(1, pt(50.0, 70.0), 10), &mut scene, &ctx());
        let out = engine.handle(PointerEvent::moved(1, pt(50.0, 95.0), 20), &mut scene, &ctx());
        assert_eq!(out, vec![GestureOutput::DeleteZoneHover(true)]);
        let out = engine.handle(PointerEvent::up(1, pt(50.0, 95.0), 30), &mut scene, &ctx());
        assert_eq!(
            out,
            vec![
                GestureOutput::DeleteZoneHover(false),
                GestureOutput::StopChange { id, moved: true },
                GestureOutput::DeleteRequested(id),
            ]
        );
    }

    #[test]
    fn test_second_pointer_leaves_delete_zone() {
        let (mut engine, mut scene, id) = setup();
        engine.handle(PointerEvent::down(1, pt(50.0, 50.0), 0), &mut scene, &ctx());
        engine.handle(PointerEvent::moved(1, pt(50.0, 95.0), 10), &mut scene, &ctx());

        let out = engine.handle(PointerEvent::down(2, pt(60.0, 80.0), 20), &mut scene, &ctx());
        assert_eq!(out, vec![GestureOutput::DeleteZoneHover(false)]);
        let out = engine.handle(PointerEvent::up(2, pt(60.0, 80.0), 30), &mut scene, &ctx());
        assert_eq!(out, vec![GestureOutput::StopChange { id, moved: true }]);
        let out = engine.handle(PointerEvent::up(1, pt(50.0, 95.0), 40), &mut scene, &ctx());
        assert!(out.is_empty());
        assert!(!engine.is_active());
    }

    #[test]
    fn test_drop_outside_canvas_recentres() {
        let (mut engine, mut scene, id) = setup();
        engine.handle(PointerEvent::down(1, pt(50.0, 50.0), 0), &mut scene, &ctx());
        engine.handle(PointerEvent::moved(1, pt(120.0, 50.0), 10), &mut scene, &ctx());
        engine.handle(PointerEvent::up(1, pt(120.0, 50.0), 20), &mut scene, &ctx());
        assert_eq!(scene.get(id).unwrap().transform.translation, pt(50.0, 50.0));
    }

    #[test]
    fn test_cancel_rewinds() {
        let (mut engine, mut scene, id) = setup();
        engine.handle(PointerEvent::down(1, pt(50.0, 50.0), 0), &mut scene, &ctx());
        engine.handle(PointerEvent::moved(1, pt(80.0, 20.0), 10), &mut scene, &ctx());
        let out = engine.handle(PointerEvent::cancel(1, pt(80.0, 20.0), 20), &mut scene, &ctx());
        assert_eq!(out, vec![GestureOutput::StopChange { id, moved: false }]);
        assert_eq!(scene.get(id).unwrap().transform.translation, pt(50.0, 50.0));
    }

    #[test]
    fn test_pinch_and_twist() {
        let (mut engine, mut scene, id) = setup();
        engine.handle(PointerEvent::down(1, pt(45.0, 50.0), 0), &mut scene, &ctx());
        engine.handle(PointerEvent::down(2, pt(55.0, 50.0), 5), &mut scene, &ctx());
        // Pair rotated a quarter turn and doubled in length, midpoint unchanged.
        engine.handle(PointerEvent::moved(1, pt(50.0, 40.0), 10), &mut scene, &ctx());
        let out = engine.handle(PointerEvent::moved(2, pt(50.0, 60.0), 15), &mut scene, &ctx());
        assert!(out.is_empty());

        let t = scene.get(id).unwrap().transform;
        assert!((t.scale - 2.0).abs() < 1e-9);
        assert!((t.rotation - FRAC_PI_2).abs() < 1e-9);
        assert!((t.translation.x - 50.0).abs() < 1e-9);
        assert!((t.translation.y - 50.0).abs() < 1e-9);

        let out = engine.handle(PointerEvent::up(2, pt(50.0, 60.0), 20), &mut scene, &ctx());
        assert_eq!(out, vec![GestureOutput::StopChange { id, moved: true }]);
        let out = engine.handle(PointerEvent::up(1, pt(50.0, 40.0), 25), &mut scene, &ctx());
        assert!(out.is_empty());
        assert!(!engine.is_active());
    }

    #[test]
    fn test_pinch_scale_is_clamped_and_optional() {
        let (mut engine, mut scene, id) = setup();
        engine.handle(PointerEvent::down(1, pt(45.0, 50.0), 0), &mut scene, &ctx());
        engine.handle(PointerEvent::down(2, pt(55.0, 50.0), 0), &mut scene, &ctx());
        engine.handle(PointerEvent::moved(2, pt(46.0, 50.0), 10), &mut scene, &ctx());
        assert!((scene.get(id).unwrap().transform.scale - 0.5).abs() < 1e-9);
        engine.handle(PointerEvent::cancel(1, pt(45.0, 50.0), 20), &mut scene, &ctx());

        scene.get_mut(id).unwrap().scalable = false;
        engine.handle(PointerEvent::down(1, pt(45.0, 50.0), 30), &mut scene, &ctx());
        engine.handle(PointerEvent::down(2, pt(55.0, 50.0), 30), &mut scene, &ctx());
        engine.handle(PointerEvent::moved(2, pt(75.0, 50.0), 40), &mut scene, &ctx());
        assert!((scene.get(id).unwrap().transform.scale - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_canvas_tap() {
        let (mut engine, mut scene, _) = setup();
        engine.handle(PointerEvent::down(1, pt(5.0, 5.0), 0), &mut scene, &ctx());
        let out = engine.handle(PointerEvent::up(1, pt(5.0, 5.0), 50), &mut scene, &ctx());
        assert_eq!(out, vec![GestureOutput::CanvasTapped]);

        engine.handle(PointerEvent::down(1, pt(5.0, 5.0), 100), &mut scene, &ctx());
        engine.handle(PointerEvent::moved(1, pt(30.0, 5.0), 120), &mut scene, &ctx());
        let out = engine.handle(PointerEvent::up(1, pt(30.0, 5.0), 150), &mut scene, &ctx());
        assert!(out.is_empty());
    }
}
