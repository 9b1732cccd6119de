//! Viewport controller: the pan/zoom transform, the interaction-mode state
//! machine, and the dispatch of pointer events into buffer-space operations.
//!
//! The controller owns the current `RasterBuffer` plus an immutable snapshot
//! of the originally loaded image (for reset). It never talks to a display
//! surface — the app layer reads `image_rect` / `crop_overlay` each frame and
//! paints them.

use egui::{CursorIcon, Pos2, Rect, Vec2};
use image::Rgba;

use crate::log_info;
use crate::raster::RasterBuffer;

/// Multiplicative zoom step per wheel notch. The two factors are exact
/// inverses so one notch in followed by one notch out restores the scale.
pub const ZOOM_IN_STEP: f32 = 1.25;
pub const ZOOM_OUT_STEP: f32 = 0.8;

const MIN_SCALE: f32 = 0.01;
const MAX_SCALE: f32 = 100.0;

// ============================================================================
// INTERACTION MODES
// ============================================================================

/// What pointer input currently means. Selected explicitly from the toolbar;
/// the only automatic transition is Crop → View after a successful crop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    View,
    Draw,
    Crop,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::View => "View",
            Mode::Draw => "Draw",
            Mode::Crop => "Crop",
        }
    }

    /// Pointer affordance shown while hovering the canvas.
    pub fn cursor_icon(&self) -> CursorIcon {
        match self {
            Mode::View => CursorIcon::Grab,
            Mode::Draw | Mode::Crop => CursorIcon::Crosshair,
        }
    }

    pub fn all() -> &'static [Mode] {
        &[Mode::View, Mode::Draw, Mode::Crop]
    }
}

// ============================================================================
// VIEW TRANSFORM
// ============================================================================

/// Affine buffer→viewport mapping: `viewport = buffer * scale + offset`.
/// Mutated only by zoom and pan gestures (and by fit-to-view on load, crop
/// and reset).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub scale: f32,
    pub offset: Vec2,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: Vec2::ZERO,
        }
    }
}

impl ViewTransform {
    /// Scale + center a `width`×`height` buffer inside `viewport`, preserving
    /// aspect ratio.
    pub fn fit(width: u32, height: u32, viewport: Rect) -> Self {
        if width == 0 || height == 0 || viewport.width() <= 0.0 || viewport.height() <= 0.0 {
            return Self::default();
        }
        let scale = (viewport.width() / width as f32)
            .min(viewport.height() / height as f32)
            .clamp(MIN_SCALE, MAX_SCALE);
        let content = Vec2::new(width as f32, height as f32) * scale;
        let offset = viewport.min.to_vec2() + (viewport.size() - content) * 0.5;
        Self { scale, offset }
    }

    pub fn to_viewport(&self, p: Pos2) -> Pos2 {
        Pos2::new(p.x * self.scale + self.offset.x, p.y * self.scale + self.offset.y)
    }

    pub fn to_buffer(&self, p: Pos2) -> Pos2 {
        Pos2::new(
            (p.x - self.offset.x) / self.scale,
            (p.y - self.offset.y) / self.scale,
        )
    }

    pub fn rect_to_viewport(&self, r: Rect) -> Rect {
        Rect::from_min_max(self.to_viewport(r.min), self.to_viewport(r.max))
    }

    pub fn rect_to_buffer(&self, r: Rect) -> Rect {
        Rect::from_min_max(self.to_buffer(r.min), self.to_buffer(r.max))
    }

    /// Zoom while keeping the viewport-space `anchor` point fixed (the point
    /// under the cursor stays under the cursor).
    pub fn zoom_around(&mut self, factor: f32, anchor: Pos2) {
        let old_scale = self.scale;
        self.scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        let actual = self.scale / old_scale;
        // offset is the viewport position of the buffer origin; it moves away
        // from the anchor by the applied factor.
        self.offset.x = anchor.x + (self.offset.x - anchor.x) * actual;
        self.offset.y = anchor.y + (self.offset.y - anchor.y) * actual;
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        self.offset += delta;
    }
}

// ============================================================================
// VIEWPORT CONTROLLER
// ============================================================================

/// Owns the current image, the view transform and all in-progress gesture
/// state. Pointer events arrive in viewport coordinates; the active mode
/// decides what they mean.
///
/// Gesture state is held as optional-valid fields: `stroke_cursor` is
/// `Some` exactly while a draw drag is active, `crop_anchor`/`crop_rect`
/// exactly while a crop drag is active. There is no separate "mouse down"
/// flag to fall out of sync.
pub struct ViewportController {
    buffer: Option<RasterBuffer>,
    /// Immutable copy of the originally loaded image, kept for reset.
    source: Option<RasterBuffer>,
    pub transform: ViewTransform,
    mode: Mode,
    /// Last buffer-space point of an in-progress draw drag.
    stroke_cursor: Option<Pos2>,
    /// Last viewport-space point of an in-progress pan drag.
    pan_cursor: Option<Pos2>,
    /// Viewport-space origin of an in-progress crop drag.
    crop_anchor: Option<Pos2>,
    /// Live, normalized selection rectangle in viewport space.
    crop_rect: Option<Rect>,
    pub brush_color: Rgba<u8>,
    pub brush_width: u32,
    /// Set whenever pixel content changes; the app consumes it to re-upload
    /// the display texture.
    dirty: bool,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewportController {
    pub fn new() -> Self {
        Self {
            buffer: None,
            source: None,
            transform: ViewTransform::default(),
            mode: Mode::View,
            stroke_cursor: None,
            pan_cursor: None,
            crop_anchor: None,
            crop_rect: None,
            brush_color: Rgba([255, 0, 0, 255]),
            brush_width: 5,
            dirty: false,
        }
    }

    pub fn buffer(&self) -> Option<&RasterBuffer> {
        self.buffer.as_ref()
    }

    pub fn has_image(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch interaction mode, discarding any in-progress gesture.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.clear_gesture();
    }

    /// Install a freshly decoded image as both the current buffer and the
    /// retained source snapshot, and fit the view to it.
    pub fn set_image(&mut self, buffer: RasterBuffer, viewport: Rect) {
        self.transform = ViewTransform::fit(buffer.width(), buffer.height(), viewport);
        self.source = Some(buffer.clone());
        self.buffer = Some(buffer);
        self.clear_gesture();
        self.dirty = true;
    }

    /// Restore the originally loaded pixels and re-fit the view. Silent no-op
    /// when no image has ever been loaded.
    pub fn reset_to_source(&mut self, viewport: Rect) {
        let Some(source) = self.source.as_ref() else {
            return;
        };
        let buffer = source.clone();
        self.transform = ViewTransform::fit(buffer.width(), buffer.height(), viewport);
        self.buffer = Some(buffer);
        self.clear_gesture();
        self.dirty = true;
    }

    // ---- pointer event dispatch ---------------------------------------------

    pub fn pointer_down(&mut self, pos: Pos2, _viewport: Rect) {
        if self.buffer.is_none() {
            return;
        }
        match self.mode {
            Mode::View => self.pan_cursor = Some(pos),
            Mode::Draw => self.stroke_cursor = Some(self.transform.to_buffer(pos)),
            Mode::Crop => {
                self.crop_anchor = Some(pos);
                self.crop_rect = Some(Rect::from_min_size(pos, Vec2::ZERO));
            }
        }
    }

    /// Pointer moved with the button held. Ignored when no gesture is active
    /// (e.g. a drag that started outside the canvas).
    pub fn pointer_move(&mut self, pos: Pos2) {
        match self.mode {
            Mode::View => {
                if let Some(last) = self.pan_cursor {
                    self.transform.pan_by(pos - last);
                    self.pan_cursor = Some(pos);
                }
            }
            Mode::Draw => {
                if let Some(last) = self.stroke_cursor {
                    // Each move event appends one straight segment, so the
                    // drag becomes a chain approximating the freehand path.
                    let next = self.transform.to_buffer(pos);
                    if let Some(buffer) = self.buffer.as_mut() {
                        buffer.draw_line(last, next, self.brush_color, self.brush_width);
                        self.dirty = true;
                    }
                    self.stroke_cursor = Some(next);
                }
            }
            Mode::Crop => {
                if let Some(anchor) = self.crop_anchor {
                    self.crop_rect = Some(Rect::from_two_pos(anchor, pos));
                }
            }
        }
    }

    pub fn pointer_up(&mut self, pos: Pos2, viewport: Rect) {
        match self.mode {
            Mode::View => self.pan_cursor = None,
            Mode::Draw => self.stroke_cursor = None,
            Mode::Crop => {
                let anchor = self.crop_anchor.take();
                self.crop_rect = None;
                if let Some(anchor) = anchor {
                    self.finish_crop(Rect::from_two_pos(anchor, pos), viewport);
                }
            }
        }
    }

    /// Wheel zoom, anchored at the pointer. Only the View mode zooms; in Draw
    /// and Crop the transform is frozen so gestures stay in a stable frame.
    pub fn wheel_zoom(&mut self, scroll_y: f32, anchor: Pos2) {
        if self.mode != Mode::View || self.buffer.is_none() || scroll_y == 0.0 {
            return;
        }
        let factor = if scroll_y > 0.0 { ZOOM_IN_STEP } else { ZOOM_OUT_STEP };
        self.transform.zoom_around(factor, anchor);
    }

    // ---- render queries -----------------------------------------------------

    /// Viewport-space rectangle the buffer occupies under the current
    /// transform.
    pub fn image_rect(&self) -> Option<Rect> {
        self.buffer
            .as_ref()
            .map(|b| self.transform.rect_to_viewport(b.bounds()))
    }

    /// Live crop selection to overlay, in viewport space (undistorted by
    /// content scaling). `Some` exactly while a crop drag is active.
    pub fn crop_overlay(&self) -> Option<Rect> {
        self.crop_rect
    }

    /// True while a draw drag is in progress.
    pub fn stroke_active(&self) -> bool {
        self.stroke_cursor.is_some()
    }

    /// Consume the pixels-changed flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    // ---- internals ----------------------------------------------------------

    fn clear_gesture(&mut self) {
        self.stroke_cursor = None;
        self.pan_cursor = None;
        self.crop_anchor = None;
        self.crop_rect = None;
    }

    fn finish_crop(&mut self, selection: Rect, viewport: Rect) {
        let Some(buffer) = self.buffer.as_ref() else {
            return;
        };
        let buffer_rect = self.transform.rect_to_buffer(selection);
        match buffer.crop_to(buffer_rect) {
            Ok(cropped) => {
                log_info!("Cropped image to {}x{}", cropped.width(), cropped.height());
                self.transform = ViewTransform::fit(cropped.width(), cropped.height(), viewport);
                self.buffer = Some(cropped);
                // Crop is one-shot per entry into the mode
                self.mode = Mode::View;
                self.dirty = true;
            }
            // Degenerate selection: drop the overlay, stay in Crop for
            // another attempt, leave the transform alone.
            Err(_) => {}
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn viewport() -> Rect {
        Rect::from_min_size(Pos2::ZERO, Vec2::new(200.0, 200.0))
    }

    /// Controller with a 100×100 white image fitted into a 200×200 viewport,
    /// i.e. scale 2.0 and zero offset.
    fn loaded_controller() -> ViewportController {
        let mut vc = ViewportController::new();
        vc.set_image(RasterBuffer::new(100, 100, WHITE), viewport());
        assert_eq!(vc.transform.scale, 2.0);
        assert_eq!(vc.transform.offset, Vec2::ZERO);
        vc
    }

    fn pixels(vc: &ViewportController) -> Vec<u8> {
        vc.buffer().unwrap().as_rgba().as_raw().clone()
    }

    #[test]
    fn fit_preserves_aspect_ratio_and_centers() {
        let t = ViewTransform::fit(100, 50, viewport());
        assert_eq!(t.scale, 2.0);
        // 100×50 at scale 2 is 200×100, centered vertically
        assert_eq!(t.offset, Vec2::new(0.0, 50.0));
        assert_eq!(t.to_viewport(Pos2::new(50.0, 25.0)), Pos2::new(100.0, 100.0));
        assert_eq!(t.to_buffer(Pos2::new(100.0, 100.0)), Pos2::new(50.0, 25.0));
    }

    #[test]
    fn zoom_round_trip_restores_scale() {
        let mut vc = loaded_controller();
        let before = vc.transform.scale;
        vc.wheel_zoom(1.0, Pos2::new(70.0, 40.0));
        assert!((vc.transform.scale - before * ZOOM_IN_STEP).abs() < 1e-6);
        vc.wheel_zoom(-1.0, Pos2::new(70.0, 40.0));
        assert!((vc.transform.scale - before).abs() < 1e-4);
    }

    #[test]
    fn zoom_keeps_anchor_point_fixed() {
        let mut vc = loaded_controller();
        let anchor = Pos2::new(120.0, 80.0);
        let buffer_point = vc.transform.to_buffer(anchor);
        vc.wheel_zoom(1.0, anchor);
        let after = vc.transform.to_buffer(anchor);
        assert!((after.x - buffer_point.x).abs() < 1e-4);
        assert!((after.y - buffer_point.y).abs() < 1e-4);
    }

    #[test]
    fn view_mode_pans_but_never_touches_pixels() {
        let mut vc = loaded_controller();
        let before = pixels(&vc);
        vc.pointer_down(Pos2::new(100.0, 100.0), viewport());
        vc.pointer_move(Pos2::new(130.0, 90.0));
        vc.pointer_move(Pos2::new(150.0, 120.0));
        vc.pointer_up(Pos2::new(150.0, 120.0), viewport());
        assert_eq!(vc.transform.offset, Vec2::new(50.0, 20.0));
        assert_eq!(pixels(&vc), before);
    }

    #[test]
    fn draw_mode_paints_but_never_touches_transform() {
        let mut vc = loaded_controller();
        vc.set_mode(Mode::Draw);
        vc.brush_color = BLACK;
        vc.brush_width = 1;
        let transform = vc.transform;
        vc.pointer_down(Pos2::new(20.0, 100.0), viewport());
        vc.pointer_move(Pos2::new(180.0, 100.0));
        vc.wheel_zoom(1.0, Pos2::new(100.0, 100.0));
        vc.pointer_up(Pos2::new(180.0, 100.0), viewport());
        assert_eq!(vc.transform, transform);
        // Viewport (20,100)-(180,100) maps to buffer row 50, columns 10..=90
        assert_eq!(vc.buffer().unwrap().pixel(10, 50), BLACK);
        assert_eq!(vc.buffer().unwrap().pixel(90, 50), BLACK);
    }

    #[test]
    fn drag_is_a_chain_of_segments_not_one_line() {
        let points = [
            Pos2::new(20.0, 40.0),
            Pos2::new(80.0, 160.0),
            Pos2::new(120.0, 60.0),
            Pos2::new(180.0, 140.0),
        ];

        let mut vc = loaded_controller();
        vc.set_mode(Mode::Draw);
        vc.brush_color = BLACK;
        vc.brush_width = 3;
        vc.pointer_down(points[0], viewport());
        for p in &points[1..] {
            vc.pointer_move(*p);
        }
        vc.pointer_up(points[3], viewport());

        // Same coverage as three explicit segment draws in buffer space
        let mut expected = RasterBuffer::new(100, 100, WHITE);
        let t = ViewTransform::fit(100, 100, viewport());
        for pair in points.windows(2) {
            expected.draw_line(t.to_buffer(pair[0]), t.to_buffer(pair[1]), BLACK, 3);
        }
        assert_eq!(pixels(&vc), expected.as_rgba().as_raw().clone());

        // ... and different from a single start-to-end line
        let mut single = RasterBuffer::new(100, 100, WHITE);
        single.draw_line(t.to_buffer(points[0]), t.to_buffer(points[3]), BLACK, 3);
        assert_ne!(pixels(&vc), single.as_rgba().as_raw().clone());
    }

    #[test]
    fn stroke_cursor_defined_iff_drag_active() {
        let mut vc = loaded_controller();
        vc.set_mode(Mode::Draw);
        assert!(!vc.stroke_active());
        vc.pointer_down(Pos2::new(50.0, 50.0), viewport());
        assert!(vc.stroke_active());
        vc.pointer_up(Pos2::new(50.0, 50.0), viewport());
        assert!(!vc.stroke_active());

        // Mode switch mid-gesture discards the gesture
        vc.pointer_down(Pos2::new(50.0, 50.0), viewport());
        vc.set_mode(Mode::View);
        assert!(!vc.stroke_active());
    }

    #[test]
    fn click_without_drag_draws_nothing() {
        let mut vc = loaded_controller();
        vc.set_mode(Mode::Draw);
        vc.brush_color = BLACK;
        let before = pixels(&vc);
        vc.pointer_down(Pos2::new(100.0, 100.0), viewport());
        vc.pointer_up(Pos2::new(100.0, 100.0), viewport());
        assert_eq!(pixels(&vc), before);
    }

    #[test]
    fn successful_crop_returns_to_view_and_refits() {
        let mut vc = loaded_controller();
        vc.set_mode(Mode::Crop);
        vc.pointer_down(Pos2::new(0.0, 0.0), viewport());
        vc.pointer_move(Pos2::new(200.0, 120.0));
        assert!(vc.crop_overlay().is_some());
        vc.pointer_up(Pos2::new(200.0, 120.0), viewport());

        assert_eq!(vc.mode(), Mode::View);
        assert!(vc.crop_overlay().is_none());
        let buf = vc.buffer().unwrap();
        assert_eq!((buf.width(), buf.height()), (100, 60));
        // Re-fit: 100×60 in a 200×200 viewport is scale 2, centered vertically
        assert_eq!(vc.transform.scale, 2.0);
        assert_eq!(vc.transform.offset, Vec2::new(0.0, 40.0));
    }

    #[test]
    fn empty_crop_stays_in_crop_mode() {
        let mut vc = loaded_controller();
        vc.set_mode(Mode::Crop);
        let transform = vc.transform;
        // Zero-size click
        vc.pointer_down(Pos2::new(80.0, 80.0), viewport());
        vc.pointer_up(Pos2::new(80.0, 80.0), viewport());
        assert_eq!(vc.mode(), Mode::Crop);
        assert_eq!(vc.transform, transform);
        assert_eq!(vc.buffer().unwrap().width(), 100);

        // Drag entirely outside the image maps past the buffer bounds
        vc.transform.pan_by(Vec2::new(-300.0, 0.0));
        vc.pointer_down(Pos2::new(150.0, 10.0), viewport());
        vc.pointer_move(Pos2::new(190.0, 60.0));
        vc.pointer_up(Pos2::new(190.0, 60.0), viewport());
        assert_eq!(vc.mode(), Mode::Crop);
        assert_eq!(vc.buffer().unwrap().width(), 100);
    }

    #[test]
    fn reset_restores_source_and_is_idempotent() {
        let mut vc = loaded_controller();
        vc.set_mode(Mode::Draw);
        vc.brush_color = BLACK;
        vc.brush_width = 4;
        vc.pointer_down(Pos2::new(40.0, 40.0), viewport());
        vc.pointer_move(Pos2::new(160.0, 160.0));
        vc.pointer_up(Pos2::new(160.0, 160.0), viewport());
        assert_ne!(pixels(&vc), vec![255u8; 100 * 100 * 4]);

        vc.reset_to_source(viewport());
        let after_first = pixels(&vc);
        assert_eq!(after_first, vec![255u8; 100 * 100 * 4]);
        vc.reset_to_source(viewport());
        assert_eq!(pixels(&vc), after_first);
    }

    #[test]
    fn reset_without_image_is_a_no_op() {
        let mut vc = ViewportController::new();
        vc.reset_to_source(viewport());
        assert!(!vc.has_image());
        assert!(!vc.take_dirty());
    }

    #[test]
    fn events_without_image_are_ignored() {
        let mut vc = ViewportController::new();
        vc.set_mode(Mode::Draw);
        vc.pointer_down(Pos2::new(10.0, 10.0), viewport());
        assert!(!vc.stroke_active());
        vc.wheel_zoom(1.0, Pos2::new(10.0, 10.0));
        assert_eq!(vc.transform.scale, 1.0);
    }

    #[test]
    fn snapshot_survives_crop_for_reset() {
        let mut vc = loaded_controller();
        vc.set_mode(Mode::Crop);
        vc.pointer_down(Pos2::new(40.0, 40.0), viewport());
        vc.pointer_move(Pos2::new(160.0, 160.0));
        vc.pointer_up(Pos2::new(160.0, 160.0), viewport());
        assert_eq!(vc.buffer().unwrap().width(), 60);

        vc.reset_to_source(viewport());
        let buf = vc.buffer().unwrap();
        assert_eq!((buf.width(), buf.height()), (100, 100));
    }
}
