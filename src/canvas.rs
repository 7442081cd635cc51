use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect, Sense, TextureOptions, Vec2};
use image::{Rgba, RgbaImage};
use thiserror::Error;

use crate::io::{EncodedImage, encode_png};
use crate::ops::stroke::{DirtyRect, stamp_segment, union_rect};

/// Opaque white, the surface background.
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Largest physical edge the surface will allocate.
pub const MAX_PHYSICAL_EDGE: u32 = 8192;

// ============================================================================
// SURFACE DATA MODEL
// ============================================================================

/// A position in logical (layout-unit) surface coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Translate a raw input coordinate into surface space by removing the
    /// surface's on-screen offset.
    pub fn from_raw(raw_x: f32, raw_y: f32, offset_x: f32, offset_y: f32) -> Self {
        Self {
            x: raw_x - offset_x,
            y: raw_y - offset_y,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Round,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LineJoin {
    #[default]
    Round,
}

/// Live stroke styling. Changes only affect segments drawn afterwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    pub color: Rgba<u8>,
    /// Line width in logical pixels.
    pub width: f32,
    pub cap: LineCap,
    pub join: LineJoin,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: Rgba([0, 0, 0, 255]),
            width: 30.0,
            cap: LineCap::Round,
            join: LineJoin::Round,
        }
    }
}

/// Pointer gesture tracking. `last_point` is the open path position.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct GestureState {
    pub active: bool,
    pub last_point: Option<Point>,
}

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

// ============================================================================
// DRAWING SURFACE CONTROLLER
// ============================================================================

/// Owns the raster surface and the gesture state machine.
///
/// All drawing commands take logical coordinates; the controller scales them
/// by the density factor so the backing buffer stays crisp on high-density
/// displays. The backing buffer is always `logical × density` pixels.
pub struct DrawingSurface {
    logical_width: u32,
    logical_height: u32,
    /// Effective factor; below the requested one when the buffer was capped.
    density: f32,
    requested_density: f32,
    pixels: RgbaImage,
    style: StrokeStyle,
    gesture: GestureState,
    /// Bumped on every pixel mutation so views know when to re-upload.
    pub dirty_generation: u64,
    /// Union of regions touched since the last `take_dirty_rect`.
    dirty_rect: Option<DirtyRect>,
}

impl DrawingSurface {
    /// Create and initialize a surface with default stroke styling.
    pub fn new(logical_width: u32, logical_height: u32, density: f32) -> Self {
        let mut surface = Self {
            logical_width: 1,
            logical_height: 1,
            density: 1.0,
            requested_density: 1.0,
            pixels: RgbaImage::new(1, 1),
            style: StrokeStyle::default(),
            gesture: GestureState::default(),
            dirty_generation: 0,
            dirty_rect: None,
        };
        surface.initialize(logical_width, logical_height, density);
        surface
    }

    /// Allocate a `logical × density` backing buffer, fill it with the
    /// background and reset the gesture. Prior content is lost.
    pub fn initialize(&mut self, logical_width: u32, logical_height: u32, density: f32) {
        let requested = sanitize_density(density);
        self.logical_width = logical_width.max(1);
        self.logical_height = logical_height.max(1);
        self.requested_density = requested;
        let density = capped_density(self.logical_width, self.logical_height, requested);
        if density < requested {
            log::warn!(
                "density {:.2} exceeds the {}px buffer limit for {}x{}, using {:.3}",
                requested,
                MAX_PHYSICAL_EDGE,
                self.logical_width,
                self.logical_height,
                density
            );
        }
        self.density = density;
        let (pw, ph) = physical_dims(self.logical_width, self.logical_height, density);
        self.pixels = RgbaImage::from_pixel(pw, ph, BACKGROUND);
        self.style.cap = LineCap::Round;
        self.style.join = LineJoin::Round;
        self.gesture = GestureState::default();
        self.mark_dirty(Some((0, 0, pw, ph)));
        log::debug!(
            "surface initialized: {}x{} logical @ {:.2} -> {}x{} physical",
            self.logical_width,
            self.logical_height,
            density,
            pw,
            ph
        );
    }

    /// Open a new path at `point`. Re-arms an already active gesture.
    pub fn begin_stroke(&mut self, point: Point) {
        self.gesture.active = true;
        self.gesture.last_point = Some(point);
    }

    /// Draw a segment from the open path position to `point` and re-open the
    /// path there. Ignored while no gesture is active.
    pub fn extend_stroke(&mut self, point: Point) {
        if !self.gesture.active {
            return;
        }
        let Some(from) = self.gesture.last_point else {
            self.gesture.last_point = Some(point);
            return;
        };

        let d = self.density;
        let dirty = stamp_segment(
            &mut self.pixels,
            (from.x * d, from.y * d),
            (point.x * d, point.y * d),
            self.style.width * d * 0.5,
            self.style.color,
        );
        if dirty.is_some() {
            self.mark_dirty(dirty);
        }
        self.gesture.last_point = Some(point);
    }

    /// Finish the gesture. Segments are committed as they are drawn, so this
    /// only closes the path.
    pub fn end_stroke(&mut self) {
        if !self.gesture.active {
            return;
        }
        self.gesture = GestureState::default();
    }

    /// The pointer left the surface mid-gesture.
    pub fn pointer_leave(&mut self) {
        self.end_stroke();
    }

    pub fn set_stroke_color(&mut self, color: Rgba<u8>) {
        self.style.color = color;
    }

    /// Set the line width in logical pixels. Non-positive or non-finite
    /// widths are ignored.
    pub fn set_stroke_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.style.width = width;
        } else {
            log::warn!("ignoring invalid stroke width {}", width);
        }
    }

    /// Restore the background without reallocating. The stroke style is kept.
    pub fn clear(&mut self) {
        for p in self.pixels.pixels_mut() {
            *p = BACKGROUND;
        }
        self.style.cap = LineCap::Round;
        self.style.join = LineJoin::Round;
        self.gesture = GestureState::default();
        let (pw, ph) = self.pixels.dimensions();
        self.mark_dirty(Some((0, 0, pw, ph)));
    }

    /// Adopt a new density factor. A change re-initializes the surface at the
    /// same logical size, discarding the drawing.
    pub fn set_density(&mut self, density: f32) {
        let density = sanitize_density(density);
        if (density - self.requested_density).abs() > f32::EPSILON {
            log::info!(
                "density changed {:.2} -> {:.2}, resetting surface",
                self.requested_density,
                density
            );
            self.initialize(self.logical_width, self.logical_height, density);
        }
    }

    /// Snapshot the full physical raster as a PNG.
    pub fn export_image(&self) -> Result<EncodedImage, CanvasError> {
        let png = encode_png(&self.pixels)?;
        Ok(EncodedImage {
            width: self.pixels.width(),
            height: self.pixels.height(),
            png,
        })
    }

    // ---- accessors ----------------------------------------------------------

    pub fn logical_size(&self) -> (u32, u32) {
        (self.logical_width, self.logical_height)
    }

    pub fn physical_size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn density(&self) -> f32 {
        self.density
    }

    pub fn style(&self) -> &StrokeStyle {
        &self.style
    }

    pub fn gesture(&self) -> &GestureState {
        &self.gesture
    }

    pub fn is_active(&self) -> bool {
        self.gesture.active
    }

    /// Read-only view of the backing buffer.
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// True when no pixel differs from the background.
    pub fn is_blank(&self) -> bool {
        self.pixels.pixels().all(|p| *p == BACKGROUND)
    }

    /// Return and reset the region touched since the last call.
    pub fn take_dirty_rect(&mut self) -> Option<DirtyRect> {
        self.dirty_rect.take()
    }

    fn mark_dirty(&mut self, rect: Option<DirtyRect>) {
        self.dirty_rect = union_rect(self.dirty_rect, rect);
        self.dirty_generation = self.dirty_generation.wrapping_add(1);
    }
}

fn sanitize_density(density: f32) -> f32 {
    if density.is_finite() && density > 0.0 {
        density
    } else {
        1.0
    }
}

/// Largest density not above `requested` whose buffer fits the edge limit.
fn capped_density(logical_width: u32, logical_height: u32, requested: f32) -> f32 {
    let longest = logical_width.max(logical_height) as f32;
    requested.min(MAX_PHYSICAL_EDGE as f32 / longest)
}

fn physical_dims(logical_width: u32, logical_height: u32, density: f32) -> (u32, u32) {
    let scale = |v: u32| ((v as f32 * density).round() as u32).clamp(1, MAX_PHYSICAL_EDGE);
    (scale(logical_width), scale(logical_height))
}

// ============================================================================
// CANVAS VIEW — egui widget that feeds pointer input to the controller
// ============================================================================

/// What happened on the pad during one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CanvasResponse {
    pub stroke_started: bool,
    pub stroke_ended: bool,
    pub hovered: bool,
}

/// Primary-button pointer state sampled once per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerFrame {
    pub pos: Option<Pos2>,
    pub pressed: bool,
    pub down: bool,
    pub released: bool,
}

/// Feed one frame of pointer state to `surface`, with `rect` the pad's
/// on-screen area.
///
/// A press inside the pad begins a stroke, dragging inside extends it, and
/// dragging out of the pad or losing the pointer ends it as a leave. Release
/// ends it.
pub fn route_pointer(surface: &mut DrawingSurface, rect: Rect, frame: PointerFrame) -> CanvasResponse {
    let mut out = CanvasResponse::default();
    let to_point = |p: Pos2| Point::from_raw(p.x, p.y, rect.min.x, rect.min.y);

    let Some(pos) = frame.pos else {
        if surface.is_active() {
            // Touch lifted or pointer left the window
            surface.pointer_leave();
            out.stroke_ended = true;
        }
        return out;
    };

    let inside = rect.contains(pos);
    if frame.pressed && inside {
        surface.begin_stroke(to_point(pos));
        out.stroke_started = true;
    } else if frame.down && surface.is_active() {
        if inside {
            surface.extend_stroke(to_point(pos));
        } else {
            surface.pointer_leave();
            out.stroke_ended = true;
        }
    }
    if frame.released && surface.is_active() {
        surface.end_stroke();
        out.stroke_ended = true;
    }
    out
}

/// Displays a [`DrawingSurface`] and translates pointer events into
/// controller calls.
pub struct Canvas {
    texture: Option<egui::TextureHandle>,
    uploaded_generation: u64,
    border: Color32,
    /// Fixed density factor; `None` follows the display's pixels-per-point.
    pub density_override: Option<f32>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Canvas {
    pub fn new(density_override: Option<f32>) -> Self {
        Self {
            texture: None,
            uploaded_generation: u64::MAX,
            border: Color32::from_gray(170),
            density_override,
        }
    }

    pub fn show(&mut self, ui: &mut egui::Ui, surface: &mut DrawingSurface) -> CanvasResponse {
        // Keep the backing buffer matched to the display density
        let density = self
            .density_override
            .unwrap_or_else(|| ui.ctx().pixels_per_point());
        surface.set_density(density);

        let (lw, lh) = surface.logical_size();
        let (response, painter) =
            ui.allocate_painter(Vec2::new(lw as f32, lh as f32), Sense::click_and_drag());
        let rect = response.rect;

        let frame = ui.input(|i| PointerFrame {
            pos: i.pointer.interact_pos(),
            pressed: i.pointer.primary_pressed(),
            down: i.pointer.primary_down(),
            released: i.pointer.primary_released(),
        });
        let mut out = route_pointer(surface, rect, frame);
        out.hovered = response.hovered();

        self.upload(ui.ctx(), surface);
        if let Some(tex) = &self.texture {
            painter.image(
                tex.id(),
                rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        }
        painter.rect_stroke(rect, 4.0, egui::Stroke::new(1.5, self.border));

        if surface.is_active() {
            ui.ctx().request_repaint();
        }
        out
    }

    fn upload(&mut self, ctx: &egui::Context, surface: &mut DrawingSurface) {
        if self.texture.is_some() && self.uploaded_generation == surface.dirty_generation {
            return;
        }
        let dirty = surface.take_dirty_rect();
        let pixels = surface.pixels();
        let (w, h) = pixels.dimensions();

        // Partial upload when only a stroke region changed and the size held
        if let (Some(tex), Some((x, y, rw, rh))) = (&mut self.texture, dirty)
            && tex.size() == [w as usize, h as usize]
            && (rw < w || rh < h)
        {
            let region = image::imageops::crop_imm(pixels, x, y, rw, rh).to_image();
            let patch =
                ColorImage::from_rgba_unmultiplied([rw as usize, rh as usize], region.as_raw());
            tex.set_partial([x as usize, y as usize], patch, TextureOptions::LINEAR);
            self.uploaded_generation = surface.dirty_generation;
            return;
        }

        let image = ColorImage::from_rgba_unmultiplied([w as usize, h as usize], pixels.as_raw());
        match &mut self.texture {
            Some(tex) => tex.set(image, TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("digit_pad", image, TextureOptions::LINEAR));
            }
        }
        self.uploaded_generation = surface.dirty_generation;
    }
}
