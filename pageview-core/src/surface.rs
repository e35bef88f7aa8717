//! The drawing-surface capability every draw call goes through.
//!
//! [`DrawingSurface`] mirrors the small subset of a 2D canvas context the
//! engine needs: state save/restore, affine transforms, fills, strokes, text,
//! bitmaps and point-in-path queries. Coordinates are in the surface's current
//! user space, i.e. after whatever transforms are active.
//!
//! [`RecordingSurface`] implements the trait as a display list so frames can be
//! inspected in tests or serialized by a host.

use std::f64::consts::TAU;

use serde::Serialize;

use crate::geometry::{winding_number, Bounds, SurfacePoint, SurfaceSpace};
use crate::loader::Bitmap;

/// Segments used when flattening a full circle for hit-testing.
const ARC_SEGMENTS: usize = 64;

/// Font size assumed when a font string carries no `px` size.
const FALLBACK_FONT_PX: f64 = 10.0;

/// Average glyph advance relative to the font size, used by
/// [`RecordingSurface::measure_text`].
const GLYPH_ADVANCE: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PathCommand {
    MoveTo { x: f64, y: f64 },
    LineTo { x: f64, y: f64 },
    Arc { x: f64, y: f64, radius: f64, start: f64, end: f64 },
    Close,
}

/// A reusable path, the equivalent of a canvas `Path2D`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Path {
    commands: Vec<PathCommand>,
}

impl Path {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed polygon through `points`: move to the first, line to the rest.
    #[must_use]
    pub fn polygon(points: &[SurfacePoint]) -> Self {
        let mut path = Self::new();
        for (index, point) in points.iter().enumerate() {
            if index == 0 {
                path.move_to(point.x, point.y);
            } else {
                path.line_to(point.x, point.y);
            }
        }
        path.close_path();
        path
    }

    #[must_use]
    pub fn circle(center: SurfacePoint, radius: f64) -> Self {
        let mut path = Self::new();
        path.arc(center.x, center.y, radius, 0.0, TAU);
        path.close_path();
        path
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.commands.push(PathCommand::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.commands.push(PathCommand::LineTo { x, y });
    }

    /// Clockwise arc from `start` to `end` radians.
    pub fn arc(&mut self, x: f64, y: f64, radius: f64, start: f64, end: f64) {
        self.commands.push(PathCommand::Arc { x, y, radius, start, end });
    }

    pub fn close_path(&mut self) {
        self.commands.push(PathCommand::Close);
    }

    #[must_use]
    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Flatten into closed polygons, one per subpath.
    fn subpaths(&self) -> Vec<Vec<SurfacePoint>> {
        let mut finished = Vec::new();
        let mut current: Vec<SurfacePoint> = Vec::new();

        for command in &self.commands {
            match *command {
                PathCommand::MoveTo { x, y } => {
                    if current.len() > 1 {
                        finished.push(std::mem::take(&mut current));
                    }
                    current.clear();
                    current.push(SurfacePoint::new(x, y));
                }
                PathCommand::LineTo { x, y } => current.push(SurfacePoint::new(x, y)),
                PathCommand::Arc { x, y, radius, start, end } => {
                    let sweep = end - start;
                    let steps = ((sweep.abs() / TAU) * ARC_SEGMENTS as f64).ceil().max(1.0) as usize;
                    for step in 0..=steps {
                        let angle = start + sweep * (step as f64 / steps as f64);
                        let (sin, cos) = angle.sin_cos();
                        current.push(SurfacePoint::new(x + radius * cos, y + radius * sin));
                    }
                }
                PathCommand::Close => {
                    if current.len() > 1 {
                        let start = current[0];
                        finished.push(std::mem::take(&mut current));
                        current.push(start);
                    }
                }
            }
        }
        if current.len() > 1 {
            finished.push(current);
        }
        finished
    }

    /// Axis-aligned box around the flattened path.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds<SurfaceSpace>> {
        let points: Vec<SurfacePoint> = self.subpaths().into_iter().flatten().collect();
        Bounds::from_points(&points)
    }

    /// Non-zero fill-rule containment of `(x, y)`.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let point = SurfacePoint::new(x, y);
        let subpaths = self.subpaths();
        let points: Vec<SurfacePoint> = subpaths.iter().flatten().copied().collect();
        match Bounds::from_points(&points) {
            Some(bounds) if bounds.contains(point) => {}
            _ => return false,
        }
        let winding: i32 = subpaths
            .iter()
            .map(|polygon| winding_number(polygon, point))
            .sum();
        winding != 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStyle {
    /// CSS-style font shorthand, e.g. `"25px Verdana"`.
    pub font: String,
    pub fill: String,
    pub align: TextAlign,
}

/// Narrow 2D drawing capability used by the render pipeline and overlays.
pub trait DrawingSurface {
    fn save(&mut self);
    fn restore(&mut self);

    fn translate(&mut self, dx: f64, dy: f64);
    fn rotate(&mut self, radians: f64);
    fn scale(&mut self, sx: f64, sy: f64);
    fn set_global_alpha(&mut self, alpha: f64);

    fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64);
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, style: &str);
    fn fill_path(&mut self, path: &Path, style: &str);
    fn stroke_path(&mut self, path: &Path, style: &str, line_width: f64);

    fn fill_text(&mut self, text: &str, x: f64, y: f64, style: &TextStyle);
    fn measure_text(&self, text: &str, font: &str) -> f64;

    /// Draw `bitmap` with its top-left corner at `(x, y)`.
    fn draw_bitmap(&mut self, bitmap: &Bitmap, x: f64, y: f64);

    fn is_point_in_path(&self, path: &Path, x: f64, y: f64) -> bool {
        path.contains(x, y)
    }
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DrawCommand {
    Save,
    Restore,
    Translate { dx: f64, dy: f64 },
    Rotate { radians: f64 },
    Scale { sx: f64, sy: f64 },
    GlobalAlpha { alpha: f64 },
    ClearRect { x: f64, y: f64, width: f64, height: f64 },
    FillRect { x: f64, y: f64, width: f64, height: f64, style: String },
    FillPath { path: Path, style: String },
    StrokePath { path: Path, style: String, line_width: f64 },
    FillText { text: String, x: f64, y: f64, style: TextStyle },
    DrawBitmap { x: f64, y: f64, width: u32, height: u32 },
}

/// A [`DrawingSurface`] that records a display list instead of drawing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordingSurface {
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Drain the display list, leaving the surface empty for the next frame.
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.commands)
    }
}

/// Pixel size at the front of a font shorthand such as `"12px serif"`.
fn font_px(font: &str) -> f64 {
    font.split_whitespace()
        .find_map(|token| token.strip_suffix("px").and_then(|n| n.parse::<f64>().ok()))
        .unwrap_or(FALLBACK_FONT_PX)
}

impl DrawingSurface for RecordingSurface {
    fn save(&mut self) {
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        self.commands.push(DrawCommand::Restore);
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.commands.push(DrawCommand::Translate { dx, dy });
    }

    fn rotate(&mut self, radians: f64) {
        self.commands.push(DrawCommand::Rotate { radians });
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        self.commands.push(DrawCommand::Scale { sx, sy });
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.commands.push(DrawCommand::GlobalAlpha { alpha });
    }

    fn clear_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.commands.push(DrawCommand::ClearRect { x, y, width, height });
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, style: &str) {
        self.commands.push(DrawCommand::FillRect {
            x,
            y,
            width,
            height,
            style: style.to_string(),
        });
    }

    fn fill_path(&mut self, path: &Path, style: &str) {
        self.commands.push(DrawCommand::FillPath {
            path: path.clone(),
            style: style.to_string(),
        });
    }

    fn stroke_path(&mut self, path: &Path, style: &str, line_width: f64) {
        self.commands.push(DrawCommand::StrokePath {
            path: path.clone(),
            style: style.to_string(),
            line_width,
        });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, style: &TextStyle) {
        self.commands.push(DrawCommand::FillText {
            text: text.to_string(),
            x,
            y,
            style: style.clone(),
        });
    }

    fn measure_text(&self, text: &str, font: &str) -> f64 {
        text.chars().count() as f64 * font_px(font) * GLYPH_ADVANCE
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, x: f64, y: f64) {
        self.commands.push(DrawCommand::DrawBitmap {
            x,
            y,
            width: bitmap.width(),
            height: bitmap.height(),
        });
    }
}
