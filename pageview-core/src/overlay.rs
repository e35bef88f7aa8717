//! Interactive overlay regions ("buttons") drawn on top of the resource.
//!
//! A region remembers the last shape it was painted as, in surface space, and
//! hit-tests against exactly that shape. User-defined buttons keep their
//! anchor in document space and are re-projected through the viewport on
//! every frame.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ButtonStyle;
use crate::geometry::{DocPoint, Size, SurfacePoint};
use crate::surface::{DrawingSurface, Path, TextAlign, TextStyle};
use crate::viewport::Viewport;

/// Hover state: a fixed flag or a predicate evaluated on every paint.
pub enum Hover {
    Flag(bool),
    Predicate(Box<dyn Fn() -> bool>),
}

impl Default for Hover {
    fn default() -> Self {
        Self::Flag(false)
    }
}

impl Hover {
    #[must_use]
    pub fn is_active(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            Self::Predicate(predicate) => predicate(),
        }
    }
}

impl fmt::Debug for Hover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(flag) => f.debug_tuple("Flag").field(flag).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Pointer input delivered to button handlers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub position: SurfacePoint,
    /// The same position in document space, when a resource is loaded.
    pub document: Option<DocPoint>,
}

/// Returns `true` when the event is consumed and must not propagate.
pub type ButtonHandler = Box<dyn FnMut(&PointerEvent) -> bool>;

/// Declarative part of a button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ButtonConfig {
    pub sort_id: i32,
    pub show: bool,
    pub icon: Option<String>,
    pub tooltip: Option<String>,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            sort_id: 0,
            show: true,
            icon: None,
            tooltip: None,
        }
    }
}

/// Shape recorded by the most recent paint.
#[derive(Debug, Clone, PartialEq)]
enum DrawnShape {
    None,
    Circle { center: SurfacePoint, radius: f64 },
    Polygon(Path),
}

pub struct OverlayRegion {
    pub sort_id: i32,
    pub icon: Option<String>,
    pub tooltip: Option<String>,
    pub hover: Hover,
    pub display: bool,
    style: ButtonStyle,
    shape: DrawnShape,
    on_click: Option<ButtonHandler>,
    on_mouse_down: Option<ButtonHandler>,
}

impl fmt::Debug for OverlayRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayRegion")
            .field("sort_id", &self.sort_id)
            .field("icon", &self.icon)
            .field("tooltip", &self.tooltip)
            .field("hover", &self.hover)
            .field("display", &self.display)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl OverlayRegion {
    #[must_use]
    pub fn new(config: ButtonConfig, style: ButtonStyle) -> Self {
        Self {
            sort_id: config.sort_id,
            icon: config.icon,
            tooltip: config.tooltip,
            hover: Hover::default(),
            display: config.show,
            style,
            shape: DrawnShape::None,
            on_click: None,
            on_mouse_down: None,
        }
    }

    pub fn set_on_click(&mut self, handler: ButtonHandler) {
        self.on_click = Some(handler);
    }

    pub fn set_on_mouse_down(&mut self, handler: ButtonHandler) {
        self.on_mouse_down = Some(handler);
    }

    /// Paint as a circle and make it the hit-test shape.
    pub fn draw_as_circle(&mut self, surface: &mut dyn DrawingSurface, center: SurfacePoint, radius: f64) {
        self.shape = DrawnShape::Circle { center, radius };

        surface.save();
        surface.set_global_alpha(self.style.fill_alpha(self.hover.is_active()));

        let path = Path::circle(center, radius);
        self.fill_and_stroke(surface, &path);

        if let Some(icon) = &self.icon {
            surface.save();
            draw_icon_font(surface, &self.style, icon, center, radius);
            surface.restore();
        }

        surface.restore();
    }

    /// Paint as a closed polygon and make it the hit-test shape.
    pub fn draw_as_polygon(&mut self, surface: &mut dyn DrawingSurface, points: &[SurfacePoint]) {
        let path = Path::polygon(points);

        surface.save();
        surface.set_global_alpha(self.style.fill_alpha(self.hover.is_active()));
        self.fill_and_stroke(surface, &path);
        surface.restore();

        self.shape = DrawnShape::Polygon(path);
    }

    fn fill_and_stroke(&self, surface: &mut dyn DrawingSurface, path: &Path) {
        surface.fill_path(path, &self.style.bg_style);
        if self.style.border_width > 0.0 {
            surface.stroke_path(path, &self.style.border_style, self.style.border_width);
        }
    }

    /// Forget the painted shape; the region stops taking hits until redrawn.
    pub fn clear_shape(&mut self) {
        self.shape = DrawnShape::None;
    }

    /// Whether the surface point `(x, y)` falls on the last painted shape.
    #[must_use]
    pub fn is_within_bounds(&self, surface: &dyn DrawingSurface, x: f64, y: f64) -> bool {
        match &self.shape {
            DrawnShape::Polygon(path) => surface.is_point_in_path(path, x, y),
            DrawnShape::Circle { center, radius } => {
                center.distance_squared(SurfacePoint::new(x, y)) <= radius * radius
            }
            DrawnShape::None => false,
        }
    }

    /// Project a document-space polygon onto the surface for this frame.
    #[must_use]
    pub fn account_for_viewport(&self, polygon: &[DocPoint], viewport: &Viewport, resource: Size) -> Vec<SurfacePoint> {
        viewport.account_for_viewport(polygon, resource)
    }

    pub fn on_click(&mut self, event: &PointerEvent) -> bool {
        match self.on_click.as_mut() {
            Some(handler) => handler(event),
            None => {
                warn!(sort_id = self.sort_id, "no click action set for overlay button");
                true
            }
        }
    }

    pub fn on_mouse_down(&mut self, event: &PointerEvent) -> bool {
        self.on_mouse_down.as_mut().map_or(false, |handler| handler(event))
    }
}

/// Icon glyph centered on `center`, `size` pixels tall.
fn draw_icon_font(surface: &mut dyn DrawingSurface, style: &ButtonStyle, icon: &str, center: SurfacePoint, size: f64) {
    let font = format!("{size}px {}", style.icon_font_family);
    let width = surface.measure_text(icon, &font);
    let text_style = TextStyle {
        font,
        fill: style.icon_style.clone(),
        align: TextAlign::Left,
    };
    surface.fill_text(icon, center.x - width / 2.0, center.y + size / 2.0, &text_style);
}

/// Where a user-defined button is anchored, in document space.
#[derive(Debug, Clone, PartialEq)]
pub enum ButtonAnchor {
    Polygon(Vec<DocPoint>),
    /// `radius` is in document units and scales with the viewport.
    Circle { center: DocPoint, radius: f64 },
}

/// A button pinned to the resource.
#[derive(Debug)]
pub struct UserDefinedButton {
    pub anchor: ButtonAnchor,
    pub region: OverlayRegion,
}

impl UserDefinedButton {
    #[must_use]
    pub fn new(anchor: ButtonAnchor, region: OverlayRegion) -> Self {
        Self { anchor, region }
    }

    /// Re-project the anchor through `viewport` and paint it.
    pub fn draw(&mut self, surface: &mut dyn DrawingSurface, viewport: &Viewport, resource: Size) {
        match &self.anchor {
            ButtonAnchor::Polygon(polygon) => {
                let projected = self.region.account_for_viewport(polygon, viewport, resource);
                self.region.draw_as_polygon(surface, &projected);
            }
            ButtonAnchor::Circle { center, radius } => {
                let projected = viewport.document_to_surface(*center, resource);
                self.region.draw_as_circle(surface, projected, radius * viewport.scale);
            }
        }
    }
}
