use serde::{Deserialize, Serialize};

use crate::geometry::{
    normalize_angle, rotate_point, to_square_angle, Dimension, DocPoint, Size, SurfacePoint,
};

/// Viewport manages how the loaded resource is placed on the drawing surface.
///
/// `x`/`y` is the top-left anchor of the scaled resource in surface
/// coordinates and `width`/`height` its rendered extent, so that
/// `width == resource.width * scale` holds after every mutation below.
/// `rotation` is kept unrounded, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    pub rotation: f64,
    pub x: f64,
    pub y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            scale: 1.0,
            rotation: 0.0,
            x: 0.0,
            y: 0.0,
        }
    }
}

/// Zoom limits derived from the last fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleBounds {
    pub min: f64,
    pub max: f64,
}

impl ScaleBounds {
    #[must_use]
    pub fn clamp(&self, scale: f64) -> f64 {
        scale.clamp(self.min, self.max)
    }
}

impl Viewport {
    /// Ratio between the fitted scale and the zoom limits on either side.
    const ZOOM_RANGE: f64 = 4.0;

    /// Fit `resource` entirely inside `surface`, preserving aspect ratio.
    ///
    /// When the rotation snaps to 90 or 270 degrees the surface axes are
    /// swapped before choosing the limiting side. Centering always uses the
    /// real surface. Returns `None` without touching the viewport when either
    /// extent is empty.
    pub fn fit_to_surface(&mut self, resource: Size, surface: Dimension) -> Option<ScaleBounds> {
        if resource.is_empty() || surface.is_empty() {
            return None;
        }

        let inverted = (to_square_angle(self.rotation) / 90) % 2 != 0;
        let (fit_width, fit_height) = if inverted {
            (surface.height, surface.width)
        } else {
            (surface.width, surface.height)
        };

        self.scale = if (fit_height / resource.height) * resource.width <= fit_width {
            fit_height / resource.height
        } else {
            fit_width / resource.width
        };

        self.width = resource.width * self.scale;
        self.height = resource.height * self.scale;
        self.x = (surface.width - self.width) / 2.0;
        self.y = (surface.height - self.height) / 2.0;

        Some(ScaleBounds {
            min: self.scale / Self::ZOOM_RANGE,
            max: self.scale * Self::ZOOM_RANGE,
        })
    }

    /// Center of the rendered resource; the pivot for rotation.
    #[must_use]
    pub fn center(&self) -> SurfacePoint {
        SurfacePoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Rotation brought into `[0, 360)` for display.
    #[must_use]
    pub fn display_rotation(&self) -> f64 {
        normalize_angle(self.rotation)
    }

    /// Translation applied after scaling so the resource sits in its box.
    fn offset(&self, resource: Size) -> (f64, f64) {
        let center = self.center();
        (
            center.x - resource.width / 2.0 * self.scale,
            center.y - resource.height / 2.0 * self.scale,
        )
    }

    /// Project a document-space point onto the surface: scale, pan, then
    /// rotate about the viewport center.
    #[must_use]
    pub fn document_to_surface(&self, point: DocPoint, resource: Size) -> SurfacePoint {
        let (dx, dy) = self.offset(resource);
        let zoomed = SurfacePoint::new(point.x * self.scale + dx, point.y * self.scale + dy);
        rotate_point(zoomed, self.center(), self.rotation)
    }

    /// Inverse of [`Viewport::document_to_surface`]. `scale` must be positive.
    #[must_use]
    pub fn surface_to_document(&self, point: SurfacePoint, resource: Size) -> DocPoint {
        let unrotated = rotate_point(point, self.center(), -self.rotation);
        let (dx, dy) = self.offset(resource);
        DocPoint::new((unrotated.x - dx) / self.scale, (unrotated.y - dy) / self.scale)
    }

    /// Project a whole document-space polygon. Call once per frame.
    #[must_use]
    pub fn account_for_viewport(&self, polygon: &[DocPoint], resource: Size) -> Vec<SurfacePoint> {
        polygon
            .iter()
            .map(|&p| self.document_to_surface(p, resource))
            .collect()
    }

    /// Set the scale, clamped to `bounds`, keeping the viewport center fixed.
    /// Returns the scale actually applied.
    pub fn zoom_to(&mut self, scale: f64, resource: Size, bounds: ScaleBounds) -> f64 {
        let center = self.center();
        self.scale = bounds.clamp(scale);
        self.width = resource.width * self.scale;
        self.height = resource.height * self.scale;
        self.x = center.x - self.width / 2.0;
        self.y = center.y - self.height / 2.0;
        self.scale
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    pub fn set_rotation(&mut self, degrees: f64) {
        self.rotation = degrees;
    }

    pub fn rotate_by(&mut self, degrees: f64) {
        self.rotation += degrees;
    }
}
