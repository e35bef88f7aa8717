//! Coordinate-space tagged points and the pure geometry the viewer relies on.
//!
//! Every [`Point`] carries the space it lives in as a type parameter, so a
//! document-space polygon can never be handed to code that expects surface
//! coordinates. Crossing spaces is the job of [`crate::viewport::Viewport`].

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

/// Native, unscaled, unrotated coordinates of the loaded resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentSpace;

/// Coordinates of the drawing surface the user actually sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SurfaceSpace;

/// A point in the coordinate space `S`.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Point<S> {
    pub x: f64,
    pub y: f64,
    #[serde(skip)]
    space: PhantomData<S>,
}

// Manual impls keep the marker type free of trait bounds.
impl<S> Clone for Point<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Point<S> {}

impl<S> PartialEq for Point<S> {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl<S> fmt::Debug for Point<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Point").field("x", &self.x).field("y", &self.y).finish()
    }
}

pub type DocPoint = Point<DocumentSpace>;
pub type SurfacePoint = Point<SurfaceSpace>;

impl<S> Point<S> {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, space: PhantomData }
    }

    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Native (document-space) extent of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when either side is zero, negative or not a number.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Size of the drawing surface, supplied by the host per frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimension {
    pub width: f64,
    pub height: f64,
}

impl Dimension {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Axis-aligned bounding box in space `S`.
#[derive(Debug)]
pub struct Bounds<S> {
    pub min: Point<S>,
    pub max: Point<S>,
}

impl<S> Clone for Bounds<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Bounds<S> {}

impl<S> Bounds<S> {
    /// Smallest box containing every point, or `None` for an empty slice.
    #[must_use]
    pub fn from_points(points: &[Point<S>]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut min = *first;
        let mut max = *first;
        for p in rest {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some(Self { min, max })
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[must_use]
    pub fn center(&self) -> Point<S> {
        Point::new((self.min.x + self.max.x) / 2.0, (self.min.y + self.max.y) / 2.0)
    }

    /// Inclusive containment test.
    #[must_use]
    pub fn contains(&self, p: Point<S>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Rotate `point` about `pivot` by `degrees`.
///
/// Positive angles turn clockwise on a y-down surface, matching the canvas
/// `rotate` convention the render pipeline uses.
#[must_use]
pub fn rotate_point<S>(point: Point<S>, pivot: Point<S>, degrees: f64) -> Point<S> {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let dx = point.x - pivot.x;
    let dy = point.y - pivot.y;
    Point::new(pivot.x + cos * dx - sin * dy, pivot.y + sin * dx + cos * dy)
}

/// Bring any angle into `[0, 360)`.
#[must_use]
pub fn normalize_angle(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs due to rounding.
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Snap a rotation to its right-angle bucket: one of 0, 90, 180 or 270.
///
/// The quarter-turn count is truncated towards zero and bumped by one when the
/// truncated remainder exceeds 45 degrees; the bucket is then taken modulo 4
/// with a non-negative result.
#[must_use]
pub fn to_square_angle(angle: f64) -> u16 {
    let quarter_turns = (angle / 90.0).trunc() as i64;
    let round_up = (angle % 90.0).trunc() > 45.0;
    let bucket = (quarter_turns + i64::from(round_up)).rem_euclid(4);
    (bucket * 90) as u16
}

/// Vertex average of a polygon.
#[must_use]
pub fn centroid<S>(points: &[Point<S>]) -> Option<Point<S>> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

/// Winding number of `polygon` (implicitly closed) around `p`.
///
/// Non-zero means `p` is inside under the non-zero fill rule.
#[must_use]
pub fn winding_number<S>(polygon: &[Point<S>], p: Point<S>) -> i32 {
    if polygon.len() < 3 {
        return 0;
    }
    let mut winding = 0;
    for (i, a) in polygon.iter().enumerate() {
        let b = polygon[(i + 1) % polygon.len()];
        let side = (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y);
        if a.y <= p.y {
            if b.y > p.y && side > 0.0 {
                winding += 1;
            }
        } else if b.y <= p.y && side < 0.0 {
            winding -= 1;
        }
    }
    winding
}
