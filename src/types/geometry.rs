//! Region-of-interest geometry attached to interpretations.

use serde::{Deserialize, Serialize};

use super::ids::ArtefactId;

/// A point in image or artefact coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whether both coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A simple polygon stored as an open ring (the closing vertex is implicit).
///
/// Only shapes that passed a [`crate::roi::ShapeValidator`] should be stored
/// on interpretations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    /// Vertices in drawing order.
    pub vertices: Vec<Point>,
}

impl Polygon {
    /// Wrap a vertex list.
    pub fn new(vertices: Vec<Point>) -> Self {
        Self { vertices }
    }

    /// Axis-aligned rectangle with its top-left corner at `(x, y)`.
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(vec![
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y + height),
            Point::new(x, y + height),
        ])
    }

    /// Bounding box of the vertices, `None` when empty.
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::of(&self.vertices)
    }
}

/// A region of interest: a shape on an artefact plus its placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretationRoi {
    /// Artefact the shape is drawn on.
    pub artefact_id: ArtefactId,
    /// Shape in ROI-local coordinates.
    pub shape: Polygon,
    /// Offset of the shape on the artefact.
    #[serde(default)]
    pub translate: Point,
    /// Rotation in degrees, clockwise.
    #[serde(default)]
    pub rotation: f64,
}

impl InterpretationRoi {
    /// ROI without translation or rotation.
    pub fn new(artefact_id: ArtefactId, shape: Polygon) -> Self {
        Self {
            artefact_id,
            shape,
            translate: Point::default(),
            rotation: 0.0,
        }
    }

    /// Set the translation.
    pub fn translated(mut self, x: f64, y: f64) -> Self {
        self.translate = Point::new(x, y);
        self
    }

    /// Set the rotation in degrees.
    pub fn rotated(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }
}

/// Placement parameters of an artefact on its image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArtefactGeometry {
    /// Artefact the geometry belongs to.
    pub artefact_id: ArtefactId,
    /// Reference midpoint that ROI rotation pivots around.
    pub midpoint: Point,
    /// Uniform scale from ROI units to artefact units.
    pub scale: f64,
}

impl ArtefactGeometry {
    /// Geometry with unit scale.
    pub fn new(artefact_id: ArtefactId, midpoint: Point) -> Self {
        Self {
            artefact_id,
            midpoint,
            scale: 1.0,
        }
    }

    /// Set the scale.
    pub fn scaled(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Point,
    /// Maximum corner.
    pub max: Point,
}

impl BoundingBox {
    /// Bounding box of a point set, `None` when empty.
    pub fn of(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in &points[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some(Self { min, max })
    }

    /// Width of the box.
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Height of the box.
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// An ROI polygon in absolute artefact coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedShape {
    /// Artefact the shape is placed on.
    pub artefact_id: ArtefactId,
    /// Placed vertices.
    pub polygon: Polygon,
    /// Bounding box of the placed vertices.
    pub bounds: BoundingBox,
}
