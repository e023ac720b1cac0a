//! ROI placement and shape validation.
//!
//! [`RoiTransform::place`] turns an ROI stored on an interpretation into an
//! absolute polygon on its artefact. Shapes arrive from clients as WKT and
//! pass through a [`ShapeValidator`] before they are stored.

use regex_lite::Regex;
use std::sync::OnceLock;

use crate::types::{ArtefactGeometry, ArtefactId, InterpretationRoi, PlacedShape, Point, Polygon};

/// Error type for geometry operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// Malformed numeric input or an unusable shape.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    /// The ROI is drawn on a different artefact.
    #[error("ROI belongs to {roi}, geometry to {artefact}")]
    ArtefactMismatch {
        /// Artefact of the ROI.
        roi: ArtefactId,
        /// Artefact of the geometry.
        artefact: ArtefactId,
    },
}

fn invalid(reason: impl Into<String>) -> GeometryError {
    GeometryError::InvalidGeometry(reason.into())
}

/// Places ROIs on artefacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoiTransform;

impl RoiTransform {
    /// Rotate the ROI shape about the artefact midpoint, translate it, then
    /// scale it into artefact coordinates.
    ///
    /// Rotation is in degrees, clockwise in image coordinates (y grows down).
    pub fn place(roi: &InterpretationRoi, artefact: &ArtefactGeometry) -> Result<PlacedShape, GeometryError> {
        if roi.artefact_id != artefact.artefact_id {
            return Err(GeometryError::ArtefactMismatch {
                roi: roi.artefact_id,
                artefact: artefact.artefact_id,
            });
        }
        if !roi.rotation.is_finite() {
            return Err(invalid("rotation is not finite"));
        }
        if !roi.translate.is_finite() {
            return Err(invalid("translation is not finite"));
        }
        if !artefact.midpoint.is_finite() {
            return Err(invalid("artefact midpoint is not finite"));
        }
        if !artefact.scale.is_finite() || artefact.scale <= 0.0 {
            return Err(invalid(format!("scale {} is not a positive number", artefact.scale)));
        }
        if roi.shape.vertices.is_empty() {
            return Err(invalid("shape has no vertices"));
        }

        let (sin, cos) = roi.rotation.to_radians().sin_cos();
        let pivot = artefact.midpoint;
        let vertices = roi
            .shape
            .vertices
            .iter()
            .map(|v| {
                if !v.is_finite() {
                    return Err(invalid(format!("vertex ({}, {}) is not finite", v.x, v.y)));
                }
                let (dx, dy) = (v.x - pivot.x, v.y - pivot.y);
                let rotated = Point::new(pivot.x + dx * cos - dy * sin, pivot.y + dx * sin + dy * cos);
                Ok(Point::new(
                    (rotated.x + roi.translate.x) * artefact.scale,
                    (rotated.y + roi.translate.y) * artefact.scale,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let polygon = Polygon::new(vertices);
        let bounds = polygon.bounds().ok_or_else(|| invalid("shape has no vertices"))?;
        Ok(PlacedShape {
            artefact_id: artefact.artefact_id,
            polygon,
            bounds,
        })
    }
}

/// Normalizes and validates client-supplied polygons.
pub trait ShapeValidator: Send + Sync {
    /// Return the normalized shape or a descriptive error.
    fn validate(&self, polygon: &Polygon) -> Result<Polygon, GeometryError>;

    /// Parse WKT and validate the result.
    fn validate_wkt(&self, wkt: &str) -> Result<Polygon, GeometryError> {
        self.validate(&parse_wkt_polygon(wkt)?)
    }
}

/// Validator for simple polygons without holes.
///
/// Requires finite coordinates, at least three distinct vertices and a
/// non-zero area. Drops the closing vertex and consecutive duplicates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleShapeValidator;

impl ShapeValidator for SimpleShapeValidator {
    fn validate(&self, polygon: &Polygon) -> Result<Polygon, GeometryError> {
        let mut vertices: Vec<Point> = Vec::with_capacity(polygon.vertices.len());
        for v in &polygon.vertices {
            if !v.is_finite() {
                return Err(invalid(format!("vertex ({}, {}) is not finite", v.x, v.y)));
            }
            if vertices.last() != Some(v) {
                vertices.push(*v);
            }
        }
        while vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.len() < 3 {
            return Err(invalid(format!("{} distinct vertices, need at least 3", vertices.len())));
        }
        if signed_area(&vertices).abs() <= f64::EPSILON {
            return Err(invalid("shape has zero area"));
        }
        Ok(Polygon::new(vertices))
    }
}

/// Shoelace area; positive for counter-clockwise rings in y-up coordinates.
fn signed_area(vertices: &[Point]) -> f64 {
    let n = vertices.len();
    (0..n)
        .map(|i| {
            let (a, b) = (vertices[i], vertices[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.0
}

fn polygon_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Constant pattern; compiling it cannot fail.
        Regex::new(r"(?i)^\s*POLYGON\s*\(\s*(.*?)\s*\)\s*$").expect("WKT polygon pattern")
    })
}

fn ring_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\(([^()]*)\)").expect("WKT ring pattern"))
}

/// Parse a WKT `POLYGON((x y, ...))` with a single exterior ring.
pub fn parse_wkt_polygon(wkt: &str) -> Result<Polygon, GeometryError> {
    let body = polygon_pattern()
        .captures(wkt)
        .and_then(|c| c.get(1))
        .ok_or_else(|| invalid("expected POLYGON((x y, ...))"))?
        .as_str();

    let rings: Vec<&str> = ring_pattern()
        .captures_iter(body)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let ring = match rings.as_slice() {
        [] => return Err(invalid("polygon has no ring")),
        [ring] => *ring,
        _ => return Err(invalid("polygons with holes are not supported")),
    };

    let vertices = ring
        .split(',')
        .map(|pair| {
            let mut coords = pair.split_whitespace().map(str::parse::<f64>);
            match (coords.next(), coords.next(), coords.next()) {
                (Some(Ok(x)), Some(Ok(y)), None) => Ok(Point::new(x, y)),
                _ => Err(invalid(format!("bad coordinate pair '{}'", pair.trim()))),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(vertices))
}

/// Format a polygon as closed-ring WKT.
pub fn to_wkt(polygon: &Polygon) -> String {
    let mut coords: Vec<String> = polygon
        .vertices
        .iter()
        .map(|p| format!("{} {}", p.x, p.y))
        .collect();
    if let Some(first) = coords.first().cloned() {
        coords.push(first);
    }
    format!("POLYGON(({}))", coords.join(","))
}
