use serde::{Deserialize, Serialize};

use super::errors::GeometryError;
use super::wkt::{points_to_wkt_polygon, Point};

/// Render the canonical footprint JSON for a bounding box. The ring is
/// closed, starts at (minX, minY) and runs counter-clockwise. Callers
/// pass the numeric literals as strings and they are emitted verbatim,
/// so the same box always produces the same bytes.
pub fn footprint_to_json(min_x: &str, min_y: &str, max_x: &str, max_y: &str, srid: &str) -> String {
    format!(
        "{{\"points\":[[{mnx},{mny}],[{mxx},{mny}],[{mxx},{mxy}],[{mnx},{mxy}],[{mnx},{mny}]],\"coordinate_system\":\"{srid}\"}}",
        mnx = min_x,
        mny = min_y,
        mxx = max_x,
        mxy = max_y,
        srid = srid,
    )
}

/// A polygon footprint as carried across the system boundary:
/// a point ring plus the spatial reference id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub points: Vec<[f64; 2]>,
    pub coordinate_system: String,
}

impl Footprint {
    /// Parse a footprint from its JSON text form.
    pub fn from_json_str(input: &str) -> Result<Self, GeometryError> {
        serde_json::from_str(input).map_err(|e| GeometryError::MalformedFootprint(e.to_string()))
    }

    /// Parse a footprint out of an extended-data value. The polygon
    /// travels as a JSON string; a directly embedded object is accepted
    /// too since some callers skip the double encoding.
    pub fn from_extended_value(value: &serde_json::Value) -> Result<Self, GeometryError> {
        match value {
            serde_json::Value::String(s) => Self::from_json_str(s),
            serde_json::Value::Object(_) => serde_json::from_value(value.clone())
                .map_err(|e| GeometryError::MalformedFootprint(e.to_string())),
            other => Err(GeometryError::MalformedFootprint(format!(
                "expected a JSON string or object, got {}",
                other
            ))),
        }
    }

    /// WKT text of the ring, for live spatial predicates.
    pub fn to_wkt(&self) -> Result<String, GeometryError> {
        let points: Vec<Point> = self.points.iter().map(|p| Point::new(p[0], p[1])).collect();
        points_to_wkt_polygon(&points)
    }

    /// Bounding box (min_x, min_y, max_x, max_y) of the ring.
    pub fn bounding_box(&self) -> Result<(f64, f64, f64, f64), GeometryError> {
        let first = self.points.first().ok_or(GeometryError::EmptyGeometry)?;
        let mut bbox = (first[0], first[1], first[0], first[1]);
        for p in &self.points[1..] {
            bbox.0 = bbox.0.min(p[0]);
            bbox.1 = bbox.1.min(p[1]);
            bbox.2 = bbox.2.max(p[0]);
            bbox.3 = bbox.3.max(p[1]);
        }
        Ok(bbox)
    }

    /// True when this footprint's bounding box overlaps the given box.
    /// Used to filter cached rows by their precomputed extent columns.
    pub fn intersects_bbox(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> bool {
        match self.bounding_box() {
            Ok((own_min_x, own_min_y, own_max_x, own_max_y)) => {
                own_min_x <= max_x && own_max_x >= min_x && own_min_y <= max_y && own_max_y >= min_y
            }
            Err(_) => false,
        }
    }
}
