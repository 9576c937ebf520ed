use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GeometryError {
    #[error("Invalid geometry: a polygon requires at least 3 points (got {0})")]
    InvalidGeometry(usize),
    #[error("Malformed WKT: {0}")]
    MalformedWkt(String),
    #[error("Malformed footprint JSON: {0}")]
    MalformedFootprint(String),
    #[error("Geometry has no points (bounding box is undefined)")]
    EmptyGeometry,
}

impl GeometryError {
    /// Create a MalformedWkt error with the offending input attached
    pub fn malformed_wkt_with_context(message: impl Into<String>, input: &str) -> Self {
        let msg = message.into();
        let shown: String = input.chars().take(80).collect();
        GeometryError::MalformedWkt(format!("{} (input: {})", msg, shown))
    }
}
