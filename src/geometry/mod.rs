pub mod errors;
pub mod footprint;
pub mod wkt;

pub use errors::GeometryError;
pub use footprint::{footprint_to_json, Footprint};
pub use wkt::{extract_bounding_box, parse_wkt_polygon, points_to_wkt_polygon, BoundingBox, Point};
