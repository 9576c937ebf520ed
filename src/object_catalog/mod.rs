pub mod catalog;
pub mod class_schema;
pub mod config;
pub mod errors;
pub mod relationship_schema;

// Re-export commonly used types
pub use catalog::ObjectCatalog;
pub use class_schema::{ClassSchema, EntityKind, PropertySchema, PropertyType, SecondaryTable};
pub use config::CatalogConfig;
pub use errors::CatalogError;
pub use relationship_schema::{Direction, RelationshipKeys, RelationshipSchema};
