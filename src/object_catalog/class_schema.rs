use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a class plays in the federation model. Resolved once at catalog
/// load; dispatch sites match on this instead of comparing class names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Geographic object with a footprint (the spatial search anchor)
    SpatialEntity,
    /// Flattened presentation row combining entity, metadata and source
    DetailView,
    /// Descriptive record attached to a spatial entity
    Metadata,
    /// Provenance record describing where a metadata record came from
    DataSource,
    /// Ordinary class with no federation-specific role
    Plain,
}

impl Default for EntityKind {
    fn default() -> Self {
        EntityKind::Plain
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::SpatialEntity => f.write_str("spatial_entity"),
            EntityKind::DetailView => f.write_str("detail_view"),
            EntityKind::Metadata => f.write_str("metadata"),
            EntityKind::DataSource => f.write_str("data_source"),
            EntityKind::Plain => f.write_str("plain"),
        }
    }
}

/// Declared value type of a property. The SQL layer maps a subset of
/// these to native database types; the rest are API-only shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Double,
    Boolean,
    Int,
    Long,
    DateTime,
    Geometry,
    Struct,
    Point,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::String => f.write_str("string"),
            PropertyType::Double => f.write_str("double"),
            PropertyType::Boolean => f.write_str("boolean"),
            PropertyType::Int => f.write_str("int"),
            PropertyType::Long => f.write_str("long"),
            PropertyType::DateTime => f.write_str("datetime"),
            PropertyType::Geometry => f.write_str("geometry"),
            PropertyType::Struct => f.write_str("struct"),
            PropertyType::Point => f.write_str("point"),
        }
    }
}

/// Binding of a property to a physical table other than its owner
/// class's primary table. Joined on demand when the property is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryTable {
    /// Physical table holding the column
    pub table: String,
    /// Join column on the secondary table
    pub key: String,
    /// Join column on the owner class's primary table
    pub parent_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    pub name: String,
    pub value_type: PropertyType,
    /// Physical column in the owner's primary table (or the secondary
    /// table when one is declared). None for API-only properties.
    pub column: Option<String>,
    /// True for the footprint property used by spatial predicates
    pub spatial: bool,
    pub secondary: Option<SecondaryTable>,
    /// Column name in the owner's cache (mimic) table
    pub mimic_column: Option<String>,
}

impl PropertySchema {
    /// Column binding for the given mode; None when the property cannot
    /// be read in that mode.
    pub fn column_for_cache(&self, cache: bool) -> Option<&str> {
        if cache {
            self.mimic_column.as_deref()
        } else {
            self.column.as_deref()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSchema {
    pub name: String,
    /// Base class name (single inheritance)
    pub base: Option<String>,
    pub kind: EntityKind,
    /// Primary table; None means the class is not SQL-queriable live
    pub table: Option<String>,
    /// Column in the primary table carrying the class key (used both as
    /// the inheritance join column and the identifier column)
    pub key_column: Option<String>,
    /// Name of the primary-key property; inherited when None
    pub primary_key: Option<String>,
    /// Cache (mimic) table mirroring fetched instances of this class
    pub cache_table: Option<String>,
    /// Key column in the cache table
    pub cache_key_column: Option<String>,
    /// Source names allowed to answer queries for this class
    pub sources: Vec<String>,
    /// Properties declared on this class (inherited ones live on the base)
    pub properties: Vec<PropertySchema>,
}

impl ClassSchema {
    /// Look up a property declared directly on this class.
    pub fn property_opt(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Primary table plus key column, present only for classes bound to
    /// a live table.
    pub fn live_binding(&self) -> Option<(&str, &str)> {
        match (self.table.as_deref(), self.key_column.as_deref()) {
            (Some(table), Some(key)) => Some((table, key)),
            _ => None,
        }
    }

    /// Cache table plus key column, present only for cached classes.
    pub fn cache_binding(&self) -> Option<(&str, &str)> {
        match (self.cache_table.as_deref(), self.cache_key_column.as_deref()) {
            (Some(table), Some(key)) => Some((table, key)),
            _ => None,
        }
    }

    pub fn serves_source(&self, source: &str) -> bool {
        self.sources.iter().any(|s| s == source)
    }
}
