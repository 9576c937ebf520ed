use thiserror::Error;

use crate::object_catalog::CatalogError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error("Class `{0}` is not queriable against the relational store (missing table or key binding)")]
    UnqueriableClass(String),
    #[error("Unknown property `{property}` for class `{class_name}`")]
    UnknownProperty {
        class_name: String,
        property: String,
    },
    #[error("Operator `{0}` has no SQL form (spatial filters travel as polygon extended data)")]
    UnsupportedOperator(String),
    #[error("Property type `{0}` has no native database type")]
    UnsupportedType(String),
    #[error("Identifier list is empty (must contain at least one id)")]
    EmptyIdSet,
    #[error("Criterion group is empty (must contain at least one criterion)")]
    EmptyWhereGroup,
    #[error("Logical operator added to an empty WHERE clause")]
    MisplacedLogicalOperator,
    #[error("Unbalanced WHERE clause grouping (unclosed parenthesis)")]
    UnbalancedWhereGroup,
    #[error("No FROM clause specified")]
    MissingFromClause,
    #[error("SELECT list is empty")]
    EmptySelectList,
    #[error("Windowed paging requires an ORDER BY clause")]
    MissingOrderByForWindow,
    #[error("Class `{0}` has no spatial property (polygon filters require one)")]
    NoSpatialProperty(String),
    #[error("Class `{0}` has {1} spatial properties (polygon filters require exactly one)")]
    AmbiguousSpatialProperty(String, usize),
    #[error("Malformed polygon: {0}")]
    InvalidPolygon(String),
    #[error("Invalid spatial reference id `{0}` (must be an integer)")]
    InvalidSrid(String),
    #[error("Value {value} is not usable for the {expected} property `{property}`")]
    ValueTypeMismatch {
        property: String,
        expected: String,
        value: String,
    },
    #[error(
        "Relationship `{relationship}` does not connect class `{class_name}` to `{related_class}` in direction {direction}"
    )]
    RelationshipMismatch {
        relationship: String,
        class_name: String,
        related_class: String,
        direction: String,
    },
    #[error("Related criteria cannot be evaluated against cache tables (relationship `{0}`)")]
    UnsupportedCacheCriterion(String),
    #[error("Property `{property}` has no column binding in {mode} mode")]
    MissingColumnBinding { property: String, mode: String },
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Helper methods for creating errors with context information
impl CompileError {
    /// Create a ValueTypeMismatch from a literal that failed coercion
    pub fn value_mismatch(
        property: impl Into<String>,
        expected: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        CompileError::ValueTypeMismatch {
            property: property.into(),
            expected: expected.into(),
            value: value.into(),
        }
    }

    /// Create an UnknownProperty error with the queried class attached
    pub fn unknown_property_with_context(
        class_name: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        CompileError::UnknownProperty {
            class_name: class_name.into(),
            property: property.into(),
        }
    }
}
