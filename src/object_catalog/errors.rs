//! # Object Catalog Error Types
//!
//! Error handling for class schema lookups, inheritance resolution and
//! catalog configuration loading.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("No class schema found for `{class_name}`")]
    Class { class_name: String },
    #[error("No property `{property_name}` on class `{class_name}` or its base classes")]
    Property {
        class_name: String,
        property_name: String,
    },
    #[error("No relationship schema found for `{relationship_name}`")]
    Relationship { relationship_name: String },
    #[error("Class `{class_name}` declares more than one base class (single inheritance only)")]
    MultipleBaseClasses { class_name: String },
    #[error("Inheritance cycle detected while resolving `{class_name}`")]
    InheritanceCycle { class_name: String },
    #[error("Class `{class_name}` is missing required binding: {what}")]
    MissingBinding { class_name: String, what: String },
    #[error("Failed to read catalog file: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse catalog: {error}")]
    ConfigParseError { error: String },
    #[error("Invalid catalog: {message}")]
    InvalidConfig { message: String },
}

/// Helper methods for creating errors with context information
impl CatalogError {
    /// Create a Class error with context information
    pub fn class_error_with_context(
        class_name: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        let name = class_name.into();
        let ctx = context.into();
        CatalogError::Class {
            class_name: format!("{}\n  Context: {}", name, ctx),
        }
    }

    /// Create an InvalidConfig error with context information
    pub fn invalid_config_with_context(
        message: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        let msg = message.into();
        let ctx = context.into();
        CatalogError::InvalidConfig {
            message: format!("{}\n  Context: {}", msg, ctx),
        }
    }
}
