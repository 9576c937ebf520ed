//! YAML catalog definitions.
//!
//! The catalog file declares classes (with table/column bindings, cache
//! bindings and inheritance) and relationships. Example:
//!
//! ```yaml
//! name: hydrology
//! classes:
//!   - name: Station
//!     kind: spatial_entity
//!     table: STATIONS
//!     key_column: STATION_ID
//!     primary_key: Id
//!     cache_table: CB_STATIONS
//!     cache_key_column: station_id
//!     sources: [store, survey_api]
//!     properties:
//!       - name: Id
//!         type: string
//!         column: STATION_ID
//!         mimic_column: station_id
//!       - name: Footprint
//!         type: geometry
//!         column: GEOM
//!         mimic_column: footprint
//!   - name: ObservationStation
//!     bases: [Station]
//!     table: OBS_STATIONS
//!     key_column: STATION_REF
//! relationships:
//!   - name: StationMetadata
//!     container: Station
//!     contained: Metadata
//!     container_column: STATION_ID
//!     contained_column: FK_STATION
//!   - name: StationDatasets
//!     container: Station
//!     contained: Dataset
//!     container_column: STATION_ID
//!     contained_column: DATASET_ID
//!     link:
//!       table: STATION_DATASET
//!       container_column: FK_STATION
//!       contained_column: FK_DATASET
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::class_schema::{EntityKind, PropertyType};
use super::errors::CatalogError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub classes: Vec<ClassConfig>,
    #[serde(default)]
    pub relationships: Vec<RelationshipConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassConfig {
    pub name: String,
    /// Base classes. The list form mirrors the metadata source; more
    /// than one entry is rejected at build time.
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub kind: EntityKind,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub key_column: Option<String>,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub cache_table: Option<String>,
    #[serde(default)]
    pub cache_key_column: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: PropertyType,
    #[serde(default)]
    pub column: Option<String>,
    /// Defaults to true for geometry-typed properties
    #[serde(default)]
    pub spatial: Option<bool>,
    #[serde(default)]
    pub secondary: Option<SecondaryTableConfig>,
    #[serde(default)]
    pub mimic_column: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryTableConfig {
    pub table: String,
    pub key: String,
    pub parent_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipConfig {
    pub name: String,
    pub container: String,
    pub contained: String,
    pub container_column: String,
    pub contained_column: String,
    /// Present for many-to-many relationships
    #[serde(default)]
    pub link: Option<LinkTableConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkTableConfig {
    pub table: String,
    pub container_column: String,
    pub contained_column: String,
}

impl CatalogConfig {
    /// Load a catalog configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path).map_err(|e| CatalogError::ConfigReadError {
            error: e.to_string(),
        })?;

        Self::from_yaml_str(&contents)
    }

    /// Parse a catalog configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        serde_yaml::from_str(yaml).map_err(|e| CatalogError::ConfigParseError {
            error: e.to_string(),
        })
    }
}
