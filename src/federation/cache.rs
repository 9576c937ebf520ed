//! Mimic-table cache layer.
//!
//! Instances fetched from live providers are persisted into flat cache
//! tables and read back when a provider is unreachable. Reads are best
//! effort: any failure is logged and counts as a miss. Writes are
//! prepared here as DELETE/INSERT statement pairs with all values
//! bound up front, then executed later by the background write queue.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::geometry::Footprint;
use crate::object_catalog::{ObjectCatalog, PropertyType};
use crate::query_model::{
    AbstractQuery, ObjectInstance, PropertyValue, RelationalOperator, WhereNode, EXTENDED_POLYGON,
};
use crate::row_mapper::map_rows;
use crate::sql_compiler::{
    native_db_type, BindingMode, CompileError, CompiledQuery, CompilerOptions, NativeDbType,
    ParamMap, QueryCompiler, CACHE_COMPLETE_COLUMN, CACHE_SOURCE_TAG_COLUMN,
};
use crate::store::{SqlStatement, SqlStore};

use super::errors::FederationError;

/// Suffixes of the physical columns backing one geometry property in a
/// mimic table, in insert order.
const GEOMETRY_COLUMN_SUFFIXES: [&str; 6] = ["_wkt", "_srid", "_minx", "_miny", "_maxx", "_maxy"];

pub struct InstanceCache {
    catalog: Arc<ObjectCatalog>,
    store: Arc<dyn SqlStore>,
    options: CompilerOptions,
}

impl InstanceCache {
    pub fn new(
        catalog: Arc<ObjectCatalog>,
        store: Arc<dyn SqlStore>,
        options: CompilerOptions,
    ) -> Self {
        InstanceCache {
            catalog,
            store,
            options,
        }
    }

    /// True when the class (or one of its bases) is bound to a cache
    /// table, i.e. the cache can hold instances of it at all.
    pub fn class_is_cached(&self, class_name: &str) -> bool {
        match self.catalog.base_chain(class_name) {
            Ok(chain) => chain.iter().any(|c| c.cache_binding().is_some()),
            Err(_) => false,
        }
    }

    fn compile(&self, query: &AbstractQuery) -> Result<CompiledQuery, CompileError> {
        QueryCompiler::new(&self.catalog, self.options.clone()).compile(query, BindingMode::Cache)
    }

    async fn fetch(&self, compiled: &CompiledQuery) -> Result<Vec<ObjectInstance>, FederationError> {
        let mut rows = self
            .store
            .query(&compiled.sql, compiled.params.params())
            .await?;
        Ok(map_rows(&compiled.layout, rows.as_mut()).await?)
    }

    /// Cached instances for the given ids, keyed by id. Classes without
    /// a cache binding and failed reads both come back empty.
    pub async fn lookup_by_ids(
        &self,
        class_name: &str,
        ids: &[String],
    ) -> HashMap<String, ObjectInstance> {
        if ids.is_empty() {
            return HashMap::new();
        }
        let query = AbstractQuery::by_ids(class_name, ids.to_vec());
        let compiled = match self.compile(&query) {
            Ok(compiled) => compiled,
            Err(CompileError::UnqueriableClass(_)) => {
                debug!("Class {} has no cache binding", class_name);
                return HashMap::new();
            }
            Err(error) => {
                warn!("Cache lookup for {} did not compile: {}", class_name, error);
                return HashMap::new();
            }
        };
        match self.fetch(&compiled).await {
            Ok(instances) => instances
                .into_iter()
                .filter_map(|instance| instance.id.clone().map(|id| (id, instance)))
                .collect(),
            Err(error) => {
                warn!(
                    "Cache lookup for {} failed, treating as a miss: {}",
                    class_name, error
                );
                HashMap::new()
            }
        }
    }

    pub async fn lookup_by_id(&self, class_name: &str, id: &str) -> Option<ObjectInstance> {
        self.lookup_by_ids(class_name, &[id.to_string()])
            .await
            .remove(id)
    }

    /// Cached instances whose footprint extent overlaps the polygon,
    /// minus the excluded ids. Best effort like the id lookups.
    pub async fn snapshot_for_polygon(
        &self,
        class_name: &str,
        polygon: &serde_json::Value,
        exclude_ids: &[String],
    ) -> Vec<ObjectInstance> {
        let mut query = AbstractQuery::new(class_name);
        query
            .extended
            .insert(EXTENDED_POLYGON.to_string(), polygon.clone());
        if !exclude_ids.is_empty() {
            let key_property = match self.catalog.primary_key_property(class_name) {
                Ok((_, property)) => property.name.clone(),
                Err(error) => {
                    warn!("Cache snapshot for {} skipped: {}", class_name, error);
                    return Vec::new();
                }
            };
            query.criteria = Some(WhereNode::Comparison {
                property: key_property,
                operator: RelationalOperator::NotIn,
                value: PropertyValue::List(
                    exclude_ids
                        .iter()
                        .map(|id| PropertyValue::Str(id.clone()))
                        .collect(),
                ),
            });
        }

        let compiled = match self.compile(&query) {
            Ok(compiled) => compiled,
            Err(error) => {
                warn!(
                    "Cache snapshot for {} did not compile: {}",
                    class_name, error
                );
                return Vec::new();
            }
        };
        match self.fetch(&compiled).await {
            Ok(instances) => instances,
            Err(error) => {
                warn!("Cache snapshot for {} failed: {}", class_name, error);
                Vec::new()
            }
        }
    }

    /// Build the two-phase write for one instance: a DELETE followed by
    /// an INSERT per cache-bound class in its inheritance chain. Values
    /// are bound now so the statements stay valid after the instance is
    /// handed to the caller.
    pub fn prepare_write(
        &self,
        instance: &ObjectInstance,
    ) -> Result<Vec<SqlStatement>, FederationError> {
        let Some(id) = instance.id.as_deref() else {
            debug!(
                "Instance of {} has no id and cannot be cached",
                instance.class_name
            );
            return Ok(Vec::new());
        };

        let chain = self.catalog.base_chain(&instance.class_name)?;
        let mut statements = Vec::new();
        for class in chain {
            let Some((table, key_column)) = class.cache_binding() else {
                continue;
            };

            let mut delete_params = ParamMap::new();
            let key_placeholder = delete_params.add(
                PropertyValue::Str(id.to_string()),
                NativeDbType::String,
            );
            statements.push(SqlStatement::new(
                format!("DELETE FROM {} WHERE {} = {}", table, key_column, key_placeholder),
                delete_params.params().to_vec(),
            ));

            let mut columns: Vec<String> = Vec::new();
            let mut params = ParamMap::new();
            let mut placeholders: Vec<String> = Vec::new();

            columns.push(key_column.to_string());
            placeholders.push(params.add(
                PropertyValue::Str(id.to_string()),
                NativeDbType::String,
            ));
            columns.push(CACHE_SOURCE_TAG_COLUMN.to_string());
            let tag_value = match instance.source_tag() {
                Some(tag) => PropertyValue::Str(tag.to_string()),
                None => PropertyValue::Null,
            };
            placeholders.push(params.add(tag_value, NativeDbType::String));
            columns.push(CACHE_COMPLETE_COLUMN.to_string());
            placeholders.push(params.add(
                PropertyValue::Bool(instance.is_complete()),
                NativeDbType::Boolean,
            ));

            for property in &class.properties {
                let Some(mimic_column) = property.mimic_column.as_deref() else {
                    continue;
                };
                if mimic_column == key_column {
                    continue;
                }
                let value = instance
                    .property(&property.name)
                    .cloned()
                    .unwrap_or(PropertyValue::Null);
                if property.value_type == PropertyType::Geometry {
                    add_geometry_columns(mimic_column, &value, &mut columns, &mut params, &mut placeholders);
                } else {
                    let db_type = native_db_type(property.value_type)?;
                    columns.push(mimic_column.to_string());
                    placeholders.push(params.add(value, db_type));
                }
            }

            statements.push(SqlStatement::new(
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table,
                    columns.join(", "),
                    placeholders.join(", ")
                ),
                params.params().to_vec(),
            ));
        }
        Ok(statements)
    }
}

/// Expand one geometry property into its six physical mimic columns:
/// WKT text, SRID and the four extent bounds. An absent or unparsable
/// footprint writes all six as NULL.
fn add_geometry_columns(
    mimic_column: &str,
    value: &PropertyValue,
    columns: &mut Vec<String>,
    params: &mut ParamMap,
    placeholders: &mut Vec<String>,
) {
    let decomposed = match value {
        PropertyValue::Geometry(json) => decompose_footprint(json),
        PropertyValue::Str(json) => decompose_footprint(json),
        _ => None,
    };

    for suffix in GEOMETRY_COLUMN_SUFFIXES {
        columns.push(format!("{}{}", mimic_column, suffix));
    }
    match decomposed {
        Some((wkt, srid, bbox)) => {
            placeholders.push(params.add(PropertyValue::Str(wkt), NativeDbType::String));
            placeholders.push(params.add(PropertyValue::Int(srid), NativeDbType::Int32));
            for bound in [bbox.0, bbox.1, bbox.2, bbox.3] {
                placeholders.push(params.add(PropertyValue::Double(bound), NativeDbType::Double));
            }
        }
        None => {
            placeholders.push(params.add(PropertyValue::Null, NativeDbType::String));
            placeholders.push(params.add(PropertyValue::Null, NativeDbType::Int32));
            for _ in 0..4 {
                placeholders.push(params.add(PropertyValue::Null, NativeDbType::Double));
            }
        }
    }
}

fn decompose_footprint(json: &str) -> Option<(String, i32, (f64, f64, f64, f64))> {
    let footprint = match Footprint::from_json_str(json) {
        Ok(footprint) => footprint,
        Err(error) => {
            warn!("Footprint not cacheable: {}", error);
            return None;
        }
    };
    let srid: i32 = match footprint.coordinate_system.trim().parse() {
        Ok(srid) => srid,
        Err(_) => {
            warn!(
                "Footprint has non-numeric coordinate system `{}`",
                footprint.coordinate_system
            );
            return None;
        }
    };
    let wkt = match footprint.to_wkt() {
        Ok(wkt) => wkt,
        Err(error) => {
            warn!("Footprint not cacheable: {}", error);
            return None;
        }
    };
    let bbox = match footprint.bounding_box() {
        Ok(bbox) => bbox,
        Err(error) => {
            warn!("Footprint not cacheable: {}", error);
            return None;
        }
    };
    Some((wkt, srid, bbox))
}
