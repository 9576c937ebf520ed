use std::collections::HashMap;
use std::path::Path;

use log::debug;

use super::class_schema::{ClassSchema, EntityKind, PropertySchema, PropertyType, SecondaryTable};
use super::config::{CatalogConfig, ClassConfig, RelationshipConfig};
use super::errors::CatalogError;
use super::relationship_schema::{RelationshipKeys, RelationshipSchema};

/// Immutable class/relationship catalog. Built once at startup and
/// shared for the process lifetime.
#[derive(Debug, Clone)]
pub struct ObjectCatalog {
    name: String,
    classes: HashMap<String, ClassSchema>,
    relationships: HashMap<String, RelationshipSchema>,
}

impl ObjectCatalog {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let config = CatalogConfig::from_yaml_file(path)?;
        Self::build(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        Self::build(CatalogConfig::from_yaml_str(yaml)?)
    }

    pub fn build(config: CatalogConfig) -> Result<Self, CatalogError> {
        let mut classes = HashMap::new();
        for class_config in &config.classes {
            let schema = build_class(class_config)?;
            if classes.insert(schema.name.clone(), schema).is_some() {
                return Err(CatalogError::InvalidConfig {
                    message: format!("Duplicate class definition: {}", class_config.name),
                });
            }
        }

        let mut relationships = HashMap::new();
        for rel_config in &config.relationships {
            let schema = build_relationship(rel_config, &classes)?;
            if relationships.insert(schema.name.clone(), schema).is_some() {
                return Err(CatalogError::InvalidConfig {
                    message: format!("Duplicate relationship definition: {}", rel_config.name),
                });
            }
        }

        let catalog = ObjectCatalog {
            name: config.name.unwrap_or_else(|| "default".to_string()),
            classes,
            relationships,
        };
        catalog.validate()?;

        debug!(
            "Catalog '{}' built: {} classes, {} relationships",
            catalog.name,
            catalog.classes.len(),
            catalog.relationships.len()
        );
        Ok(catalog)
    }

    /// Load-time validation: base references resolve, chains are acyclic,
    /// joinable chains carry key columns on both sides.
    fn validate(&self) -> Result<(), CatalogError> {
        for class in self.classes.values() {
            let chain = self.base_chain(&class.name)?;
            for pair in chain.windows(2) {
                let (child, base) = (pair[0], pair[1]);
                if child.table.is_some() && base.table.is_some() {
                    if child.key_column.is_none() {
                        return Err(CatalogError::MissingBinding {
                            class_name: child.name.clone(),
                            what: "key_column (required to join the base table)".to_string(),
                        });
                    }
                    if base.key_column.is_none() {
                        return Err(CatalogError::MissingBinding {
                            class_name: base.name.clone(),
                            what: "key_column (required to be joined from derived tables)"
                                .to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class_schema_opt(&self, class_name: &str) -> Option<&ClassSchema> {
        self.classes.get(class_name)
    }

    pub fn class_schema(&self, class_name: &str) -> Result<&ClassSchema, CatalogError> {
        self.classes.get(class_name).ok_or_else(|| CatalogError::Class {
            class_name: class_name.to_string(),
        })
    }

    pub fn relationship(&self, relationship_name: &str) -> Result<&RelationshipSchema, CatalogError> {
        self.relationships
            .get(relationship_name)
            .ok_or_else(|| CatalogError::Relationship {
                relationship_name: relationship_name.to_string(),
            })
    }

    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn classes_of_kind(&self, kind: EntityKind) -> Vec<&ClassSchema> {
        let mut found: Vec<&ClassSchema> =
            self.classes.values().filter(|c| c.kind == kind).collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    /// The single class of the given kind. Federation dispatch relies on
    /// the catalog declaring exactly one detail-view / spatial-entity
    /// class per deployment.
    pub fn class_of_kind(&self, kind: EntityKind) -> Result<&ClassSchema, CatalogError> {
        let found = self.classes_of_kind(kind);
        match found.as_slice() {
            [one] => Ok(one),
            [] => Err(CatalogError::InvalidConfig {
                message: format!("Catalog declares no class of kind {}", kind),
            }),
            many => Err(CatalogError::InvalidConfig {
                message: format!(
                    "Catalog declares {} classes of kind {} (exactly one expected)",
                    many.len(),
                    kind
                ),
            }),
        }
    }

    /// The inheritance chain starting at `class_name`, the class itself
    /// first, root base last. Walked with an explicit loop and a step
    /// bound so a miswired catalog cannot recurse the stack away.
    pub fn base_chain(&self, class_name: &str) -> Result<Vec<&ClassSchema>, CatalogError> {
        let mut chain = Vec::new();
        let mut current = self.class_schema(class_name)?;
        chain.push(current);

        while let Some(base_name) = current.base.as_deref() {
            if chain.iter().any(|c| c.name == base_name) {
                return Err(CatalogError::InheritanceCycle {
                    class_name: class_name.to_string(),
                });
            }
            current = self.class_schema(base_name)?;
            chain.push(current);
        }
        Ok(chain)
    }

    /// True when `class_name` is `candidate` or derives from it.
    pub fn is_same_or_derived(&self, class_name: &str, candidate: &str) -> Result<bool, CatalogError> {
        Ok(self
            .base_chain(class_name)?
            .iter()
            .any(|c| c.name == candidate))
    }

    /// Resolve a property against the class or its base classes. Returns
    /// the owning class along with the property schema.
    pub fn resolve_property<'a>(
        &'a self,
        class_name: &str,
        property_name: &str,
    ) -> Result<(&'a ClassSchema, &'a PropertySchema), CatalogError> {
        for class in self.base_chain(class_name)? {
            if let Some(property) = class.property_opt(property_name) {
                return Ok((class, property));
            }
        }
        Err(CatalogError::Property {
            class_name: class_name.to_string(),
            property_name: property_name.to_string(),
        })
    }

    /// Primary-key property of a class, inherited from the nearest base
    /// that declares one. Returns (owning class, property schema).
    pub fn primary_key_property<'a>(
        &'a self,
        class_name: &str,
    ) -> Result<(&'a ClassSchema, &'a PropertySchema), CatalogError> {
        for class in self.base_chain(class_name)? {
            if let Some(key_name) = class.primary_key.as_deref() {
                return self.resolve_property(&class.name, key_name);
            }
        }
        Err(CatalogError::MissingBinding {
            class_name: class_name.to_string(),
            what: "primary_key (none declared on the class or its bases)".to_string(),
        })
    }

    /// All spatial properties reachable from the class through its
    /// inheritance chain. Spatial filters require exactly one; the
    /// caller decides how to report other counts.
    pub fn spatial_properties<'a>(
        &'a self,
        class_name: &str,
    ) -> Result<Vec<(&'a ClassSchema, &'a PropertySchema)>, CatalogError> {
        let mut found = Vec::new();
        for class in self.base_chain(class_name)? {
            for property in class.properties.iter().filter(|p| p.spatial) {
                found.push((class, property));
            }
        }
        Ok(found)
    }
}

fn build_class(config: &ClassConfig) -> Result<ClassSchema, CatalogError> {
    let base = match config.bases.as_slice() {
        [] => None,
        [one] => Some(one.clone()),
        _ => {
            return Err(CatalogError::MultipleBaseClasses {
                class_name: config.name.clone(),
            })
        }
    };

    let properties = config
        .properties
        .iter()
        .map(|p| PropertySchema {
            name: p.name.clone(),
            value_type: p.value_type,
            column: p.column.clone(),
            spatial: p.spatial.unwrap_or(p.value_type == PropertyType::Geometry),
            secondary: p.secondary.as_ref().map(|s| SecondaryTable {
                table: s.table.clone(),
                key: s.key.clone(),
                parent_key: s.parent_key.clone(),
            }),
            mimic_column: p.mimic_column.clone(),
        })
        .collect();

    Ok(ClassSchema {
        name: config.name.clone(),
        base,
        kind: config.kind,
        table: config.table.clone(),
        key_column: config.key_column.clone(),
        primary_key: config.primary_key.clone(),
        cache_table: config.cache_table.clone(),
        cache_key_column: config.cache_key_column.clone(),
        sources: config.sources.clone(),
        properties,
    })
}

fn build_relationship(
    config: &RelationshipConfig,
    classes: &HashMap<String, ClassSchema>,
) -> Result<RelationshipSchema, CatalogError> {
    for class_name in [&config.container, &config.contained] {
        if !classes.contains_key(class_name.as_str()) {
            return Err(CatalogError::invalid_config_with_context(
                format!("Relationship '{}' references unknown class '{}'", config.name, class_name),
                "define the class before the relationship",
            ));
        }
    }

    let keys = match &config.link {
        Some(link) => RelationshipKeys::ManyToMany {
            link_table: link.table.clone(),
            container_column: config.container_column.clone(),
            link_container_column: link.container_column.clone(),
            link_contained_column: link.contained_column.clone(),
            contained_column: config.contained_column.clone(),
        },
        None => RelationshipKeys::Direct {
            container_column: config.container_column.clone(),
            contained_column: config.contained_column.clone(),
        },
    };

    Ok(RelationshipSchema {
        name: config.name.clone(),
        container_class: config.container.clone(),
        contained_class: config.contained.clone(),
        keys,
    })
}
