use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::query::{EXTENDED_COMPLETE, EXTENDED_SOURCE_TAG};
use super::value::PropertyValue;

/// One materialized object. Property order follows the select layout,
/// which itself follows catalog declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInstance {
    pub class_name: String,
    /// Primary-key value as text; None until the key column is mapped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub properties: IndexMap<String, PropertyValue>,
    /// Out-of-band metadata: complete flag, source tag, formats
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extended: HashMap<String, serde_json::Value>,
    /// Related instances attached by relationship expansion
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RelationEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationEdge {
    pub relationship: String,
    pub instances: Vec<ObjectInstance>,
}

impl ObjectInstance {
    pub fn new(class_name: impl Into<String>) -> Self {
        ObjectInstance {
            class_name: class_name.into(),
            id: None,
            properties: IndexMap::new(),
            extended: HashMap::new(),
            relations: Vec::new(),
        }
    }

    pub fn with_id(class_name: impl Into<String>, id: impl Into<String>) -> Self {
        let mut instance = Self::new(class_name);
        instance.id = Some(id.into());
        instance
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.properties.insert(name.into(), value);
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Cached instances carry a completeness marker; anything without
    /// one counts as incomplete.
    pub fn is_complete(&self) -> bool {
        matches!(
            self.extended.get(EXTENDED_COMPLETE),
            Some(serde_json::Value::Bool(true))
        )
    }

    pub fn set_complete(&mut self, complete: bool) {
        self.extended
            .insert(EXTENDED_COMPLETE.to_string(), serde_json::Value::Bool(complete));
    }

    pub fn source_tag(&self) -> Option<&str> {
        self.extended.get(EXTENDED_SOURCE_TAG).and_then(|v| v.as_str())
    }

    pub fn set_source_tag(&mut self, tag: impl Into<String>) {
        self.extended.insert(
            EXTENDED_SOURCE_TAG.to_string(),
            serde_json::Value::String(tag.into()),
        );
    }

    pub fn add_relation(&mut self, relationship: impl Into<String>, instances: Vec<ObjectInstance>) {
        self.relations.push(RelationEdge {
            relationship: relationship.into(),
            instances,
        });
    }

    pub fn relation(&self, relationship: &str) -> Option<&RelationEdge> {
        self.relations.iter().find(|r| r.relationship == relationship)
    }

    /// Overwrite this instance's properties with every non-null property
    /// of a fresher copy. Null on the fresher side never erases data.
    pub fn apply_override(&mut self, fresher: &ObjectInstance) {
        for (name, value) in &fresher.properties {
            if !value.is_null() {
                self.properties.insert(name.clone(), value.clone());
            }
        }
        if fresher.is_complete() {
            self.set_complete(true);
        }
    }
}
