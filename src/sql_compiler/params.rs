use serde::Serialize;

use crate::query_model::PropertyValue;

use super::type_mapping::NativeDbType;

/// One named query parameter with its declared database type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryParam {
    pub name: String,
    pub value: PropertyValue,
    pub db_type: NativeDbType,
}

/// Ordered collection of named parameters. Placeholders are handed out
/// as `@p0`, `@p1`, ... in allocation order; no literal is ever spliced
/// into SQL text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamMap {
    params: Vec<QueryParam>,
}

impl ParamMap {
    pub fn new() -> Self {
        ParamMap { params: Vec::new() }
    }

    /// Allocate the next placeholder for `value` and return it.
    pub fn add(&mut self, value: PropertyValue, db_type: NativeDbType) -> String {
        let name = format!("@p{}", self.params.len());
        self.params.push(QueryParam {
            name: name.clone(),
            value,
            db_type,
        });
        name
    }

    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&QueryParam> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
