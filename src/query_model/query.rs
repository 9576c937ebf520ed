use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::where_tree::WhereNode;

/// Extended-data keys with fixed meaning on the wire.
pub const EXTENDED_POLYGON: &str = "polygon";
pub const EXTENDED_FORMAT: &str = "format";
pub const EXTENDED_INSTANCE_COUNT: &str = "instanceCount";
/// Instance extended-data keys filled by the cache layer.
pub const EXTENDED_COMPLETE: &str = "complete";
pub const EXTENDED_SOURCE_TAG: &str = "sourceTag";

/// Comparison operators of the abstract query language. The SQL layer
/// accepts the relational subset; the spatial pair only ever reaches a
/// source through the dedicated polygon path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationalOperator {
    Eq,
    Ne,
    Gt,
    GtEq,
    Lt,
    LtEq,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Intersects,
    Within,
}

impl RelationalOperator {
    /// Operators that take no right-hand literal.
    pub fn is_null_check(self) -> bool {
        matches!(self, RelationalOperator::IsNull | RelationalOperator::IsNotNull)
    }

    /// Operators whose literal is a list.
    pub fn is_list_operator(self) -> bool {
        matches!(self, RelationalOperator::In | RelationalOperator::NotIn)
    }
}

impl fmt::Display for RelationalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RelationalOperator::Eq => "eq",
            RelationalOperator::Ne => "ne",
            RelationalOperator::Gt => "gt",
            RelationalOperator::GtEq => "gtEq",
            RelationalOperator::Lt => "lt",
            RelationalOperator::LtEq => "ltEq",
            RelationalOperator::Like => "like",
            RelationalOperator::NotLike => "notLike",
            RelationalOperator::In => "in",
            RelationalOperator::NotIn => "notIn",
            RelationalOperator::IsNull => "isNull",
            RelationalOperator::IsNotNull => "isNotNull",
            RelationalOperator::Intersects => "intersects",
            RelationalOperator::Within => "within",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogicalOperator {
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => f.write_str("AND"),
            LogicalOperator::Or => f.write_str("OR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy {
    pub property: String,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

fn default_ascending() -> bool {
    true
}

/// An abstract object query: the unit of work every source accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbstractQuery {
    pub class_name: String,
    /// Selected property names; None selects every property the class
    /// and its bases declare
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<WhereNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Free-form extended data (polygon, format, instanceCount, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extended: HashMap<String, serde_json::Value>,
}

impl AbstractQuery {
    pub fn new(class_name: impl Into<String>) -> Self {
        AbstractQuery {
            class_name: class_name.into(),
            properties: None,
            criteria: None,
            order_by: Vec::new(),
            offset: None,
            limit: None,
            extended: HashMap::new(),
        }
    }

    /// Query selecting every property of the instances with the given ids.
    pub fn by_ids(class_name: impl Into<String>, ids: Vec<String>) -> Self {
        let mut query = Self::new(class_name);
        query.criteria = Some(WhereNode::IdSet { ids });
        query
    }

    pub fn polygon_value(&self) -> Option<&serde_json::Value> {
        self.extended.get(EXTENDED_POLYGON)
    }

    pub fn wants_instance_count(&self) -> bool {
        match self.extended.get(EXTENDED_INSTANCE_COUNT) {
            Some(serde_json::Value::Bool(flag)) => *flag,
            Some(serde_json::Value::String(text)) => text.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    pub fn requested_formats(&self) -> Vec<String> {
        match self.extended.get(EXTENDED_FORMAT) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
            Some(serde_json::Value::String(one)) => vec![one.clone()],
            _ => Vec::new(),
        }
    }

    /// Ids when the criteria tree is exactly an id-set filter.
    pub fn id_set(&self) -> Option<&[String]> {
        self.criteria.as_ref().and_then(|c| c.as_id_set())
    }

    /// True when both offset and limit are present, selecting windowed
    /// paging instead of the configured row cap.
    pub fn wants_window_paging(&self) -> bool {
        self.offset.is_some() && self.limit.is_some()
    }
}
