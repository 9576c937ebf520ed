use serde::{Deserialize, Serialize};

use crate::object_catalog::Direction;

use super::query::{LogicalOperator, RelationalOperator};
use super::value::PropertyValue;

/// Criterion tree of an abstract query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WhereNode {
    /// One property compared against a literal
    #[serde(rename_all = "camelCase")]
    Comparison {
        property: String,
        operator: RelationalOperator,
        #[serde(default)]
        value: PropertyValue,
    },
    /// Identifier filter: matches any of the listed primary keys
    #[serde(rename_all = "camelCase")]
    IdSet { ids: Vec<String> },
    /// Filter through a relationship onto a related class
    #[serde(rename_all = "camelCase")]
    Related {
        relationship: String,
        direction: Direction,
        #[serde(rename = "class")]
        related_class: String,
        criteria: Box<WhereNode>,
    },
    /// Parenthesized sub-criteria with explicit connectors. The first
    /// item's operator is not rendered.
    #[serde(rename_all = "camelCase")]
    Group { items: Vec<GroupItem> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupItem {
    pub operator: LogicalOperator,
    pub criteria: WhereNode,
}

/// Borrowed view of one related criterion, used by the federation layer
/// to expand related instances after the primary fetch.
#[derive(Debug, Clone, Copy)]
pub struct RelatedRef<'a> {
    pub relationship: &'a str,
    pub direction: Direction,
    pub related_class: &'a str,
    pub criteria: &'a WhereNode,
}

impl WhereNode {
    pub fn and_group(children: Vec<WhereNode>) -> WhereNode {
        WhereNode::Group {
            items: children
                .into_iter()
                .map(|criteria| GroupItem {
                    operator: LogicalOperator::And,
                    criteria,
                })
                .collect(),
        }
    }

    /// When the tree is exactly one id-set criterion, return the ids.
    /// The federation layer uses this to pick the id-lookup path.
    pub fn as_id_set(&self) -> Option<&[String]> {
        match self {
            WhereNode::IdSet { ids } => Some(ids),
            WhereNode::Group { items } => match items.as_slice() {
                [only] => only.criteria.as_id_set(),
                _ => None,
            },
            _ => None,
        }
    }

    /// First id-set criterion anywhere in the tree's group structure.
    /// Id sets nested under a related criterion scope that criterion,
    /// not the queried class, and are not considered.
    pub fn find_id_set(&self) -> Option<&[String]> {
        match self {
            WhereNode::IdSet { ids } => Some(ids),
            WhereNode::Group { items } => {
                items.iter().find_map(|item| item.criteria.find_id_set())
            }
            WhereNode::Comparison { .. } | WhereNode::Related { .. } => None,
        }
    }

    /// All related criteria in the tree, depth first.
    pub fn collect_related(&self) -> Vec<RelatedRef<'_>> {
        let mut found = Vec::new();
        self.collect_related_into(&mut found);
        found
    }

    fn collect_related_into<'a>(&'a self, found: &mut Vec<RelatedRef<'a>>) {
        match self {
            WhereNode::Related {
                relationship,
                direction,
                related_class,
                criteria,
            } => {
                found.push(RelatedRef {
                    relationship,
                    direction: *direction,
                    related_class,
                    criteria,
                });
            }
            WhereNode::Group { items } => {
                for item in items {
                    item.criteria.collect_related_into(found);
                }
            }
            WhereNode::Comparison { .. } | WhereNode::IdSet { .. } => {}
        }
    }

    /// Deepest nesting of related criteria in the tree.
    pub fn related_depth(&self) -> usize {
        match self {
            WhereNode::Related { criteria, .. } => 1 + criteria.related_depth(),
            WhereNode::Group { items } => items
                .iter()
                .map(|item| item.criteria.related_depth())
                .max()
                .unwrap_or(0),
            WhereNode::Comparison { .. } | WhereNode::IdSet { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_comparison() {
        let json = r#"{"type":"comparison","property":"Name","operator":"like","value":"A%"}"#;
        let node: WhereNode = serde_json::from_str(json).unwrap();
        assert_eq!(
            node,
            WhereNode::Comparison {
                property: "Name".to_string(),
                operator: RelationalOperator::Like,
                value: PropertyValue::Str("A%".to_string()),
            }
        );
    }

    #[test]
    fn test_wire_shape_null_check_omits_value() {
        let json = r#"{"type":"comparison","property":"Name","operator":"isNull"}"#;
        let node: WhereNode = serde_json::from_str(json).unwrap();
        match node {
            WhereNode::Comparison { operator, value, .. } => {
                assert_eq!(operator, RelationalOperator::IsNull);
                assert!(value.is_null());
            }
            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn test_wire_shape_related_group() {
        let json = r#"{
            "type": "group",
            "items": [
                {"operator": "and", "criteria": {"type": "idSet", "ids": ["1", "2"]}},
                {"operator": "or", "criteria": {
                    "type": "related",
                    "relationship": "StationDatasets",
                    "direction": "forward",
                    "class": "Dataset",
                    "criteria": {"type": "comparison", "property": "Title", "operator": "eq", "value": "Flows"}
                }}
            ]
        }"#;
        let node: WhereNode = serde_json::from_str(json).unwrap();
        let related = node.collect_related();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].relationship, "StationDatasets");
        assert_eq!(related[0].related_class, "Dataset");
        assert_eq!(node.related_depth(), 1);
    }

    #[test]
    fn test_as_id_set_unwraps_single_item_groups() {
        let ids = WhereNode::IdSet {
            ids: vec!["7".to_string()],
        };
        assert_eq!(ids.as_id_set(), Some(&["7".to_string()][..]));

        let wrapped = WhereNode::and_group(vec![ids.clone()]);
        assert_eq!(wrapped.as_id_set(), Some(&["7".to_string()][..]));

        let two = WhereNode::and_group(vec![
            ids.clone(),
            WhereNode::Comparison {
                property: "Name".to_string(),
                operator: RelationalOperator::Eq,
                value: PropertyValue::Str("x".to_string()),
            },
        ]);
        assert!(two.as_id_set().is_none());
    }

    #[test]
    fn test_find_id_set_scans_groups_but_not_related() {
        let mixed = WhereNode::and_group(vec![
            WhereNode::Comparison {
                property: "Name".to_string(),
                operator: RelationalOperator::Like,
                value: PropertyValue::Str("A%".to_string()),
            },
            WhereNode::IdSet {
                ids: vec!["4".to_string()],
            },
        ]);
        assert_eq!(mixed.find_id_set(), Some(&["4".to_string()][..]));

        let scoped = WhereNode::Related {
            relationship: "StationDatasets".to_string(),
            direction: Direction::Forward,
            related_class: "Dataset".to_string(),
            criteria: Box::new(WhereNode::IdSet {
                ids: vec!["9".to_string()],
            }),
        };
        assert!(scoped.find_id_set().is_none());
    }

    #[test]
    fn test_related_depth_nesting() {
        let inner = WhereNode::Related {
            relationship: "DatasetSource".to_string(),
            direction: Direction::Forward,
            related_class: "Source".to_string(),
            criteria: Box::new(WhereNode::IdSet {
                ids: vec!["1".to_string()],
            }),
        };
        let outer = WhereNode::Related {
            relationship: "StationDatasets".to_string(),
            direction: Direction::Forward,
            related_class: "Dataset".to_string(),
            criteria: Box::new(inner),
        };
        assert_eq!(outer.related_depth(), 2);
    }
}
