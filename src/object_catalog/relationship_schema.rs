use serde::{Deserialize, Serialize};
use std::fmt;

/// Traversal direction of a relationship criterion. Forward runs from
/// the container class to the contained class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// The same edge seen from the other end.
    pub fn invert(self) -> Direction {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Backward => f.write_str("backward"),
        }
    }
}

/// Physical join shape of a relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelationshipKeys {
    /// Foreign-key pair between the two class tables
    Direct {
        container_column: String,
        contained_column: String,
    },
    /// Intermediate link table with four key columns
    ManyToMany {
        link_table: String,
        container_column: String,
        link_container_column: String,
        link_contained_column: String,
        contained_column: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSchema {
    pub name: String,
    pub container_class: String,
    pub contained_class: String,
    pub keys: RelationshipKeys,
}

impl RelationshipSchema {
    /// Class on the starting side of a traversal.
    pub fn near_class(&self, direction: Direction) -> &str {
        match direction {
            Direction::Forward => &self.container_class,
            Direction::Backward => &self.contained_class,
        }
    }

    /// Class on the far side of a traversal.
    pub fn far_class(&self, direction: Direction) -> &str {
        match direction {
            Direction::Forward => &self.contained_class,
            Direction::Backward => &self.container_class,
        }
    }

    /// Join columns for a direct relationship, ordered (near, far) for
    /// the given traversal direction.
    pub fn direct_columns(&self, direction: Direction) -> Option<(&str, &str)> {
        match (&self.keys, direction) {
            (
                RelationshipKeys::Direct {
                    container_column,
                    contained_column,
                },
                Direction::Forward,
            ) => Some((container_column, contained_column)),
            (
                RelationshipKeys::Direct {
                    container_column,
                    contained_column,
                },
                Direction::Backward,
            ) => Some((contained_column, container_column)),
            _ => None,
        }
    }

    /// Link-table join columns for a many-to-many relationship, ordered
    /// (near, link-near, link-far, far) for the given direction.
    pub fn many_to_many_columns(&self, direction: Direction) -> Option<(&str, &str, &str, &str)> {
        match &self.keys {
            RelationshipKeys::ManyToMany {
                container_column,
                link_container_column,
                link_contained_column,
                contained_column,
                ..
            } => match direction {
                Direction::Forward => Some((
                    container_column,
                    link_container_column,
                    link_contained_column,
                    contained_column,
                )),
                Direction::Backward => Some((
                    contained_column,
                    link_contained_column,
                    link_container_column,
                    container_column,
                )),
            },
            RelationshipKeys::Direct { .. } => None,
        }
    }

    pub fn link_table(&self) -> Option<&str> {
        match &self.keys {
            RelationshipKeys::ManyToMany { link_table, .. } => Some(link_table),
            RelationshipKeys::Direct { .. } => None,
        }
    }
}
