pub mod instance;
pub mod query;
pub mod value;
pub mod where_tree;

// Re-export commonly used types
pub use instance::{ObjectInstance, RelationEdge};
pub use query::{
    AbstractQuery, LogicalOperator, OrderBy, RelationalOperator, EXTENDED_COMPLETE,
    EXTENDED_FORMAT, EXTENDED_INSTANCE_COUNT, EXTENDED_POLYGON, EXTENDED_SOURCE_TAG,
};
pub use value::PropertyValue;
pub use where_tree::{GroupItem, RelatedRef, WhereNode};
