pub mod compiler;
pub mod errors;
pub mod params;
pub mod query_builder;
pub mod table_ref;
pub mod type_mapping;

// Re-export commonly used types
pub use compiler::{
    CompiledQuery, CompilerOptions, MetaColumn, QueryCompiler, SelectColumn, SelectColumnKind,
    SelectLayout, CACHE_COMPLETE_COLUMN, CACHE_SOURCE_TAG_COLUMN,
};
pub use errors::CompileError;
pub use params::{ParamMap, QueryParam};
pub use query_builder::{BindingMode, Paging, SqlQueryBuilder};
pub use table_ref::{AliasGenerator, ParentJoin, TableRef};
pub use type_mapping::{native_db_type, sql_operator_token, NativeDbType};
