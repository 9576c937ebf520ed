use serde::Serialize;
use std::fmt;

use crate::object_catalog::PropertyType;
use crate::query_model::RelationalOperator;

use super::errors::CompileError;

/// Native database types the store understands. Parameters are declared
/// with one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NativeDbType {
    String,
    Double,
    Boolean,
    Int32,
    Int64,
    DateTime,
}

impl fmt::Display for NativeDbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeDbType::String => f.write_str("String"),
            NativeDbType::Double => f.write_str("Double"),
            NativeDbType::Boolean => f.write_str("Boolean"),
            NativeDbType::Int32 => f.write_str("Int32"),
            NativeDbType::Int64 => f.write_str("Int64"),
            NativeDbType::DateTime => f.write_str("DateTime"),
        }
    }
}

/// SQL token for an abstract comparison operator. The spatial operators
/// are rejected here: spatial predicates are emitted by the dedicated
/// polygon builder call, never as a generic comparison.
pub fn sql_operator_token(operator: RelationalOperator) -> Result<&'static str, CompileError> {
    match operator {
        RelationalOperator::Eq => Ok("="),
        RelationalOperator::Ne => Ok("<>"),
        RelationalOperator::Gt => Ok(">"),
        RelationalOperator::GtEq => Ok(">="),
        RelationalOperator::Lt => Ok("<"),
        RelationalOperator::LtEq => Ok("<="),
        RelationalOperator::Like => Ok("LIKE"),
        RelationalOperator::NotLike => Ok("NOT LIKE"),
        RelationalOperator::In => Ok("IN"),
        RelationalOperator::NotIn => Ok("NOT IN"),
        RelationalOperator::IsNull => Ok("IS NULL"),
        RelationalOperator::IsNotNull => Ok("IS NOT NULL"),
        RelationalOperator::Intersects | RelationalOperator::Within => Err(
            CompileError::UnsupportedOperator(operator.to_string()),
        ),
    }
}

/// Native database type for a declared property type. Geometry, struct
/// and point properties have no scalar column form; hitting one here is
/// a schema-authoring mistake.
pub fn native_db_type(property_type: PropertyType) -> Result<NativeDbType, CompileError> {
    match property_type {
        PropertyType::String => Ok(NativeDbType::String),
        PropertyType::Double => Ok(NativeDbType::Double),
        PropertyType::Boolean => Ok(NativeDbType::Boolean),
        PropertyType::Int => Ok(NativeDbType::Int32),
        PropertyType::Long => Ok(NativeDbType::Int64),
        PropertyType::DateTime => Ok(NativeDbType::DateTime),
        PropertyType::Geometry | PropertyType::Struct | PropertyType::Point => Err(
            CompileError::UnsupportedType(property_type.to_string()),
        ),
    }
}
