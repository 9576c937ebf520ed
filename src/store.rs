//! Driver seam for the relational store. The federation layer only
//! ever sees these traits; the concrete driver lives behind them so
//! tests can substitute canned result sets. Literals never reach the
//! store as SQL text, every one travels in the parameter list.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::sql_compiler::QueryParam;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store connection failed: {0}")]
    Connection(String),
    #[error("Statement failed: {0}")]
    Execution(String),
    #[error("Result shape mismatch: {0}")]
    UnexpectedShape(String),
}

/// One database cell. Rows are positional and follow the compiled
/// select-list order.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            SqlValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(i64::from(*i)),
            SqlValue::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            SqlValue::Int(i) => Some(f64::from(*i)),
            SqlValue::Long(l) => Some(*l as f64),
            SqlValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Bit columns come back as 0/1 integers from some drivers
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(b) => Some(*b),
            SqlValue::Int(0) | SqlValue::Long(0) => Some(false),
            SqlValue::Int(1) | SqlValue::Long(1) => Some(true),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Identifier rendering. Ids travel as text regardless of the key
    /// column's native type.
    pub fn to_id_string(&self) -> Option<String> {
        match self {
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Int(i) => Some(i.to_string()),
            SqlValue::Long(l) => Some(l.to_string()),
            _ => None,
        }
    }
}

pub type SqlRow = Vec<SqlValue>;

/// A statement with its bound parameters. The cache writer queues
/// these in pairs (delete then insert) per instance.
#[derive(Debug, Clone)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>, params: Vec<QueryParam>) -> Self {
        SqlStatement {
            sql: sql.into(),
            params,
        }
    }
}

/// Forward-only cursor over a query result. Starts positioned before
/// the first row.
#[async_trait]
pub trait RowSet: Send {
    /// Advance to the next row. False once the set is exhausted.
    async fn advance(&mut self) -> Result<bool, StoreError>;

    /// Value of the current row at the given column index.
    fn value(&self, index: usize) -> Result<SqlValue, StoreError>;

    /// Number of columns per row.
    fn width(&self) -> usize;
}

#[async_trait]
pub trait SqlStore: Send + Sync {
    /// Run a row query and return a forward-only cursor.
    async fn query(
        &self,
        sql: &str,
        params: &[QueryParam],
    ) -> Result<Box<dyn RowSet>, StoreError>;

    /// Run a write statement, returning rows affected.
    async fn execute(&self, sql: &str, params: &[QueryParam]) -> Result<u64, StoreError>;

    /// Run a count query and return its single scalar.
    async fn query_count(&self, sql: &str, params: &[QueryParam]) -> Result<i64, StoreError> {
        let mut rows = self.query(sql, params).await?;
        if !rows.advance().await? {
            return Err(StoreError::UnexpectedShape(
                "count query returned no rows".to_string(),
            ));
        }
        rows.value(0)?.as_long().ok_or_else(|| {
            StoreError::UnexpectedShape("count query returned a non-integer value".to_string())
        })
    }

    /// Execute statements in order, returning total rows affected.
    async fn execute_all(&self, statements: &[SqlStatement]) -> Result<u64, StoreError> {
        let mut total = 0;
        for statement in statements {
            total += self.execute(&statement.sql, &statement.params).await?;
        }
        Ok(total)
    }
}

/// Materialized rows adapted to the forward-only interface. Drivers
/// that buffer whole result bodies wrap them in this.
pub struct VecRowSet {
    rows: Vec<SqlRow>,
    cursor: Option<usize>,
}

impl VecRowSet {
    pub fn new(rows: Vec<SqlRow>) -> Self {
        VecRowSet { rows, cursor: None }
    }
}

#[async_trait]
impl RowSet for VecRowSet {
    async fn advance(&mut self) -> Result<bool, StoreError> {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next < self.rows.len() {
            self.cursor = Some(next);
            Ok(true)
        } else {
            self.cursor = Some(self.rows.len());
            Ok(false)
        }
    }

    fn value(&self, index: usize) -> Result<SqlValue, StoreError> {
        let row = self
            .cursor
            .and_then(|c| self.rows.get(c))
            .ok_or_else(|| {
                StoreError::UnexpectedShape("cursor is not positioned on a row".to_string())
            })?;
        row.get(index).cloned().ok_or_else(|| {
            StoreError::UnexpectedShape(format!("column index {} out of range", index))
        })
    }

    fn width(&self) -> usize {
        self.rows.first().map_or(0, |r| r.len())
    }
}
