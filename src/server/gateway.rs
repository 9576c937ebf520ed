//! HTTP driver for the relational store. The store sits behind a small
//! SQL gateway that accepts one statement with named parameters and
//! answers in a JSONCompact-style envelope: `meta` declares column
//! names and types, `data` carries positional rows.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::sql_compiler::QueryParam;
use crate::store::{RowSet, SqlRow, SqlStore, SqlValue, StoreError, VecRowSet};

pub struct GatewaySqlStore {
    client: Client,
    base_url: String,
    user: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct QueryEnvelope {
    #[serde(default)]
    meta: Vec<ColumnMeta>,
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct ColumnMeta {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecEnvelope {
    rows_affected: u64,
}

impl GatewaySqlStore {
    pub fn new(
        base_url: impl Into<String>,
        user: Option<String>,
        password: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(GatewaySqlStore {
            client,
            base_url,
            user,
            password,
        })
    }

    async fn post(
        &self,
        path: &str,
        sql: &str,
        params: &[QueryParam],
    ) -> Result<reqwest::Response, StoreError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.client.post(&url).json(&serde_json::json!({
            "sql": sql,
            "parameters": params,
        }));
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Connection(format!("{}: {}", url, e)))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Execution(format!(
                "{} answered {}: {}",
                url, status, body
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl SqlStore for GatewaySqlStore {
    async fn query(
        &self,
        sql: &str,
        params: &[QueryParam],
    ) -> Result<Box<dyn RowSet>, StoreError> {
        debug!("Store query: {}", sql);
        let envelope: QueryEnvelope = self
            .post("query", sql, params)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::UnexpectedShape(e.to_string()))?;

        let mut rows: Vec<SqlRow> = Vec::with_capacity(envelope.data.len());
        for raw in &envelope.data {
            if raw.len() != envelope.meta.len() {
                return Err(StoreError::UnexpectedShape(format!(
                    "row has {} cells, meta declares {} columns",
                    raw.len(),
                    envelope.meta.len()
                )));
            }
            let mut row = Vec::with_capacity(raw.len());
            for (cell, column) in raw.iter().zip(&envelope.meta) {
                row.push(coerce_cell(cell, column)?);
            }
            rows.push(row);
        }
        Ok(Box::new(VecRowSet::new(rows)))
    }

    async fn execute(&self, sql: &str, params: &[QueryParam]) -> Result<u64, StoreError> {
        debug!("Store execute: {}", sql);
        let envelope: ExecEnvelope = self
            .post("exec", sql, params)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::UnexpectedShape(e.to_string()))?;
        Ok(envelope.rows_affected)
    }
}

/// One declared type name, lowercased with any `Nullable(...)` wrapper
/// removed, so `Nullable(Int64)` and `DateTime64(3)` resolve by prefix.
fn normalize_type(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    match lowered.strip_prefix("nullable(") {
        Some(inner) => inner.trim_end_matches(')').to_string(),
        None => lowered,
    }
}

fn coerce_cell(cell: &Value, column: &ColumnMeta) -> Result<SqlValue, StoreError> {
    if cell.is_null() {
        return Ok(SqlValue::Null);
    }
    let mismatch = || {
        StoreError::UnexpectedShape(format!(
            "column {} declared {} but carries {}",
            column.name, column.type_name, cell
        ))
    };
    let type_name = normalize_type(&column.type_name);

    if type_name.starts_with("datetime") || type_name.starts_with("timestamp") {
        let text = cell.as_str().ok_or_else(mismatch)?;
        return parse_datetime(text)
            .map(SqlValue::DateTime)
            .ok_or_else(mismatch);
    }
    if type_name.starts_with("bool") || type_name == "bit" {
        return match cell {
            Value::Bool(b) => Ok(SqlValue::Bool(*b)),
            Value::Number(n) if n.as_i64() == Some(0) => Ok(SqlValue::Bool(false)),
            Value::Number(n) if n.as_i64() == Some(1) => Ok(SqlValue::Bool(true)),
            _ => Err(mismatch()),
        };
    }
    if type_name.starts_with("float")
        || type_name.starts_with("double")
        || type_name.starts_with("decimal")
        || type_name.starts_with("real")
    {
        return cell.as_f64().map(SqlValue::Double).ok_or_else(mismatch);
    }
    if type_name.starts_with("int")
        || type_name.starts_with("uint")
        || type_name.starts_with("bigint")
        || type_name.starts_with("smallint")
        || type_name.starts_with("tinyint")
    {
        // 64-bit values arrive quoted in JSON
        let number = match cell {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(mismatch)?;
        return Ok(match i32::try_from(number) {
            Ok(small) => SqlValue::Int(small),
            Err(_) => SqlValue::Long(number),
        });
    }
    if type_name.starts_with("string")
        || type_name.starts_with("varchar")
        || type_name.starts_with("nvarchar")
        || type_name.starts_with("char")
        || type_name.starts_with("text")
        || type_name.starts_with("uuid")
    {
        return cell
            .as_str()
            .map(|s| SqlValue::Text(s.to_string()))
            .ok_or_else(mismatch);
    }

    // Unknown declared type: fall back on the JSON shape
    match cell {
        Value::Bool(b) => Ok(SqlValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(SqlValue::Long(i)),
            None => n.as_f64().map(SqlValue::Double).ok_or_else(mismatch),
        },
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        _ => Err(mismatch()),
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}
