//! Sink writers for the warehouse and staging destinations
//!
//! One record per call, no internal batching: checkpoint granularity and
//! write granularity are the same, so a crash can never leave the offset
//! ahead of what the sink durably holds.

use async_trait::async_trait;
use ldp_common::{PipelineError, Result};
use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

use crate::transform::{DS_FIELD, LOG_FIELD};

/// Warehouse table for transformed records.
pub const LOGS_TABLE: &str = "logs";

/// Staging table for raw `{ds, log}` pairs.
pub const STAGING_TABLE: &str = "logs_staged";

/// Destination boundary: durably store one record.
#[async_trait]
pub trait SinkWriter: Send + Sync {
    /// Write a single record. A failure aborts the run's reading loop
    /// exactly like a transform failure.
    async fn write(&self, record: &Map<String, Value>) -> Result<()>;
}

#[async_trait]
impl<T: SinkWriter + ?Sized> SinkWriter for Arc<T> {
    async fn write(&self, record: &Map<String, Value>) -> Result<()> {
        self.as_ref().write(record).await
    }
}

/// Warehouse sink: one row per transformed record in `logs`.
///
/// The column list is built from the record keys, so lines may carry any
/// subset of the provisioned columns.
pub struct PgSinkWriter {
    pool: PgPool,
}

impl PgSinkWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SinkWriter for PgSinkWriter {
    async fn write(&self, record: &Map<String, Value>) -> Result<()> {
        let mut statement = insert_statement(LOGS_TABLE, record)?;
        statement
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| PipelineError::sink_write(e.to_string()))?;
        Ok(())
    }
}

/// Staging sink: raw line plus datestamp into `logs_staged`.
pub struct PgStagingSink {
    pool: PgPool,
}

impl PgStagingSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SinkWriter for PgStagingSink {
    async fn write(&self, record: &Map<String, Value>) -> Result<()> {
        let ds = match record.get(DS_FIELD) {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(Value::Null) | None => None,
            Some(other) => {
                return Err(PipelineError::sink_write(format!(
                    "staging `{}` must be a string or null, got {}",
                    DS_FIELD, other
                )));
            },
        };
        let raw = record
            .get(LOG_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PipelineError::sink_write(format!("staging record is missing `{}`", LOG_FIELD))
            })?;

        sqlx::query("INSERT INTO logs_staged (ds, log) VALUES ($1::timestamptz, $2)")
            .bind(ds)
            .bind(raw)
            .execute(&self.pool)
            .await
            .map_err(|e| PipelineError::sink_write(e.to_string()))?;
        Ok(())
    }
}

/// Build a single-row INSERT with the record's keys as the column list.
fn insert_statement(
    table: &str,
    record: &Map<String, Value>,
) -> Result<QueryBuilder<'static, Postgres>> {
    if record.is_empty() {
        return Err(PipelineError::sink_write("record has no fields"));
    }

    let mut builder = QueryBuilder::new(format!("INSERT INTO {} (", table));
    {
        let mut columns = builder.separated(", ");
        for key in record.keys() {
            columns.push(format!("\"{}\"", checked_identifier(key)?));
        }
    }
    builder.push(") VALUES (");
    {
        let mut values = builder.separated(", ");
        for (key, value) in record {
            match value {
                Value::Null => {
                    values.push("NULL");
                },
                Value::Bool(b) => {
                    values.push_bind(*b);
                },
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        values.push_bind(i);
                    } else if let Some(f) = n.as_f64() {
                        values.push_bind(f);
                    } else {
                        return Err(PipelineError::sink_write(format!(
                            "number in field `{}` is not representable",
                            key
                        )));
                    }
                },
                Value::String(s) => {
                    values.push_bind(s.clone());
                    // The warehouse ds column is timestamptz; everything else
                    // string-typed is text-compatible.
                    if key == DS_FIELD {
                        values.push_unseparated("::timestamptz");
                    }
                },
                Value::Array(_) | Value::Object(_) => {
                    return Err(PipelineError::sink_write(format!(
                        "field `{}` is not a scalar",
                        key
                    )));
                },
            }
        }
    }
    builder.push(")");

    Ok(builder)
}

/// Column names come from log content, so restrict them to the characters
/// the provisioned schema uses before splicing into SQL.
fn checked_identifier(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(name)
    } else {
        Err(PipelineError::sink_write(format!(
            "invalid column name {:?}",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(line: &str) -> Map<String, Value> {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn test_insert_statement_quotes_columns() {
        // serde_json maps iterate in key order, so the statement is stable
        let builder = insert_statement(
            LOGS_TABLE,
            &record(r#"{"ClientHost":"10.0.0.1","DownstreamStatus":200}"#),
        )
        .unwrap();

        assert_eq!(
            builder.sql(),
            r#"INSERT INTO logs ("ClientHost", "DownstreamStatus") VALUES ($1, $2)"#
        );
    }

    #[test]
    fn test_insert_statement_casts_ds() {
        let builder =
            insert_statement(LOGS_TABLE, &record(r#"{"ds":"2026-08-07T10:00:00Z"}"#)).unwrap();
        assert_eq!(
            builder.sql(),
            r#"INSERT INTO logs ("ds") VALUES ($1::timestamptz)"#
        );
    }

    #[test]
    fn test_insert_statement_inlines_null() {
        let builder =
            insert_statement(LOGS_TABLE, &record(r#"{"RequestPath":null,"level":"info"}"#))
                .unwrap();
        assert_eq!(
            builder.sql(),
            r#"INSERT INTO logs ("RequestPath", "level") VALUES (NULL, $1)"#
        );
    }

    #[test]
    fn test_insert_statement_rejects_nested_values() {
        let err =
            insert_statement(LOGS_TABLE, &record(r#"{"ServiceURL":{"Scheme":"http"}}"#))
                .err()
                .unwrap();
        assert!(matches!(err, PipelineError::SinkWrite(_)));
    }

    #[test]
    fn test_insert_statement_rejects_empty_record() {
        let err = insert_statement(LOGS_TABLE, &Map::new()).err().unwrap();
        assert!(matches!(err, PipelineError::SinkWrite(_)));
    }

    #[test]
    fn test_identifier_rejects_quotes_and_spaces() {
        assert!(checked_identifier("ClientHost").is_ok());
        assert!(checked_identifier("entryPointName").is_ok());
        assert!(checked_identifier("").is_err());
        assert!(checked_identifier("bad\"name").is_err());
        assert!(checked_identifier("bad name").is_err());
        assert!(checked_identifier("bad;drop").is_err());
    }

    #[test]
    fn test_identifier_values_not_affected() {
        // values are bound, not spliced; hostile content stays data
        let builder = insert_statement(
            LOGS_TABLE,
            &record(r#"{"msg":"'); DROP TABLE logs; --"}"#),
        )
        .unwrap();
        assert_eq!(builder.sql(), r#"INSERT INTO logs ("msg") VALUES ($1)"#);
    }
}
