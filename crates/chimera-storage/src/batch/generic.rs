//! GenericBatchWriter — one-statement multi-row INSERT into any table.
//!
//! Rows are positional: every row must carry exactly one value per column.
//! Input is validated before any SQL is built, so a bad call never reaches
//! the database.

use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::ToSql;
use tracing::debug;

use chimera_core::config::BatchWriterConfig;
use chimera_core::errors::{StoreError, StoreResult};

use super::statement;
use crate::context::Context;
use crate::pool::{ConnectionPool, Executor};

pub struct GenericBatchWriter {
    pool: Arc<ConnectionPool>,
    config: BatchWriterConfig,
}

impl GenericBatchWriter {
    pub fn new(pool: Arc<ConnectionPool>, config: BatchWriterConfig) -> Self {
        Self {
            pool,
            config: config.normalized(),
        }
    }

    /// Rows of `column_count` values that one call accepts.
    pub fn max_rows_per_statement(column_count: usize) -> usize {
        statement::max_rows_per_statement(column_count)
    }

    /// Insert `rows` into `table` in one statement. Returns rows affected.
    pub fn insert_batch<S: AsRef<str>>(
        &self,
        ctx: &Context,
        table: &str,
        columns: &[S],
        rows: &[Vec<Value>],
    ) -> StoreResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let sql = build(table, columns, rows, None)?;
        let params = flatten(rows);
        let ctx = ctx.child_with_timeout(self.config.insert_timeout);

        let affected = self
            .pool
            .exec(&ctx, &sql, params.as_slice())
            .map_err(|e| batch_error(rows.len(), e))?;
        debug!(table, rows = rows.len(), affected, "generic batch inserted");
        Ok(affected)
    }

    /// Insert `rows` and collect `returning` for each new row, in input order.
    pub fn insert_batch_returning<S: AsRef<str>>(
        &self,
        ctx: &Context,
        table: &str,
        columns: &[S],
        rows: &[Vec<Value>],
        returning: &str,
    ) -> StoreResult<Vec<i64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        statement::validate_identifier(returning)?;
        let sql = build(table, columns, rows, Some(returning))?;
        let params = flatten(rows);
        let ctx = ctx.child_with_timeout(self.config.insert_timeout);

        let ids = self
            .pool
            .query(&ctx, &sql, params.as_slice(), |row| row.get::<_, i64>(0))
            .map_err(|e| batch_error(rows.len(), e))?;
        debug!(table, rows = rows.len(), "generic batch inserted with returning");
        Ok(ids)
    }
}

/// Validate names and row widths, then build the statement.
fn build<S: AsRef<str>>(
    table: &str,
    columns: &[S],
    rows: &[Vec<Value>],
    returning: Option<&str>,
) -> StoreResult<String> {
    statement::validate_identifier(table)?;
    if columns.is_empty() {
        return Err(StoreError::EmptyColumns);
    }
    for column in columns {
        statement::validate_identifier(column.as_ref())?;
    }

    let expected = columns.len();
    if let Some((row, values)) = rows.iter().enumerate().find(|(_, v)| v.len() != expected) {
        return Err(StoreError::RowLength {
            row,
            got: values.len(),
            expected,
        });
    }

    let params = rows.len() * expected;
    if params > statement::MAX_PARAMETERS {
        return Err(StoreError::TooManyParameters {
            params,
            limit: statement::MAX_PARAMETERS,
        });
    }

    Ok(statement::multi_row_insert(table, columns, rows.len(), returning))
}

fn flatten(rows: &[Vec<Value>]) -> Vec<&dyn ToSql> {
    rows.iter()
        .flat_map(|row| row.iter().map(|v| v as &dyn ToSql))
        .collect()
}

fn batch_error(rows: usize, source: StoreError) -> StoreError {
    StoreError::BatchInsert {
        rows,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(widths: &[usize]) -> Vec<Vec<Value>> {
        widths
            .iter()
            .map(|&w| (0..w).map(|i| Value::Integer(i as i64)).collect())
            .collect()
    }

    #[test]
    fn mismatched_row_is_named() {
        let err = build("payouts", &["user_id", "amount"], &rows(&[2, 2, 1]), None).unwrap_err();
        match err {
            StoreError::RowLength { row, got, expected } => {
                assert_eq!((row, got, expected), (2, 1, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_columns_rejected() {
        let columns: [&str; 0] = [];
        let err = build("payouts", &columns, &rows(&[0]), None).unwrap_err();
        assert!(matches!(err, StoreError::EmptyColumns));
    }

    #[test]
    fn injection_in_names_rejected() {
        let err = build("payouts; DROP TABLE x", &["a"], &rows(&[1]), None).unwrap_err();
        assert!(matches!(err, StoreError::InvalidIdentifier(_)));
        let err = build("payouts", &["a)"], &rows(&[1]), None).unwrap_err();
        assert!(matches!(err, StoreError::InvalidIdentifier(_)));
    }

    #[test]
    fn parameter_budget_enforced() {
        let width = 2;
        let too_many = statement::max_rows_per_statement(width) + 1;
        let rows: Vec<Vec<Value>> = vec![vec![Value::Null, Value::Null]; too_many];
        let err = build("t", &["a", "b"], &rows, None).unwrap_err();
        assert!(matches!(err, StoreError::TooManyParameters { .. }));
    }
}
