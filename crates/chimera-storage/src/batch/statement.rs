//! Multi-row INSERT statement construction.
//!
//! Produces one statement per batch:
//! `INSERT INTO t (a, b) VALUES ($1, $2), ($3, $4) [RETURNING expr]`.
//! SQLite numbers `$N` parameters by first appearance, so positional binding
//! lines up with the placeholder numbers.

use std::fmt::Write as _;

use chimera_core::errors::{StoreError, StoreResult};

/// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER` for bundled builds.
pub const MAX_PARAMETERS: usize = 32_766;

/// Build the multi-row INSERT for `rows` rows over `columns`.
pub fn multi_row_insert<S: AsRef<str>>(
    table: &str,
    columns: &[S],
    rows: usize,
    returning: Option<&str>,
) -> String {
    let width = columns.len();
    let mut sql = String::with_capacity(32 + table.len() + width * 12 + rows * width * 7);

    sql.push_str("INSERT INTO ");
    sql.push_str(table);
    sql.push_str(" (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(column.as_ref());
    }
    sql.push_str(") VALUES ");

    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for col in 0..width {
            if col > 0 {
                sql.push_str(", ");
            }
            let _ = write!(sql, "${}", row * width + col + 1);
        }
        sql.push(')');
    }

    if let Some(expr) = returning {
        sql.push_str(" RETURNING ");
        sql.push_str(expr);
    }
    sql
}

/// Rows of `column_count` values that fit in one statement.
pub fn max_rows_per_statement(column_count: usize) -> usize {
    if column_count == 0 {
        0
    } else {
        MAX_PARAMETERS / column_count
    }
}

/// Accept `name` or `schema.name`, each part `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_identifier(name: &str) -> StoreResult<()> {
    let mut parts = name.split('.');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(a), None, None) => is_plain_identifier(a),
        (Some(a), Some(b), None) => is_plain_identifier(a) && is_plain_identifier(b),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

fn is_plain_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
