//! GenericBatchWriter tests against a payouts-style table.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use rusqlite::types::Value;

use chimera_core::config::{BatchWriterConfig, PoolConfig};
use chimera_core::errors::{ErrorKind, StoreError};
use chimera_storage::batch::statement;
use chimera_storage::pool::{ConnectionPool, Executor};
use chimera_storage::{Context, GenericBatchWriter};

fn setup() -> (tempfile::TempDir, Arc<ConnectionPool>, GenericBatchWriter) {
    let dir = tempfile::tempdir().unwrap();
    let pool = Arc::new(ConnectionPool::open(PoolConfig::new(dir.path().join("generic.db"))).unwrap());
    pool.exec(
        &Context::background(),
        "CREATE TABLE payouts (
             id       INTEGER PRIMARY KEY,
             user_id  INTEGER NOT NULL,
             amount   INTEGER NOT NULL CHECK (amount >= 0)
         )",
        [],
    )
    .unwrap();
    let writer = GenericBatchWriter::new(Arc::clone(&pool), BatchWriterConfig::default());
    (dir, pool, writer)
}

fn payout(user_id: i64, amount: i64) -> Vec<Value> {
    vec![Value::Integer(user_id), Value::Integer(amount)]
}

fn payouts(pool: &ConnectionPool) -> Vec<(i64, i64, i64)> {
    pool.query(
        &Context::background(),
        "SELECT id, user_id, amount FROM payouts ORDER BY id",
        [],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )
    .unwrap()
}

#[test]
fn gw_01_insert_batch_reports_affected_rows() {
    let (_dir, pool, writer) = setup();
    let affected = writer
        .insert_batch(
            &Context::background(),
            "payouts",
            &["user_id", "amount"],
            &[payout(1, 100), payout(2, 200), payout(3, 300)],
        )
        .unwrap();
    assert_eq!(affected, 3);
    let rows = payouts(&pool);
    assert_eq!(rows.iter().map(|r| (r.1, r.2)).collect::<Vec<_>>(), [(1, 100), (2, 200), (3, 300)]);
}

#[test]
fn gw_02_returning_yields_ids_in_input_order() {
    let (_dir, pool, writer) = setup();
    let ids = writer
        .insert_batch_returning(
            &Context::background(),
            "payouts",
            &["user_id", "amount"],
            &[payout(1, 100), payout(2, 200)],
            "id",
        )
        .unwrap();

    assert_eq!(ids.len(), 2);
    let rows = payouts(&pool);
    assert_eq!(ids, rows.iter().map(|r| r.0).collect::<Vec<_>>());
    assert_eq!((rows[0].1, rows[1].1), (1, 2));
}

#[test]
fn gw_03_row_mismatch_names_row_and_touches_nothing() {
    let (_dir, pool, writer) = setup();
    let err = writer
        .insert_batch(
            &Context::background(),
            "payouts",
            &["user_id", "amount"],
            &[payout(1, 100), vec![Value::Integer(2)], payout(3, 300)],
        )
        .unwrap_err();

    assert!(matches!(err, StoreError::RowLength { row: 1, got: 1, expected: 2 }));
    assert!(err.to_string().contains("row 1"));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(payouts(&pool).is_empty());
}

#[test]
fn gw_04_row_mismatch_rejected_even_when_pool_is_closed() {
    let (_dir, pool, writer) = setup();
    pool.close();
    let err = writer
        .insert_batch(
            &Context::background(),
            "payouts",
            &["user_id", "amount"],
            &[vec![Value::Null, Value::Null, Value::Null]],
        )
        .unwrap_err();
    // Validation runs before any checkout.
    assert!(matches!(err, StoreError::RowLength { row: 0, .. }));
}

#[test]
fn gw_05_empty_rows_is_a_no_op() {
    let (_dir, pool, writer) = setup();
    pool.close();
    let ctx = Context::background();
    assert_eq!(writer.insert_batch(&ctx, "payouts", &["user_id"], &[]).unwrap(), 0);
    assert!(writer
        .insert_batch_returning(&ctx, "payouts", &["user_id"], &[], "id")
        .unwrap()
        .is_empty());
}

#[test]
fn gw_06_statement_is_atomic() {
    let (_dir, pool, writer) = setup();
    let err = writer
        .insert_batch(
            &Context::background(),
            "payouts",
            &["user_id", "amount"],
            &[payout(1, 100), payout(2, -5)],
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::BatchInsert { rows: 2, .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::BatchExecution);
    assert!(payouts(&pool).is_empty());
}

#[test]
fn gw_07_names_must_be_identifiers() {
    let (_dir, _pool, writer) = setup();
    let ctx = Context::background();
    let rows = [payout(1, 1)];

    let err = writer
        .insert_batch(&ctx, "payouts; DROP TABLE payouts", &["user_id", "amount"], &rows)
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidIdentifier(_)));

    let err = writer
        .insert_batch_returning(&ctx, "payouts", &["user_id", "amount"], &rows, "id; --")
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidIdentifier(_)));
}

#[test]
fn gw_08_oversized_batch_rejected_before_execution() {
    let (_dir, pool, writer) = setup();
    let limit = GenericBatchWriter::max_rows_per_statement(2);
    let rows: Vec<Vec<Value>> = (0..=limit as i64).map(|i| payout(i, 1)).collect();

    let err = writer
        .insert_batch(&Context::background(), "payouts", &["user_id", "amount"], &rows)
        .unwrap_err();
    assert!(matches!(err, StoreError::TooManyParameters { .. }));

    let fits = &rows[..limit];
    let affected = writer
        .insert_batch(&Context::background(), "payouts", &["user_id", "amount"], fits)
        .unwrap();
    assert_eq!(affected, limit);
    assert_eq!(payouts(&pool).len(), limit);
}

#[test]
fn gw_09_cancelled_context_is_respected() {
    let (_dir, pool, writer) = setup();
    let ctx = Context::with_timeout(Duration::from_secs(5));
    ctx.cancel();
    let err = writer
        .insert_batch(&ctx, "payouts", &["user_id", "amount"], &[payout(1, 1)])
        .unwrap_err();
    assert!(matches!(err, StoreError::BatchInsert { .. }));
    assert!(payouts(&pool).is_empty());
}

proptest! {
    #[test]
    fn prop_statement_has_one_placeholder_per_value(cols in 1usize..6, rows in 1usize..20) {
        let columns: Vec<String> = (0..cols).map(|i| format!("c{i}")).collect();
        let sql = statement::multi_row_insert("t", &columns, rows, None);
        let placeholders = sql.matches('$').count();
        prop_assert_eq!(placeholders, cols * rows);
        let last = format!("${})", cols * rows);
        prop_assert!(sql.ends_with(&last));
    }
}
