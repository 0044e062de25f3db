//! In-memory reference backends for the three collaborator seams.
//!
//! These carry the real contract semantics (ordered range scans with
//! inclusive/exclusive bounds, transactional commit/rollback, the batch-id
//! sentinel) so the integration suites and local runs exercise the engine
//! against honest collaborators. Each backend has fault toggles for
//! outage and failure-path testing.

use std::collections::HashMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use im::OrdMap;
use parking_lot::Mutex;

use crate::catalog::{ColumnGroup, RowSet, Value};
use crate::error::BasinError;
use crate::storage::store::{Cell, ColumnStore, StoredRow};
use crate::sync::{WarehouseClient, WarehouseTx};
use crate::upstream::SourceClient;

type CellKey = (ColumnGroup, String);

/// Ordered column-family store over opaque byte keys.
#[derive(Debug, Default)]
pub struct MemoryColumnStore {
    rows: Mutex<OrdMap<Vec<u8>, OrdMap<CellKey, Value>>>,
    unavailable: AtomicBool,
}

impl MemoryColumnStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `StoreUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    fn check_available(&self) -> Result<(), BasinError> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(BasinError::StoreUnavailable {
                message: "memory column store marked unavailable".into(),
            });
        }
        Ok(())
    }
}

impl ColumnStore for MemoryColumnStore {
    fn put(&self, key: &[u8], cells: Vec<Cell>) -> Result<(), BasinError> {
        self.check_available()?;
        let mut rows = self.rows.lock();
        let mut stored = rows.get(key).cloned().unwrap_or_default();
        for cell in cells {
            // Max versions = 1: the new value replaces the old in place.
            stored.insert((cell.group, cell.qualifier), cell.value);
        }
        rows.insert(key.to_vec(), stored);
        Ok(())
    }

    fn scan_page(
        &self,
        start: &[u8],
        stop: &[u8],
        limit: usize,
    ) -> Result<Vec<StoredRow>, BasinError> {
        self.check_available()?;
        let rows = self.rows.lock();
        let page = rows
            .range((
                Bound::Included(start.to_vec()),
                Bound::Excluded(stop.to_vec()),
            ))
            .take(limit)
            .map(|(key, cells)| StoredRow {
                key: key.clone(),
                cells: cells
                    .iter()
                    .map(|((group, qualifier), value)| {
                        Cell::new(*group, qualifier.clone(), value.clone())
                    })
                    .collect(),
            })
            .collect();
        Ok(page)
    }
}

/// Scripted upstream source: a settable maximum batch id and one canned
/// query result. Records every executed query text.
#[derive(Debug, Default)]
pub struct MemorySource {
    max_batch_id: Mutex<u64>,
    result: Mutex<RowSet>,
    executed: Mutex<Vec<String>>,
    unavailable: AtomicBool,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_max_batch_id(&self, batch_id: u64) {
        *self.max_batch_id.lock() = batch_id;
    }

    pub fn set_query_result(&self, rows: RowSet) {
        *self.result.lock() = rows;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    pub fn executed_queries(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    fn check_available(&self) -> Result<(), BasinError> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(BasinError::UpstreamUnavailable {
                message: "memory source marked unavailable".into(),
            });
        }
        Ok(())
    }
}

impl SourceClient for MemorySource {
    fn execute_query(&self, text: &str) -> Result<RowSet, BasinError> {
        self.check_available()?;
        self.executed.lock().push(text.to_string());
        Ok(self.result.lock().clone())
    }

    fn max_batch_id(&self, _table: &str) -> Result<u64, BasinError> {
        self.check_available()?;
        Ok(*self.max_batch_id.lock())
    }
}

type WarehouseRow = HashMap<String, Value>;
type WarehouseState = HashMap<String, Vec<WarehouseRow>>;

/// Transactional warehouse with committed state and a per-transaction
/// working copy, so commit and rollback have real effects.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    committed: Mutex<WarehouseState>,
    begun: AtomicUsize,
    fail_insert: AtomicBool,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_insert(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::Release);
    }

    pub fn fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::Release);
    }

    pub fn fail_rollback(&self, fail: bool) {
        self.fail_rollback.store(fail, Ordering::Release);
    }

    pub fn transactions_begun(&self) -> usize {
        self.begun.load(Ordering::Acquire)
    }

    /// Committed rows in `table` tagged with `batch_id`.
    pub fn rows_for(&self, table: &str, batch_column: &str, batch_id: u64) -> usize {
        self.committed
            .lock()
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        row.get(batch_column)
                            .and_then(Value::as_integer)
                            .is_some_and(|v| v == batch_id as i64)
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn table_len(&self, table: &str) -> usize {
        self.committed
            .lock()
            .get(table)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl WarehouseClient for MemoryWarehouse {
    fn begin(&self) -> Result<Box<dyn WarehouseTx + '_>, BasinError> {
        self.begun.fetch_add(1, Ordering::AcqRel);
        let working = self.committed.lock().clone();
        Ok(Box::new(MemoryWarehouseTx {
            warehouse: self,
            working,
        }))
    }
}

struct MemoryWarehouseTx<'a> {
    warehouse: &'a MemoryWarehouse,
    working: WarehouseState,
}

impl WarehouseTx for MemoryWarehouseTx<'_> {
    fn delete_batch(
        &mut self,
        table: &str,
        batch_column: &str,
        batch_id: u64,
    ) -> Result<u64, BasinError> {
        let Some(rows) = self.working.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| {
            row.get(batch_column)
                .and_then(Value::as_integer)
                .is_none_or(|v| v != batch_id as i64)
        });
        Ok((before - rows.len()) as u64)
    }

    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<u64, BasinError> {
        if self.warehouse.fail_insert.load(Ordering::Acquire) {
            return Err(BasinError::SinkConstraintViolation {
                table: table.to_string(),
                message: "scripted constraint violation".into(),
            });
        }
        let target = self.working.entry(table.to_string()).or_default();
        for row in rows {
            let mut stored = WarehouseRow::with_capacity(columns.len());
            for (column, value) in columns.iter().zip(row) {
                stored.insert(column.clone(), value.clone());
            }
            target.push(stored);
        }
        Ok(rows.len() as u64)
    }

    fn commit(self: Box<Self>) -> Result<(), BasinError> {
        if self.warehouse.fail_commit.load(Ordering::Acquire) {
            return Err(BasinError::StoreUnavailable {
                message: "connection lost before commit acknowledgement".into(),
            });
        }
        *self.warehouse.committed.lock() = self.working;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), BasinError> {
        if self.warehouse.fail_rollback.load(Ordering::Acquire) {
            return Err(BasinError::StoreUnavailable {
                message: "connection lost during rollback".into(),
            });
        }
        // Working copy is simply discarded.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryColumnStore, MemoryWarehouse};
    use crate::catalog::{ColumnGroup, Value};
    use crate::storage::store::{Cell, ColumnStore};
    use crate::sync::WarehouseClient;

    #[test]
    fn scan_page_respects_bounds_and_limit() {
        let store = MemoryColumnStore::new();
        for key in [b"a1", b"a2", b"a3", b"b1"] {
            store
                .put(key, vec![Cell::new(ColumnGroup::Basic, "year", Value::Null)])
                .expect("put");
        }

        let page = store.scan_page(b"a1", b"a3", 10).expect("scan");
        assert_eq!(page.len(), 2, "stop bound is exclusive");
        assert_eq!(page[0].key, b"a1");

        let page = store.scan_page(b"a1", b"b2", 2).expect("scan");
        assert_eq!(page.len(), 2, "limit caps the page");
    }

    #[test]
    fn uncommitted_transaction_work_is_invisible() {
        let warehouse = MemoryWarehouse::new();
        let columns = vec!["fips".into(), "hid".into()];
        let row = vec![vec![Value::Text("38001".into()), Value::Integer(1)]];

        let mut tx = warehouse.begin().expect("begin");
        tx.insert_rows("t", &columns, &row).expect("insert");
        assert_eq!(warehouse.table_len("t"), 0, "not visible before commit");
        tx.commit().expect("commit");
        assert_eq!(warehouse.table_len("t"), 1);

        let mut tx = warehouse.begin().expect("begin");
        tx.delete_batch("t", "hid", 1).expect("delete");
        tx.rollback().expect("rollback");
        assert_eq!(warehouse.table_len("t"), 1, "rollback discards the delete");
    }

    #[test]
    fn delete_batch_only_touches_its_own_batch() {
        let warehouse = MemoryWarehouse::new();
        let columns = vec!["fips".into(), "hid".into()];

        let mut tx = warehouse.begin().expect("begin");
        tx.insert_rows(
            "t",
            &columns,
            &[
                vec![Value::Text("38001".into()), Value::Integer(1)],
                vec![Value::Text("38001".into()), Value::Integer(2)],
            ],
        )
        .expect("insert");
        tx.commit().expect("commit");

        let mut tx = warehouse.begin().expect("begin");
        let deleted = tx.delete_batch("t", "hid", 1).expect("delete");
        assert_eq!(deleted, 1);
        let deleted_again = tx.delete_batch("t", "hid", 1).expect("delete");
        assert_eq!(deleted_again, 0, "re-delete of an empty set is a no-op");
        tx.commit().expect("commit");

        assert_eq!(warehouse.rows_for("t", "hid", 2), 1);
        assert_eq!(warehouse.rows_for("t", "hid", 1), 0);
    }
}
