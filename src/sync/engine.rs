use tracing::{info, warn};

use crate::catalog::RowSet;
use crate::config::BasinConfig;
use crate::error::{BasinError, SyncStage};
use crate::sync::{SyncPlan, WarehouseClient, WarehouseTx};
use crate::upstream::{BatchVersionTracker, SourceClient, render_batch_query};

/// Terminal result of one successful sync invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The batch was replicated and the transaction committed.
    Committed { batch_id: u64, rows_written: u64 },
    /// The upstream table was empty (batch id 0); nothing was touched.
    NoData,
}

/// Orchestrates one "read batch, clear sink, insert, commit" pass against
/// the relational warehouse.
///
/// One invocation processes one batch id end-to-end with no internal
/// parallelism and no automatic retry: transient fetch failures are the
/// caller's to retry, and failures past `ClearingSink` must not be retried
/// until the reported rollback state has been confirmed.
pub struct SyncEngine<'a> {
    source: &'a dyn SourceClient,
    warehouse: &'a dyn WarehouseClient,
    plan: SyncPlan,
    config: BasinConfig,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        source: &'a dyn SourceClient,
        warehouse: &'a dyn WarehouseClient,
        plan: SyncPlan,
        config: BasinConfig,
    ) -> Self {
        Self {
            source,
            warehouse,
            plan,
            config,
        }
    }

    pub fn plan(&self) -> &SyncPlan {
        &self.plan
    }

    /// Runs the sync state machine once. Idempotent for a given batch id:
    /// re-running a committed sync deletes and rewrites the same rows.
    pub fn run(&self) -> Result<SyncOutcome, BasinError> {
        self.plan
            .validate()
            .map_err(|e| self.fail(0, SyncStage::ResolvingBatch, false, e))?;

        let tracker = BatchVersionTracker::new(self.source, self.plan.source_table.clone());
        let batch_id = tracker
            .current_batch_id()
            .map_err(|e| self.fail(0, SyncStage::ResolvingBatch, false, e))?;
        if batch_id == 0 {
            info!(
                source_table = %self.plan.source_table,
                target_table = %self.plan.target_table,
                "no upstream data, sync is a no-op"
            );
            return Ok(SyncOutcome::NoData);
        }

        let rows = self
            .fetch_batch(batch_id)
            .map_err(|e| self.fail(batch_id, SyncStage::FetchingSourceRows, false, e))?;

        self.replicate(batch_id, &rows)
    }

    fn fetch_batch(&self, batch_id: u64) -> Result<RowSet, BasinError> {
        let query = render_batch_query(&self.plan.query_template, batch_id)?;
        let rows = self.source.execute_query(&query)?;
        rows.validate_shape()?;
        if rows.columns != self.plan.columns {
            return Err(BasinError::Validation(format!(
                "source columns {:?} do not match plan columns {:?}",
                rows.columns, self.plan.columns
            )));
        }
        if rows.len() > self.config.max_fetch_rows {
            return Err(BasinError::Validation(format!(
                "batch {batch_id} has {} rows, over the {} row cap",
                rows.len(),
                self.config.max_fetch_rows
            )));
        }
        info!(
            batch_id,
            rows = rows.len(),
            target_table = %self.plan.target_table,
            "fetched source rows"
        );
        Ok(rows)
    }

    fn replicate(&self, batch_id: u64, rows: &RowSet) -> Result<SyncOutcome, BasinError> {
        let mut tx = self
            .warehouse
            .begin()
            .map_err(|e| self.fail(batch_id, SyncStage::ClearingSink, false, e))?;

        let cleared =
            match tx.delete_batch(&self.plan.target_table, &self.plan.batch_column, batch_id) {
                Ok(n) => n,
                Err(cause) => return Err(self.abort(tx, batch_id, SyncStage::ClearingSink, cause)),
            };

        let rows_written =
            match tx.insert_rows(&self.plan.target_table, &rows.columns, &rows.rows) {
                Ok(n) => n,
                Err(cause) => return Err(self.abort(tx, batch_id, SyncStage::Inserting, cause)),
            };

        if let Err(cause) = tx.commit() {
            // The transaction handle is gone; whether the warehouse kept or
            // discarded the work is unknown until an operator checks.
            return Err(self.fail(batch_id, SyncStage::Inserting, true, cause));
        }

        info!(
            batch_id,
            target_table = %self.plan.target_table,
            cleared,
            rows_written,
            "sync committed"
        );
        Ok(SyncOutcome::Committed {
            batch_id,
            rows_written,
        })
    }

    /// Rolls the open transaction back and wraps the failure with resume
    /// context. A rollback failure upgrades the outcome to manual-retry.
    fn abort(
        &self,
        tx: Box<dyn WarehouseTx + '_>,
        batch_id: u64,
        stage: SyncStage,
        cause: BasinError,
    ) -> BasinError {
        match tx.rollback() {
            Ok(()) => {
                warn!(
                    batch_id,
                    target_table = %self.plan.target_table,
                    %stage,
                    error = %cause,
                    "sync failed, transaction rolled back"
                );
                self.fail(batch_id, stage, false, cause)
            }
            Err(rollback_err) => {
                warn!(
                    batch_id,
                    target_table = %self.plan.target_table,
                    %stage,
                    error = %cause,
                    rollback_error = %rollback_err,
                    "sync failed and rollback failed, sink state unknown"
                );
                self.fail(
                    batch_id,
                    stage,
                    true,
                    BasinError::RollbackFailed {
                        table: self.plan.target_table.clone(),
                        batch_id,
                        message: format!("{rollback_err}; original failure: {cause}"),
                    },
                )
            }
        }
    }

    fn fail(
        &self,
        batch_id: u64,
        stage: SyncStage,
        needs_manual_retry: bool,
        cause: BasinError,
    ) -> BasinError {
        BasinError::SyncFailed {
            target_table: self.plan.target_table.clone(),
            batch_id,
            stage,
            needs_manual_retry,
            cause: Box::new(cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SyncEngine, SyncOutcome};
    use crate::catalog::{RowSet, Value};
    use crate::config::BasinConfig;
    use crate::error::{BasinError, SyncStage};
    use crate::memory::{MemorySource, MemoryWarehouse};
    use crate::sync::SyncPlan;

    fn plan() -> SyncPlan {
        SyncPlan::new(
            "watershed_nutrient_balance",
            "SELECT fips, n_surplus, hid FROM watershed_nutrient_balance WHERE id = {batch_id}",
            "watershed_surplus_trend",
            vec!["fips".into(), "n_surplus".into(), "hid".into()],
        )
    }

    fn batch_rows(batch_id: u64, fips_codes: &[&str]) -> RowSet {
        let mut rows = RowSet::new(vec!["fips".into(), "n_surplus".into(), "hid".into()]);
        for fips in fips_codes {
            rows.push(vec![
                Value::Text((*fips).into()),
                Value::Float(1.25),
                Value::Integer(batch_id as i64),
            ]);
        }
        rows
    }

    #[test]
    fn empty_upstream_is_a_no_op_not_a_failure() {
        let source = MemorySource::new();
        let warehouse = MemoryWarehouse::new();
        let engine = SyncEngine::new(&source, &warehouse, plan(), BasinConfig::default());

        assert_eq!(engine.run().expect("run"), SyncOutcome::NoData);
        assert_eq!(warehouse.transactions_begun(), 0);
    }

    #[test]
    fn committed_sync_reports_rows_written() {
        let source = MemorySource::new();
        source.set_max_batch_id(3);
        source.set_query_result(batch_rows(3, &["38001", "38003"]));
        let warehouse = MemoryWarehouse::new();
        let engine = SyncEngine::new(&source, &warehouse, plan(), BasinConfig::default());

        let outcome = engine.run().expect("run");
        assert_eq!(
            outcome,
            SyncOutcome::Committed {
                batch_id: 3,
                rows_written: 2
            }
        );
        assert_eq!(warehouse.rows_for("watershed_surplus_trend", "hid", 3), 2);
        let executed = source.executed_queries();
        assert_eq!(executed.len(), 1);
        assert!(executed[0].contains("WHERE id = 3"));
    }

    #[test]
    fn oversized_batch_fails_before_any_transaction() {
        let source = MemorySource::new();
        source.set_max_batch_id(1);
        source.set_query_result(batch_rows(1, &["38001", "38003", "38005"]));
        let warehouse = MemoryWarehouse::new();
        let config = BasinConfig {
            max_fetch_rows: 2,
            ..BasinConfig::default()
        };
        let engine = SyncEngine::new(&source, &warehouse, plan(), config);

        let err = engine.run().unwrap_err();
        match err {
            BasinError::SyncFailed {
                stage,
                needs_manual_retry,
                ..
            } => {
                assert_eq!(stage, SyncStage::FetchingSourceRows);
                assert!(!needs_manual_retry);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(warehouse.transactions_begun(), 0);
    }

    #[test]
    fn column_mismatch_is_rejected_before_clearing() {
        let source = MemorySource::new();
        source.set_max_batch_id(1);
        let mut rows = RowSet::new(vec!["fips".into(), "hid".into()]);
        rows.push(vec![Value::Text("38001".into()), Value::Integer(1)]);
        source.set_query_result(rows);
        let warehouse = MemoryWarehouse::new();
        let engine = SyncEngine::new(&source, &warehouse, plan(), BasinConfig::default());

        let err = engine.run().unwrap_err();
        assert!(matches!(
            err,
            BasinError::SyncFailed {
                stage: SyncStage::FetchingSourceRows,
                ..
            }
        ));
        assert_eq!(warehouse.transactions_begun(), 0);
    }
}
