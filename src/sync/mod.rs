pub mod engine;

use crate::catalog::Value;
use crate::error::BasinError;

pub use engine::{SyncEngine, SyncOutcome};

/// Default name of the warehouse column carrying the originating batch id.
pub const DEFAULT_BATCH_COLUMN: &str = "hid";

/// Transactional collaborator over the relational warehouse.
pub trait WarehouseClient {
    /// Opens a transaction. Delete and insert for one sync invocation must
    /// run inside a single transaction so the warehouse only ever observes
    /// the prior state or the fully-new state.
    fn begin(&self) -> Result<Box<dyn WarehouseTx + '_>, BasinError>;
}

/// One open warehouse transaction. Dropping without commit discards the
/// work on the collaborator side.
pub trait WarehouseTx {
    /// Deletes rows previously tagged with `(table, batch_id)`. Deleting an
    /// already-empty set is a no-op; returns the number removed.
    fn delete_batch(
        &mut self,
        table: &str,
        batch_column: &str,
        batch_id: u64,
    ) -> Result<u64, BasinError>;

    /// Inserts all rows as one batched operation; returns the number
    /// written. Constraint rejections surface as `SinkConstraintViolation`.
    fn insert_rows(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<u64, BasinError>;

    fn commit(self: Box<Self>) -> Result<(), BasinError>;

    fn rollback(self: Box<Self>) -> Result<(), BasinError>;
}

/// What one sync invocation replicates and where it lands.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    /// Upstream raw table whose maximum id identifies the current batch.
    pub source_table: String,
    /// Analytical query with a `{batch_id}` placeholder; its SQL is the
    /// caller's business.
    pub query_template: String,
    /// Warehouse table receiving the batch.
    pub target_table: String,
    /// Warehouse column tagging each row with its batch id.
    pub batch_column: String,
    /// Expected result columns, in order. The batch column must be one of
    /// them so re-runs can find their own rows.
    pub columns: Vec<String>,
}

impl SyncPlan {
    pub fn new(
        source_table: impl Into<String>,
        query_template: impl Into<String>,
        target_table: impl Into<String>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            query_template: query_template.into(),
            target_table: target_table.into(),
            batch_column: DEFAULT_BATCH_COLUMN.into(),
            columns,
        }
    }

    pub fn with_batch_column(mut self, batch_column: impl Into<String>) -> Self {
        self.batch_column = batch_column.into();
        self
    }

    pub fn validate(&self) -> Result<(), BasinError> {
        if !self.columns.iter().any(|c| c == &self.batch_column) {
            return Err(BasinError::Validation(format!(
                "batch column '{}' missing from plan columns",
                self.batch_column
            )));
        }
        Ok(())
    }
}
