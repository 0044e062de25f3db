//! Batch replication of derived analytical aggregates into two downstream
//! consumers: a column-family time-series store scanned by entity and year
//! range, and a relational reporting warehouse loaded one versioned batch
//! at a time.
//!
//! The two load-bearing pieces are the row key codec (reversed entity id
//! plus zero-padded year, so per-entity scans are bounded and sequential
//! ids do not hotspot one region) and the sync engine (delete-prior-batch
//! and bulk-insert inside a single warehouse transaction, idempotent per
//! batch id, with explicit manual-retry signalling when rollback state is
//! unknown).
//!
//! External systems appear as three narrow collaborator traits —
//! [`upstream::SourceClient`], [`storage::ColumnStore`], and
//! [`sync::WarehouseClient`] — injected with caller-managed lifetimes.
//! In-memory reference implementations live in [`memory`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod memory;
pub mod storage;
pub mod sync;
pub mod trend;
pub mod upstream;

pub use catalog::{ColumnGroup, RowSet, Value};
pub use config::BasinConfig;
pub use error::{BasinError, BasinErrorCode, SyncStage};
pub use storage::{CancelFlag, ColumnStore, Observation, RowKey, TimeSeriesStore};
pub use sync::{SyncEngine, SyncOutcome, SyncPlan, WarehouseClient, WarehouseTx};
pub use trend::{TrendPoint, TrendReader};
pub use upstream::{BatchVersionTracker, SourceClient};
