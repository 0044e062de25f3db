pub mod row_key;
pub mod store;

pub use row_key::{RowKey, decode, encode, prefix_successor, scan_bounds};
pub use store::{
    AttributeMap, CancelFlag, Cell, ColumnStore, Observation, ScanIter, StoredRow, TimeSeriesStore,
};
