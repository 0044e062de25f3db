use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::catalog::{ColumnGroup, Value, qualifiers};
use crate::config::BasinConfig;
use crate::error::BasinError;
use crate::storage::row_key::{self, RowKey};

/// One cell travelling to or from the column store.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub group: ColumnGroup,
    pub qualifier: String,
    pub value: Value,
}

impl Cell {
    pub fn new(group: ColumnGroup, qualifier: impl Into<String>, value: Value) -> Self {
        Self {
            group,
            qualifier: qualifier.into(),
            value,
        }
    }
}

/// One raw row as the collaborator returns it: opaque key plus cells.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub key: Vec<u8>,
    pub cells: Vec<Cell>,
}

/// Column-family-oriented put/scan primitives keyed by opaque byte strings.
///
/// Implementations do not retry internally; connectivity loss and timeout
/// expiry both surface as `StoreUnavailable` and the caller decides policy.
pub trait ColumnStore {
    /// Writes one row. Cells overwrite any prior value at the same
    /// (key, group, qualifier) with no merge.
    fn put(&self, key: &[u8], cells: Vec<Cell>) -> Result<(), BasinError>;

    /// Returns up to `limit` rows with keys in `[start, stop)`, in key
    /// order. An empty result means the range is exhausted.
    fn scan_page(
        &self,
        start: &[u8],
        stop: &[u8],
        limit: usize,
    ) -> Result<Vec<StoredRow>, BasinError>;
}

/// Cooperative cancellation flag checked between fetched scan pages.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Per-group attribute maps for one logical row.
pub type AttributeMap = BTreeMap<ColumnGroup, BTreeMap<String, Value>>;

/// One decoded observation returned by a scan.
///
/// Attributes missing from the stored row are simply absent from the maps;
/// callers must not conflate absence with a zero value.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub entity_id: String,
    pub year: u16,
    groups: AttributeMap,
}

impl Observation {
    fn from_stored(row: StoredRow) -> Result<Self, BasinError> {
        let (entity_id, year) = row_key::decode(&RowKey::from_bytes(row.key))?;
        let mut groups: AttributeMap = BTreeMap::new();
        for cell in row.cells {
            groups
                .entry(cell.group)
                .or_default()
                .insert(cell.qualifier, cell.value);
        }
        Ok(Self {
            entity_id,
            year,
            groups,
        })
    }

    pub fn value(&self, group: ColumnGroup, qualifier: &str) -> Option<&Value> {
        self.groups.get(&group).and_then(|g| g.get(qualifier))
    }

    pub fn group(&self, group: ColumnGroup) -> Option<&BTreeMap<String, Value>> {
        self.groups.get(&group)
    }
}

/// Write/scan adapter over a `ColumnStore`, owning key construction and
/// range bounds.
pub struct TimeSeriesStore<S: ColumnStore> {
    store: S,
    config: BasinConfig,
}

impl<S: ColumnStore> TimeSeriesStore<S> {
    pub fn new(store: S, config: BasinConfig) -> Self {
        Self { store, config }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Writes one logical (entity, year) row. The observation year is
    /// always materialized into the basic group alongside the key, the way
    /// downstream readers expect to find it.
    pub fn put(
        &self,
        entity_id: &str,
        year: i32,
        attributes: &AttributeMap,
    ) -> Result<(), BasinError> {
        let key = row_key::encode(entity_id, year)?;
        let mut cells = Vec::new();
        cells.push(Cell::new(
            ColumnGroup::Basic,
            qualifiers::YEAR,
            Value::Integer(year as i64),
        ));
        for (group, attrs) in attributes {
            for (qualifier, value) in attrs {
                if *group == ColumnGroup::Basic && qualifier == qualifiers::YEAR {
                    continue;
                }
                cells.push(Cell::new(*group, qualifier.clone(), value.clone()));
            }
        }
        self.store.put(key.as_slice(), cells)
    }

    /// Lazy bounded scan over `[year_start, year_end]` for one entity.
    /// Restartable only by re-invoking with the same bounds.
    pub fn scan(
        &self,
        entity_id: &str,
        year_start: i32,
        year_end: i32,
    ) -> Result<ScanIter<'_, S>, BasinError> {
        self.scan_with_cancel(entity_id, year_start, year_end, CancelFlag::new())
    }

    pub fn scan_with_cancel(
        &self,
        entity_id: &str,
        year_start: i32,
        year_end: i32,
        cancel: CancelFlag,
    ) -> Result<ScanIter<'_, S>, BasinError> {
        let (start, stop) = row_key::scan_bounds(entity_id, year_start, year_end)?;
        Ok(ScanIter {
            store: &self.store,
            next_start: start.into_vec(),
            stop: stop.into_vec(),
            page: Vec::new().into_iter(),
            page_rows: self.config.scan_page_rows.max(1),
            cancel,
            done: false,
        })
    }
}

/// Iterator over decoded observations, fetching pages on demand and
/// checking the cancellation flag between pages.
pub struct ScanIter<'a, S: ColumnStore> {
    store: &'a S,
    next_start: Vec<u8>,
    stop: Vec<u8>,
    page: std::vec::IntoIter<StoredRow>,
    page_rows: usize,
    cancel: CancelFlag,
    done: bool,
}

impl<S: ColumnStore> Iterator for ScanIter<'_, S> {
    type Item = Result<Observation, BasinError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.page.next() {
                return Some(Observation::from_stored(row));
            }
            if self.done {
                return None;
            }
            if self.cancel.is_cancelled() {
                self.done = true;
                return Some(Err(BasinError::Cancelled));
            }
            let page = match self
                .store
                .scan_page(&self.next_start, &self.stop, self.page_rows)
            {
                Ok(page) => page,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };
            match page.last() {
                Some(last) => self.next_start = row_key::key_successor(&last.key),
                None => {
                    self.done = true;
                    return None;
                }
            }
            self.page = page.into_iter();
        }
    }
}
