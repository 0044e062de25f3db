use std::collections::BTreeMap;

use crate::catalog::{ColumnGroup, Value};
use crate::error::BasinError;
use crate::storage::store::{CancelFlag, ColumnStore, Observation, ScanIter, TimeSeriesStore};

/// One point on an entity's trend line: the year plus whichever numeric
/// measures were stored for it. Absent measures stay absent.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub year: u16,
    pub measures: BTreeMap<String, Value>,
}

impl TrendPoint {
    fn from_observation(obs: Observation) -> Self {
        let mut measures = BTreeMap::new();
        for group in ColumnGroup::measure_groups() {
            if let Some(attrs) = obs.group(group) {
                for (qualifier, value) in attrs {
                    measures.insert(qualifier.clone(), value.clone());
                }
            }
        }
        Self {
            year: obs.year,
            measures,
        }
    }

    pub fn measure(&self, qualifier: &str) -> Option<&Value> {
        self.measures.get(qualifier)
    }
}

/// Bounded per-entity trend reads over the time-series store.
///
/// A thin composition of the key codec's scan bounds and the store's lazy
/// scan: ordering comes from the row keys, nothing is re-sorted in memory,
/// and an empty range is an empty sequence rather than an error.
pub struct TrendReader<'a, S: ColumnStore> {
    store: &'a TimeSeriesStore<S>,
}

impl<'a, S: ColumnStore> TrendReader<'a, S> {
    pub fn new(store: &'a TimeSeriesStore<S>) -> Self {
        Self { store }
    }

    pub fn trend(
        &self,
        entity_id: &str,
        year_start: i32,
        year_end: i32,
    ) -> Result<TrendIter<'a, S>, BasinError> {
        self.trend_with_cancel(entity_id, year_start, year_end, CancelFlag::new())
    }

    pub fn trend_with_cancel(
        &self,
        entity_id: &str,
        year_start: i32,
        year_end: i32,
        cancel: CancelFlag,
    ) -> Result<TrendIter<'a, S>, BasinError> {
        let scan = self
            .store
            .scan_with_cancel(entity_id, year_start, year_end, cancel)?;
        Ok(TrendIter { scan })
    }
}

pub struct TrendIter<'a, S: ColumnStore> {
    scan: ScanIter<'a, S>,
}

impl<S: ColumnStore> Iterator for TrendIter<'_, S> {
    type Item = Result<TrendPoint, BasinError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scan
            .next()
            .map(|item| item.map(TrendPoint::from_observation))
    }
}
