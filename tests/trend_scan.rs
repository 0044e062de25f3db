use std::collections::BTreeMap;

use basinsync::catalog::{ColumnGroup, Value, qualifiers};
use basinsync::config::BasinConfig;
use basinsync::memory::MemoryColumnStore;
use basinsync::storage::store::{AttributeMap, CancelFlag, TimeSeriesStore};
use basinsync::trend::TrendReader;

fn nutrient_attrs(n_surplus: f64, p_surplus: Option<f64>) -> AttributeMap {
    let mut attrs: AttributeMap = BTreeMap::new();
    let surplus = attrs.entry(ColumnGroup::Surplus).or_default();
    surplus.insert(qualifiers::N_SURPLUS.into(), Value::Float(n_surplus));
    if let Some(p) = p_surplus {
        surplus.insert(qualifiers::P_SURPLUS.into(), Value::Float(p));
    }
    attrs
}

#[test]
fn trend_over_sparse_years_returns_exactly_the_stored_points() {
    let store = TimeSeriesStore::new(MemoryColumnStore::new(), BasinConfig::default());
    store
        .put("38001", 2010, &nutrient_attrs(120.5, Some(14.2)))
        .expect("put 2010");
    store
        .put("38001", 2015, &nutrient_attrs(98.1, None))
        .expect("put 2015");
    store
        .put("38001", 2020, &nutrient_attrs(76.4, Some(9.9)))
        .expect("put 2020");
    // Neighbouring entity and out-of-range year must not leak in.
    store
        .put("38003", 2015, &nutrient_attrs(500.0, None))
        .expect("put other entity");
    store
        .put("38001", 2021, &nutrient_attrs(70.0, None))
        .expect("put out of range");

    let reader = TrendReader::new(&store);
    let points: Vec<_> = reader
        .trend("38001", 2010, 2020)
        .expect("trend")
        .collect::<Result<_, _>>()
        .expect("points");

    let years: Vec<u16> = points.iter().map(|p| p.year).collect();
    assert_eq!(years, vec![2010, 2015, 2020]);

    assert_eq!(
        points[0].measure(qualifiers::N_SURPLUS),
        Some(&Value::Float(120.5))
    );
    assert_eq!(
        points[1].measure(qualifiers::P_SURPLUS),
        None,
        "2015 never stored a phosphorus surplus; absence is not zero"
    );
    assert_eq!(
        points[2].measure(qualifiers::P_SURPLUS),
        Some(&Value::Float(9.9))
    );
}

#[test]
fn inclusive_range_ends_pick_up_boundary_years() {
    let store = TimeSeriesStore::new(MemoryColumnStore::new(), BasinConfig::default());
    for year in 2009..=2021 {
        store
            .put("38001", year, &nutrient_attrs(year as f64, None))
            .expect("put");
    }

    let reader = TrendReader::new(&store);
    let years: Vec<u16> = reader
        .trend("38001", 2010, 2020)
        .expect("trend")
        .map(|p| p.expect("point").year)
        .collect();
    assert_eq!(years.first(), Some(&2010));
    assert_eq!(years.last(), Some(&2020));
    assert_eq!(years.len(), 11);
}

#[test]
fn scan_pages_through_large_ranges_without_reordering() {
    let store = TimeSeriesStore::new(
        MemoryColumnStore::new(),
        BasinConfig {
            scan_page_rows: 3,
            ..BasinConfig::default()
        },
    );
    // Written out of order on purpose.
    for year in [1997, 1950, 1975, 1960, 1988, 1951, 1999] {
        store
            .put("10005", year, &nutrient_attrs(year as f64, None))
            .expect("put");
    }

    let years: Vec<u16> = store
        .scan("10005", 1950, 1999)
        .expect("scan")
        .map(|obs| obs.expect("observation").year)
        .collect();
    assert_eq!(years, vec![1950, 1951, 1960, 1975, 1988, 1997, 1999]);
}

#[test]
fn cancelled_trend_stops_at_the_next_page_boundary() {
    let store = TimeSeriesStore::new(
        MemoryColumnStore::new(),
        BasinConfig {
            scan_page_rows: 2,
            ..BasinConfig::default()
        },
    );
    for year in 2000..2010 {
        store
            .put("38001", year, &nutrient_attrs(0.0, None))
            .expect("put");
    }

    let cancel = CancelFlag::new();
    let reader = TrendReader::new(&store);
    let mut iter = reader
        .trend_with_cancel("38001", 2000, 2009, cancel.clone())
        .expect("trend");

    assert!(iter.next().expect("point").is_ok());
    cancel.cancel();
    // The current page drains, then the flag is observed.
    assert!(iter.next().expect("point").is_ok());
    let err = iter.next().expect("item").unwrap_err();
    assert_eq!(err.code_str(), "cancelled");
    assert!(iter.next().is_none());
}

#[test]
fn restarting_a_scan_with_the_same_bounds_replays_the_sequence() {
    let store = TimeSeriesStore::new(MemoryColumnStore::new(), BasinConfig::default());
    for year in [2010, 2015, 2020] {
        store
            .put("38001", year, &nutrient_attrs(1.0, None))
            .expect("put");
    }

    let reader = TrendReader::new(&store);
    let first: Vec<u16> = reader
        .trend("38001", 2010, 2020)
        .expect("trend")
        .map(|p| p.expect("point").year)
        .collect();
    let second: Vec<u16> = reader
        .trend("38001", 2010, 2020)
        .expect("trend")
        .map(|p| p.expect("point").year)
        .collect();
    assert_eq!(first, second);
}
