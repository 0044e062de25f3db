use std::time::Duration;

/// Runtime configuration for the replication pipeline.
///
/// Every field is a tuning knob, not a correctness switch: the defaults are
/// safe for production-sized batch windows.
#[derive(Debug, Clone)]
pub struct BasinConfig {
    /// Rows fetched per scanner page from the column store.
    pub scan_page_rows: usize,
    /// Hard cap on rows materialized per sync invocation. Batches are
    /// assumed boundable; exceeding this is a validation error rather than
    /// unbounded memory growth.
    pub max_fetch_rows: usize,
    /// Timeout handed to every collaborator call. Expiry surfaces as
    /// `StoreUnavailable`/`UpstreamUnavailable`, never a silent hang.
    pub operation_timeout: Duration,
}

impl Default for BasinConfig {
    fn default() -> Self {
        Self {
            scan_page_rows: 1_000,
            max_fetch_rows: 1_000_000,
            operation_timeout: Duration::from_secs(60),
        }
    }
}

impl BasinConfig {
    /// Profile for one-off historical migrations: bigger pages, longer
    /// timeouts, same row cap.
    pub fn bulk_load() -> Self {
        Self {
            scan_page_rows: 5_000,
            operation_timeout: Duration::from_secs(300),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BasinConfig;

    #[test]
    fn bulk_load_widens_pages_and_timeout() {
        let base = BasinConfig::default();
        let bulk = BasinConfig::bulk_load();
        assert!(bulk.scan_page_rows > base.scan_page_rows);
        assert!(bulk.operation_timeout > base.operation_timeout);
        assert_eq!(bulk.max_fetch_rows, base.max_fetch_rows);
    }
}
