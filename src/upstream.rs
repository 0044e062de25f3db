use tracing::info;

use crate::catalog::RowSet;
use crate::error::BasinError;

/// Read-only collaborator over the upstream batch query engine.
///
/// Calls block until the engine answers or the configured timeout expires;
/// both connectivity loss and timeout expiry surface as
/// `UpstreamUnavailable`.
pub trait SourceClient {
    /// Runs an analytical query and materializes the result.
    fn execute_query(&self, text: &str) -> Result<RowSet, BasinError>;

    /// Maximum batch id present in `table`, or 0 when the table is empty.
    fn max_batch_id(&self, table: &str) -> Result<u64, BasinError>;
}

/// Placeholder substituted with the resolved batch id when rendering a
/// caller-supplied query template.
pub const BATCH_ID_PLACEHOLDER: &str = "{batch_id}";

/// Substitutes the batch id into a query template. The analytical SQL
/// itself is the caller's business; only the batch predicate is wired in
/// here.
pub fn render_batch_query(template: &str, batch_id: u64) -> Result<String, BasinError> {
    if !template.contains(BATCH_ID_PLACEHOLDER) {
        return Err(BasinError::Validation(format!(
            "query template has no '{BATCH_ID_PLACEHOLDER}' placeholder"
        )));
    }
    Ok(template.replace(BATCH_ID_PLACEHOLDER, &batch_id.to_string()))
}

/// Resolves the identifier of the most recent analytical batch available
/// upstream.
pub struct BatchVersionTracker<'a> {
    source: &'a dyn SourceClient,
    table: String,
}

impl<'a> BatchVersionTracker<'a> {
    pub fn new(source: &'a dyn SourceClient, table: impl Into<String>) -> Self {
        Self {
            source,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Maximum batch id visible upstream. A return of 0 means "no data"
    /// and is a hard stop for callers, never a batch to sync.
    pub fn current_batch_id(&self) -> Result<u64, BasinError> {
        let batch_id = self.source.max_batch_id(&self.table)?;
        info!(table = %self.table, batch_id, "resolved current batch id");
        Ok(batch_id)
    }
}
