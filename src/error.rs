use thiserror::Error;

/// Stage a sync invocation had reached when it failed or finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    ResolvingBatch,
    FetchingSourceRows,
    ClearingSink,
    Inserting,
    Committed,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStage::ResolvingBatch => write!(f, "resolving_batch"),
            SyncStage::FetchingSourceRows => write!(f, "fetching_source_rows"),
            SyncStage::ClearingSink => write!(f, "clearing_sink"),
            SyncStage::Inserting => write!(f, "inserting"),
            SyncStage::Committed => write!(f, "committed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasinErrorCode {
    InvalidKeyInput,
    Decode,
    Validation,
    StoreUnavailable,
    UpstreamUnavailable,
    SinkConstraintViolation,
    RollbackFailed,
    Cancelled,
    SyncFailed,
}

impl BasinErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            BasinErrorCode::InvalidKeyInput => "invalid_key_input",
            BasinErrorCode::Decode => "decode",
            BasinErrorCode::Validation => "validation",
            BasinErrorCode::StoreUnavailable => "store_unavailable",
            BasinErrorCode::UpstreamUnavailable => "upstream_unavailable",
            BasinErrorCode::SinkConstraintViolation => "sink_constraint_violation",
            BasinErrorCode::RollbackFailed => "rollback_failed",
            BasinErrorCode::Cancelled => "cancelled",
            BasinErrorCode::SyncFailed => "sync_failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum BasinError {
    #[error("invalid key input: {message}")]
    InvalidKeyInput { message: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("time-series store unavailable: {message}")]
    StoreUnavailable { message: String },
    #[error("upstream source unavailable: {message}")]
    UpstreamUnavailable { message: String },
    #[error("sink constraint violation on table '{table}': {message}")]
    SinkConstraintViolation { table: String, message: String },
    #[error("rollback failed for table '{table}' batch {batch_id}: {message}")]
    RollbackFailed {
        table: String,
        batch_id: u64,
        message: String,
    },
    #[error("operation cancelled")]
    Cancelled,
    #[error(
        "sync of table '{target_table}' batch {batch_id} failed at stage {stage} \
         (needs_manual_retry={needs_manual_retry})"
    )]
    SyncFailed {
        target_table: String,
        batch_id: u64,
        stage: SyncStage,
        needs_manual_retry: bool,
        #[source]
        cause: Box<BasinError>,
    },
}

impl BasinError {
    pub fn code(&self) -> BasinErrorCode {
        match self {
            BasinError::InvalidKeyInput { .. } => BasinErrorCode::InvalidKeyInput,
            BasinError::Decode(_) => BasinErrorCode::Decode,
            BasinError::Validation(_) => BasinErrorCode::Validation,
            BasinError::StoreUnavailable { .. } => BasinErrorCode::StoreUnavailable,
            BasinError::UpstreamUnavailable { .. } => BasinErrorCode::UpstreamUnavailable,
            BasinError::SinkConstraintViolation { .. } => BasinErrorCode::SinkConstraintViolation,
            BasinError::RollbackFailed { .. } => BasinErrorCode::RollbackFailed,
            BasinError::Cancelled => BasinErrorCode::Cancelled,
            BasinError::SyncFailed { .. } => BasinErrorCode::SyncFailed,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }

    /// Transient failures the caller may retry with backoff. Everything else
    /// is either a caller error or requires confirming sink state first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BasinError::StoreUnavailable { .. } | BasinError::UpstreamUnavailable { .. }
        )
    }
}
