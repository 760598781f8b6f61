use crate::collectors::sink::SinkError;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort a collection cycle.
///
/// Missing identity columns, missing metric values and excluded databases are not
/// errors; collectors absorb them and log at debug level.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("row stream failed after {rows} rows: {source}")]
    RowStream {
        rows: usize,
        #[source]
        source: sqlx::Error,
    },

    #[error("malformed row in column {column}: {source}")]
    RowScan {
        column: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("metric {metric} expects {expected} label values, got {got}")]
    LabelArity {
        metric: String,
        expected: usize,
        got: usize,
    },

    #[error("failed to push observation: {0}")]
    Sink(#[from] SinkError),

    #[error("collection timed out after {0:?}")]
    Timeout(Duration),
}
