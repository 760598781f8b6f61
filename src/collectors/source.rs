//! Query handles collectors read rows from.
//!
//! [`StatSource`] is implemented for `sqlx::PgPool`; tests provide in-memory
//! sources. Rows are streamed, and dropping the stream releases whatever the
//! source holds for it (for a pool, the checked out connection).

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use sqlx::{PgPool, Row, postgres::PgRow};
use thiserror::Error;

/// Failure reading a single column of a row.
#[derive(Debug, Error)]
pub enum ColumnError {
    /// The value exists but could not be converted; callers treat the column as absent.
    #[error("column {column}: cannot convert value: {reason}")]
    Conversion { column: String, reason: String },

    /// The row itself is unusable (column missing from the result, protocol error).
    #[error("column {column}: {source}")]
    Malformed {
        column: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Typed, null-aware access to the columns of one result row.
pub trait RawRow {
    /// # Errors
    ///
    /// See [`ColumnError`].
    fn text(&self, column: &str) -> Result<Option<String>, ColumnError>;

    /// # Errors
    ///
    /// See [`ColumnError`].
    fn number(&self, column: &str) -> Result<Option<f64>, ColumnError>;

    /// # Errors
    ///
    /// See [`ColumnError`].
    fn timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>, ColumnError>;
}

/// Something that can run a parameterless query and stream its rows.
pub trait StatSource: Send + Sync {
    type Row: RawRow + Send;

    fn fetch<'a>(&'a self, sql: &'a str) -> BoxStream<'a, Result<Self::Row, sqlx::Error>>;
}

impl StatSource for PgPool {
    type Row = PgRow;

    fn fetch<'a>(&'a self, sql: &'a str) -> BoxStream<'a, Result<PgRow, sqlx::Error>> {
        sqlx::query(sql).fetch(self)
    }
}

fn classify(column: &str, err: sqlx::Error) -> ColumnError {
    match err {
        sqlx::Error::ColumnDecode { source, .. } => ColumnError::Conversion {
            column: column.to_string(),
            reason: source.to_string(),
        },
        other => ColumnError::Malformed {
            column: column.to_string(),
            source: other,
        },
    }
}

impl RawRow for PgRow {
    fn text(&self, column: &str) -> Result<Option<String>, ColumnError> {
        self.try_get::<Option<String>, _>(column)
            .map_err(|e| classify(column, e))
    }

    fn number(&self, column: &str) -> Result<Option<f64>, ColumnError> {
        self.try_get::<Option<f64>, _>(column)
            .map_err(|e| classify(column, e))
    }

    fn timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>, ColumnError> {
        self.try_get::<Option<DateTime<Utc>>, _>(column)
            .map_err(|e| classify(column, e))
    }
}
