use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use pg_stat_exporter::collectors::source::{ColumnError, RawRow, StatSource};
use std::collections::HashMap;
use std::sync::Mutex;

const NUMERIC_COLUMNS: [&str; 17] = [
    "numbackends",
    "xact_commit",
    "xact_rollback",
    "blks_read",
    "blks_hit",
    "tup_returned",
    "tup_fetched",
    "tup_inserted",
    "tup_updated",
    "tup_deleted",
    "conflicts",
    "temp_files",
    "temp_bytes",
    "deadlocks",
    "blk_read_time",
    "blk_write_time",
    "active_time",
];

/// One row of `pg_stat_database`. `None` is a SQL NULL.
#[derive(Debug, Clone)]
pub struct Row {
    datid: Option<String>,
    datname: Option<String>,
    numbers: HashMap<&'static str, Option<f64>>,
    stats_reset: Option<DateTime<Utc>>,
}

impl Row {
    /// Every column populated: counters hold 10, `active_time` 2500 ms.
    pub fn full(datid: &str, datname: &str) -> Self {
        let mut numbers: HashMap<_, _> = NUMERIC_COLUMNS.iter().map(|c| (*c, Some(10.0))).collect();
        numbers.insert("active_time", Some(2500.0));

        Self {
            datid: Some(datid.to_string()),
            datname: Some(datname.to_string()),
            numbers,
            stats_reset: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single(),
        }
    }

    pub fn set(mut self, column: &'static str, value: f64) -> Self {
        self.numbers.insert(column, Some(value));
        self
    }

    pub fn null(mut self, column: &str) -> Self {
        match column {
            "datid" => self.datid = None,
            "datname" => self.datname = None,
            "stats_reset" => self.stats_reset = None,
            other => {
                if let Some(value) = self.numbers.get_mut(other) {
                    *value = None;
                }
            }
        }
        self
    }
}

fn not_found(column: &str) -> ColumnError {
    ColumnError::Malformed {
        column: column.to_string(),
        source: sqlx::Error::ColumnNotFound(column.to_string()),
    }
}

impl RawRow for Row {
    fn text(&self, column: &str) -> Result<Option<String>, ColumnError> {
        match column {
            "datid" => Ok(self.datid.clone()),
            "datname" => Ok(self.datname.clone()),
            _ => Err(not_found(column)),
        }
    }

    fn number(&self, column: &str) -> Result<Option<f64>, ColumnError> {
        self.numbers.get(column).copied().ok_or_else(|| not_found(column))
    }

    fn timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>, ColumnError> {
        match column {
            "stats_reset" => Ok(self.stats_reset),
            _ => Err(not_found(column)),
        }
    }
}

/// Serves the same rows for every query, or fails every query.
#[derive(Default)]
pub struct Table {
    rows: Vec<Row>,
    fail: Option<String>,
    queries: Mutex<Vec<String>>,
}

impl Table {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn unreachable(message: &str) -> Self {
        Self {
            fail: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn last_query(&self) -> Option<String> {
        self.queries.lock().unwrap().last().cloned()
    }
}

impl StatSource for Table {
    type Row = Row;

    fn fetch<'a>(&'a self, sql: &'a str) -> BoxStream<'a, Result<Row, sqlx::Error>> {
        self.queries.lock().unwrap().push(sql.to_string());

        match &self.fail {
            Some(message) => stream::once(async move { Err(sqlx::Error::Protocol(message.clone())) }).boxed(),
            None => stream::iter(self.rows.iter().cloned().map(Ok)).boxed(),
        }
    }
}
