//! In-memory rows and sources for collector unit tests.

use crate::collectors::source::{ColumnError, RawRow, StatSource};
use chrono::{DateTime, TimeZone, Utc};
use futures::{
    future,
    stream::{self, BoxStream, StreamExt},
};
use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

#[derive(Debug, Clone)]
pub enum Cell {
    Null,
    Text(String),
    Number(f64),
    Time(DateTime<Utc>),
    /// A value of the wrong type for every reader.
    Garbage,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRow {
    cells: HashMap<String, Cell>,
}

impl MemoryRow {
    /// A `pg_stat_database` row with every column populated, `active_time` included.
    pub fn stat_database(datid: &str, datname: &str) -> Self {
        let mut row = Self::default()
            .set("datid", Cell::Text(datid.to_string()))
            .set("datname", Cell::Text(datname.to_string()));

        for (i, column) in [
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
        ]
        .iter()
        .enumerate()
        {
            row = row.set(column, Cell::Number(f64::from(u32::try_from(i).unwrap_or(0) + 1)));
        }

        let reset = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default();

        row.set("stats_reset", Cell::Time(reset))
            .set("active_time", Cell::Number(2500.0))
    }

    pub fn set(mut self, column: &str, cell: Cell) -> Self {
        self.cells.insert(column.to_string(), cell);
        self
    }

    pub fn without(mut self, column: &str) -> Self {
        self.cells.remove(column);
        self
    }

    fn cell(&self, column: &str) -> Result<&Cell, ColumnError> {
        self.cells.get(column).ok_or_else(|| ColumnError::Malformed {
            column: column.to_string(),
            source: sqlx::Error::ColumnNotFound(column.to_string()),
        })
    }
}

fn conversion(column: &str) -> ColumnError {
    ColumnError::Conversion {
        column: column.to_string(),
        reason: "mismatched types".to_string(),
    }
}

impl RawRow for MemoryRow {
    fn text(&self, column: &str) -> Result<Option<String>, ColumnError> {
        match self.cell(column)? {
            Cell::Null => Ok(None),
            Cell::Text(s) => Ok(Some(s.clone())),
            _ => Err(conversion(column)),
        }
    }

    fn number(&self, column: &str) -> Result<Option<f64>, ColumnError> {
        match self.cell(column)? {
            Cell::Null => Ok(None),
            Cell::Number(n) => Ok(Some(*n)),
            _ => Err(conversion(column)),
        }
    }

    fn timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>, ColumnError> {
        match self.cell(column)? {
            Cell::Null => Ok(None),
            Cell::Time(t) => Ok(Some(*t)),
            _ => Err(conversion(column)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Item {
    Row(MemoryRow),
    Error(String),
    /// Never resolves, like a server that stopped answering mid-result.
    Stall,
}

struct OpenStream(Arc<AtomicUsize>);

impl Drop for OpenStream {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Replays a fixed list of rows and errors for every query.
#[derive(Default)]
pub struct MemorySource {
    items: Vec<Item>,
    queries: Mutex<Vec<String>>,
    open: Arc<AtomicUsize>,
}

impl MemorySource {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn rows(rows: Vec<MemoryRow>) -> Self {
        Self::new(rows.into_iter().map(Item::Row).collect())
    }

    pub fn failing(message: &str) -> Self {
        Self::new(vec![Item::Error(message.to_string())])
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    /// Streams handed out and not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

impl StatSource for MemorySource {
    type Row = MemoryRow;

    fn fetch<'a>(&'a self, sql: &'a str) -> BoxStream<'a, Result<MemoryRow, sqlx::Error>> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(sql.to_string());
        }

        self.open.fetch_add(1, Ordering::SeqCst);
        let guard = OpenStream(self.open.clone());

        stream::iter(self.items.clone())
            .then(move |item| {
                let _open = &guard;
                async move {
                    match item {
                        Item::Row(row) => Ok(row),
                        Item::Error(msg) => Err(sqlx::Error::Protocol(msg)),
                        Item::Stall => future::pending().await,
                    }
                }
            })
            .boxed()
    }
}
