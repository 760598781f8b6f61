use crate::collectors::{
    error::ScrapeError,
    metric::{Column, ColumnType, Value},
    source::{ColumnError, RawRow},
    stat_database::{
        catalog::{DATID, DATNAME},
        selector::ColumnSet,
    },
};
use std::collections::HashMap;
use tracing::debug;

/// One decoded `pg_stat_database` row.
///
/// Values are kept raw; unit conversion happens when metrics are emitted. A column
/// that was requested but had no usable value maps to `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRow {
    datid: String,
    datname: String,
    values: HashMap<&'static str, Option<Value>>,
}

impl StatRow {
    #[must_use]
    pub fn new(datid: impl Into<String>, datname: impl Into<String>) -> Self {
        Self {
            datid: datid.into(),
            datname: datname.into(),
            values: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, column: &'static str, value: Option<Value>) -> Self {
        self.values.insert(column, value);
        self
    }

    #[must_use]
    pub fn datid(&self) -> &str {
        &self.datid
    }

    #[must_use]
    pub fn datname(&self) -> &str {
        &self.datname
    }

    /// The value of `column`, or `None` if it was not requested or had no value.
    #[must_use]
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.values.get(column).and_then(Option::as_ref)
    }

    /// Label values in `DATABASE_LABELS` order.
    #[must_use]
    pub fn label_values(&self) -> Vec<String> {
        vec![self.datid.clone(), self.datname.clone()]
    }
}

fn read<R: RawRow>(raw: &R, column: Column) -> Result<Option<Value>, ScrapeError> {
    let result = match column.ty {
        ColumnType::Text => raw.text(column.name).map(|v| v.map(Value::Text)),
        ColumnType::Number => raw.number(column.name).map(|v| v.map(Value::Number)),
        ColumnType::Timestamp => raw.timestamp(column.name).map(|v| v.map(Value::Timestamp)),
    };

    match result {
        Ok(value) => Ok(value),
        Err(ColumnError::Conversion { column, reason }) => {
            debug!(%column, %reason, "unconvertible value, treating column as absent");
            Ok(None)
        }
        Err(ColumnError::Malformed { column, source }) => {
            Err(ScrapeError::RowScan { column, source })
        }
    }
}

fn identity(values: &mut HashMap<&'static str, Option<Value>>, column: Column) -> Option<String> {
    match values.remove(column.name).flatten() {
        Some(Value::Text(text)) => Some(text),
        _ => None,
    }
}

/// Decodes one raw row.
///
/// Returns `Ok(None)` when the row is discarded: `datid` or `datname` is absent, or
/// the database is in `excluded`.
///
/// # Errors
///
/// Returns [`ScrapeError::RowScan`] if a requested column cannot be read at all.
pub fn decode_row<R: RawRow>(
    raw: &R,
    columns: &ColumnSet,
    excluded: &[String],
) -> Result<Option<StatRow>, ScrapeError> {
    let mut values = HashMap::with_capacity(columns.len());
    for column in columns.columns() {
        values.insert(column.name, read(raw, *column)?);
    }

    let Some(datid) = identity(&mut values, DATID) else {
        debug!("skipping row without datid");
        return Ok(None);
    };

    let Some(datname) = identity(&mut values, DATNAME) else {
        debug!(%datid, "skipping row without datname");
        return Ok(None);
    };

    if excluded.iter().any(|name| *name == datname) {
        debug!(%datid, %datname, "skipping excluded database");
        return Ok(None);
    }

    Ok(Some(StatRow {
        datid,
        datname,
        values,
    }))
}
